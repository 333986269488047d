// ── Runtime engine configuration ──
//
// These types describe *how* the engine polls. They carry tuning and the
// credential key, but never touch disk. The CLI builds a
// `ControllerConfig` (usually via gponctl-config) and hands it in.

use std::time::Duration;

use gponctl_api::{OidTable, TransportConfig};
use secrecy::SecretString;

use crate::gateway::Method;

/// Scheduling knobs for the Poll & Sync Engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pause between periodic cycles.
    pub poll_interval: Duration,
    /// Hard deadline for one OLT's cycle.
    pub task_timeout: Duration,
    /// Transport used for unit enumeration and device operations.
    pub default_method: Method,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            task_timeout: Duration::from_secs(120),
            default_method: Method::Snmp,
        }
    }
}

/// Everything the [`Controller`](crate::Controller) needs.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub engine: EngineConfig,
    /// Per-protocol deadlines, retries and the unit row cap.
    pub transport: TransportConfig,
    pub oids: OidTable,
    /// Key for stored device credentials. `None` means plain text.
    pub encryption_key: Option<SecretString>,
}
