// Shared transport configuration for all device adapters.
//
// SNMP, SSH and REST each take their per-call deadlines from this module,
// so a stalled device bounds its own task and nothing else.

use std::time::Duration;

/// Per-protocol deadlines and retry policy.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Single SNMP GET/SET round trip.
    pub snmp_get_timeout: Duration,
    /// Whole SNMP table walk.
    pub snmp_walk_timeout: Duration,
    /// Retransmissions per SNMP request before giving up.
    pub snmp_retries: u32,
    /// Row cap for a single walk / unit enumeration.
    pub max_rows: usize,
    pub ssh_connect_timeout: Duration,
    pub ssh_command_timeout: Duration,
    pub rest_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            snmp_get_timeout: Duration::from_secs(5),
            snmp_walk_timeout: Duration::from_secs(10),
            snmp_retries: 3,
            max_rows: 1000,
            ssh_connect_timeout: Duration::from_secs(10),
            ssh_command_timeout: Duration::from_secs(30),
            rest_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for the vendor REST adapter.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.rest_timeout)
            .connect_timeout(self.rest_timeout)
            .user_agent(concat!("gponctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(crate::error::Error::Transport)
    }
}
