// ── Canonical poll results ──
//
// Transient values produced by the gateway and engine. Never persisted
// as-is; the reconciler turns them into inventory writes.

use serde::{Deserialize, Serialize};

use super::ids::OltId;
use super::olt::{OltPerformance, OltStatus};
use super::onu::OnuStatus;

/// One ONU as the device reported it, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub pon_port: u32,
    pub onu_id: u32,
    pub serial_number: String,
    pub status: OnuStatus,
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

/// MIB-II identity of an OLT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub system_name: Option<String>,
    pub description: Option<String>,
    pub uptime_secs: Option<u64>,
    pub location: Option<String>,
}

/// Normalized unit enumeration for one OLT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub units: Vec<UnitSnapshot>,
    /// The row cap cut the enumeration short.
    pub truncated: bool,
}

/// Outcome of an on-demand or scheduled status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub olt_id: OltId,
    pub status: OltStatus,
    pub performance: Option<OltPerformance>,
    pub system: Option<SystemSummary>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub olt_id: OltId,
    pub created: usize,
    /// Existing rows matched and refreshed, changed or not.
    pub updated: usize,
    /// Rows whose status changed.
    pub status_changes: usize,
    pub alarms_raised: usize,
    pub truncated: bool,
}

impl SyncResult {
    pub fn empty(olt_id: OltId) -> Self {
        Self {
            olt_id,
            created: 0,
            updated: 0,
            status_changes: 0,
            alarms_raised: 0,
            truncated: false,
        }
    }
}

/// A full poll-then-sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub poll: PollResult,
    /// `None` when the OLT was offline and the sync step was skipped.
    pub sync: Option<SyncResult>,
}
