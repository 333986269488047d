// ── ONU domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{OltId, UnitId};

/// Observed ONU state after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OnuStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AdminStatus {
    #[default]
    Enabled,
    Disabled,
}

/// Reconciliation lookup key, unique per OLT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub olt_id: OltId,
    pub pon_port: u32,
    pub onu_id: u32,
}

impl UnitKey {
    pub fn new(olt_id: OltId, pon_port: u32, onu_id: u32) -> Self {
        Self {
            olt_id,
            pon_port,
            onu_id,
        }
    }
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "olt {} port {} onu {}", self.olt_id, self.pon_port, self.onu_id)
    }
}

/// The canonical subscriber unit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Onu {
    pub id: UnitId,
    pub olt_id: OltId,
    /// Globally unique.
    pub serial_number: String,
    #[serde(default)]
    pub name: Option<String>,
    pub pon_port: u32,
    pub onu_id: u32,
    #[serde(default)]
    pub status: OnuStatus,
    #[serde(default)]
    pub admin_status: AdminStatus,
    #[serde(default)]
    pub model: Option<String>,

    // Optics and counters. `Some(0.0)` is a reading; `None` is no reading.
    #[serde(default)]
    pub rx_power: Option<f64>,
    #[serde(default)]
    pub tx_power: Option<f64>,
    #[serde(default)]
    pub rx_bytes: Option<u64>,
    #[serde(default)]
    pub tx_bytes: Option<u64>,

    #[serde(default)]
    pub description: Option<String>,

    // Lifecycle
    #[serde(default)]
    pub provisioned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status_change: Option<DateTime<Utc>>,
}

impl Onu {
    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.olt_id, self.pon_port, self.onu_id)
    }
}

/// An ONU row that does not exist yet; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUnit {
    pub olt_id: OltId,
    pub serial_number: String,
    pub pon_port: u32,
    pub onu_id: u32,
    pub status: OnuStatus,
    pub rx_power: Option<f64>,
    pub tx_power: Option<f64>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub provisioned_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl NewUnit {
    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.olt_id, self.pon_port, self.onu_id)
    }

    pub(crate) fn into_onu(self, id: UnitId) -> Onu {
        Onu {
            id,
            olt_id: self.olt_id,
            serial_number: self.serial_number,
            name: None,
            pon_port: self.pon_port,
            onu_id: self.onu_id,
            status: self.status,
            admin_status: AdminStatus::Enabled,
            model: None,
            rx_power: self.rx_power,
            tx_power: self.tx_power,
            rx_bytes: self.rx_bytes,
            tx_bytes: self.tx_bytes,
            description: None,
            provisioned_at: Some(self.provisioned_at),
            last_seen_at: self.last_seen_at,
            last_status_change: None,
        }
    }
}

/// Write request for [`InventoryTx::upsert_unit`](crate::store::InventoryTx::upsert_unit).
#[derive(Debug, Clone, PartialEq)]
pub enum UnitUpsert {
    Create(NewUnit),
    Update(Onu),
}
