// ── Alarm domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{AlarmId, OltId, UnitId};

/// Alarm type raised when a known ONU drops offline.
pub const ONU_DOWN: &str = "onu_down";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AlarmSeverity {
    Critical,
    Major,
    Minor,
    #[default]
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AlarmStatus {
    #[default]
    Active,
    Acknowledged,
    Cleared,
}

/// A stored alarm. Everything but the lifecycle fields is fixed once raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub olt_id: Option<OltId>,
    pub unit_id: Option<UnitId>,
    pub severity: AlarmSeverity,
    #[serde(rename = "type")]
    pub alarm_type: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    pub occurred_at: DateTime<Utc>,

    // Lifecycle
    #[serde(default)]
    pub status: AlarmStatus,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl Alarm {
    pub fn is_active(&self) -> bool {
        self.status == AlarmStatus::Active
    }
}

/// An alarm to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlarm {
    pub olt_id: Option<OltId>,
    pub unit_id: Option<UnitId>,
    pub severity: AlarmSeverity,
    pub alarm_type: String,
    pub message: String,
    pub details: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewAlarm {
    /// Major `onu_down` for a unit seen going offline.
    pub fn onu_down(olt_id: OltId, unit_id: UnitId, serial: &str, at: DateTime<Utc>) -> Self {
        Self {
            olt_id: Some(olt_id),
            unit_id: Some(unit_id),
            severity: AlarmSeverity::Major,
            alarm_type: ONU_DOWN.to_owned(),
            message: format!("ONU {serial} is offline"),
            details: None,
            occurred_at: at,
        }
    }

    pub(crate) fn into_alarm(self, id: AlarmId) -> Alarm {
        Alarm {
            id,
            olt_id: self.olt_id,
            unit_id: self.unit_id,
            severity: self.severity,
            alarm_type: self.alarm_type,
            message: self.message,
            details: self.details,
            occurred_at: self.occurred_at,
            status: AlarmStatus::Active,
            acknowledged_at: None,
            cleared_at: None,
        }
    }
}
