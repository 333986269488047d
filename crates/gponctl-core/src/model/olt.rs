// ── OLT domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::OltId;

/// Observed OLT reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OltStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl OltStatus {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// OLT-level gauges. A metric the device did not report stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OltPerformance {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub temperature: Option<f64>,
    pub uptime_secs: Option<u64>,
}

impl OltPerformance {
    /// Overwrite only the metrics `fresh` actually carries.
    pub fn merge(&mut self, fresh: &Self) {
        if fresh.cpu_usage.is_some() {
            self.cpu_usage = fresh.cpu_usage;
        }
        if fresh.memory_usage.is_some() {
            self.memory_usage = fresh.memory_usage;
        }
        if fresh.temperature.is_some() {
            self.temperature = fresh.temperature;
        }
        if fresh.uptime_secs.is_some() {
            self.uptime_secs = fresh.uptime_secs;
        }
    }
}

/// A credential as stored in the inventory: AES-GCM ciphertext, or plain
/// text in development setups. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredSecret(String);

impl StoredSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn stored_value(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for StoredSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoredSecret([REDACTED])")
    }
}

/// SNMP access settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnmpSettings {
    /// 2 for v2c, 3 for v3.
    pub version: u8,
    pub port: u16,
    pub community: StoredSecret,
    pub username: Option<String>,
    pub password: Option<StoredSecret>,
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            version: 2,
            port: 161,
            community: StoredSecret::new("public"),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<StoredSecret>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: 22,
            username: None,
            password: None,
        }
    }
}

/// Vendor REST settings. `endpoint` overrides `http://{ip}:1661`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<StoredSecret>,
}

/// The canonical OLT record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Olt {
    pub id: OltId,
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    pub ip_address: String,
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,

    // Access
    #[serde(default)]
    pub snmp: SnmpSettings,
    #[serde(default)]
    pub ssh: SshSettings,
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,

    // Observed state
    #[serde(default)]
    pub status: OltStatus,
    #[serde(default)]
    pub performance: OltPerformance,
    #[serde(default)]
    pub last_polled_at: Option<DateTime<Utc>>,
}

fn default_vendor() -> String {
    "ZTE".into()
}

impl Olt {
    /// A new OLT with default access settings and unknown state.
    pub fn new(id: OltId, name: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hostname: None,
            ip_address: ip_address.into(),
            vendor: default_vendor(),
            model: None,
            firmware_version: None,
            snmp: SnmpSettings::default(),
            ssh: SshSettings::default(),
            api: ApiSettings::default(),
            location: None,
            description: None,
            status: OltStatus::Unknown,
            performance: OltPerformance::default(),
            last_polled_at: None,
        }
    }
}

/// Observed-state write produced by one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStateUpdate {
    pub status: OltStatus,
    pub polled_at: DateTime<Utc>,
    /// Merged field-by-field; absent metrics leave stored values alone.
    pub performance: Option<OltPerformance>,
    /// Backfill for an empty hostname.
    pub hostname: Option<String>,
    /// Backfill for an empty firmware version.
    pub firmware_version: Option<String>,
}

impl DeviceStateUpdate {
    pub fn status_only(status: OltStatus, polled_at: DateTime<Utc>) -> Self {
        Self {
            status,
            polled_at,
            performance: None,
            hostname: None,
            firmware_version: None,
        }
    }

    /// Apply to `olt`. Backfills only touch fields that are still empty.
    pub fn apply(&self, olt: &mut Olt) {
        olt.status = self.status;
        olt.last_polled_at = Some(self.polled_at);
        if let Some(perf) = &self.performance {
            olt.performance.merge(perf);
        }
        if olt.hostname.as_deref().is_none_or(str::is_empty) {
            if let Some(hostname) = &self.hostname {
                olt.hostname = Some(hostname.clone());
            }
        }
        if olt.firmware_version.as_deref().is_none_or(str::is_empty) {
            if let Some(firmware) = &self.firmware_version {
                olt.firmware_version = Some(firmware.clone());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_metrics_the_device_did_not_report() {
        let mut stored = OltPerformance {
            cpu_usage: Some(12.0),
            memory_usage: Some(40.0),
            temperature: Some(51.5),
            uptime_secs: Some(100),
        };
        stored.merge(&OltPerformance {
            cpu_usage: Some(0.0),
            uptime_secs: Some(160),
            ..OltPerformance::default()
        });
        assert_eq!(stored.cpu_usage, Some(0.0));
        assert_eq!(stored.memory_usage, Some(40.0));
        assert_eq!(stored.temperature, Some(51.5));
        assert_eq!(stored.uptime_secs, Some(160));
    }

    #[test]
    fn backfill_never_overwrites() {
        let mut olt = Olt::new(OltId(1), "east", "10.0.0.1");
        olt.hostname = Some("configured".into());
        let now = Utc::now();
        let update = DeviceStateUpdate {
            hostname: Some("from-snmp".into()),
            firmware_version: Some("ZXA10 Version V2.1".into()),
            ..DeviceStateUpdate::status_only(OltStatus::Online, now)
        };
        update.apply(&mut olt);
        assert_eq!(olt.hostname.as_deref(), Some("configured"));
        assert_eq!(olt.firmware_version.as_deref(), Some("ZXA10 Version V2.1"));
        assert_eq!(olt.status, OltStatus::Online);
        assert_eq!(olt.last_polled_at, Some(now));
    }

    #[test]
    fn stored_secret_debug_is_redacted() {
        let mut olt = Olt::new(OltId(1), "east", "10.0.0.1");
        olt.ssh.password = Some(StoredSecret::new("hunter2"));
        assert!(!format!("{olt:?}").contains("hunter2"));
    }

    #[test]
    fn minimal_json_record_fills_defaults() {
        let olt: Olt =
            serde_json::from_str(r#"{"id": 3, "name": "west", "ip_address": "10.0.0.3"}"#).unwrap();
        assert_eq!(olt.vendor, "ZTE");
        assert_eq!(olt.snmp.port, 161);
        assert_eq!(olt.snmp.community.stored_value(), "public");
        assert_eq!(olt.status, OltStatus::Unknown);
    }
}
