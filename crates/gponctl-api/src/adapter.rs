// ── Device capability trait ──
//
// One trait, three wire protocols. The gateway in `gponctl-core` holds
// `Arc<dyn DeviceAdapter>` values and dispatches on the operator's
// chosen method; adapters never fall back to each other.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Error;
use crate::target::DeviceTarget;

// ── Raw reply types ─────────────────────────────────────────────────

/// MIB-II system group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub uptime_secs: Option<u64>,
    pub location: Option<String>,
}

/// OLT-level gauges. A metric the device did not report stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Performance {
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub temperature: Option<f64>,
    pub uptime_secs: Option<u64>,
}

/// An optical power reading in the encoding the device used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpticalPower {
    /// Hundredths of a dBm (SNMP vendor tables).
    CentiDbm(i64),
    /// Already in dBm (REST JSON).
    Dbm(f64),
}

impl OpticalPower {
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn dbm(self) -> f64 {
        match self {
            Self::CentiDbm(v) => v as f64 / 100.0,
            Self::Dbm(v) => v,
        }
    }
}

/// One ONU as reported by the device, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawUnit {
    pub pon_port: u32,
    pub onu_id: u32,
    pub serial_number: String,
    /// Device status text (`"1"`, `"online"`, `"up"`, `"los"`, ...).
    pub status: String,
    pub rx_power: Option<OpticalPower>,
    pub tx_power: Option<OpticalPower>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

/// Result of a unit enumeration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitListing {
    pub units: Vec<RawUnit>,
    /// The row cap was reached before the device ran out of units.
    pub truncated: bool,
}

/// Position of one ONU on an OLT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitAddress {
    pub pon_port: u32,
    pub onu_id: u32,
}

impl UnitAddress {
    pub fn new(pon_port: u32, onu_id: u32) -> Self {
        Self { pon_port, onu_id }
    }
}

impl std::fmt::Display for UnitAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pon_port, self.onu_id)
    }
}

/// PPPoE service parameters pushed to an ONU.
#[derive(Debug, Clone)]
pub struct PppoeRequest {
    pub username: String,
    pub password: SecretString,
    pub vlan_id: Option<u16>,
    pub service_name: Option<String>,
}

// ── DeviceAdapter ───────────────────────────────────────────────────

/// The uniform capability set every transport implements.
///
/// All methods take the target explicitly; implementations hold no
/// per-device state. Capabilities a protocol cannot express keep the
/// default body and report [`Error::Unsupported`].
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Short protocol name used in logs.
    fn name(&self) -> &'static str;

    async fn read_system_info(&self, _target: &DeviceTarget) -> Result<SystemInfo, Error> {
        Err(Error::Unsupported("read_system_info"))
    }

    /// Cheap liveness probe: `Ok(true)` when the device answered meaningfully.
    async fn read_status(&self, _target: &DeviceTarget) -> Result<bool, Error> {
        Err(Error::Unsupported("read_status"))
    }

    async fn read_performance(&self, _target: &DeviceTarget) -> Result<Performance, Error> {
        Err(Error::Unsupported("read_performance"))
    }

    /// Enumerate ONUs. All-or-nothing: a failure after the first row
    /// yields [`Error::PartialList`] and no records.
    async fn list_units(&self, _target: &DeviceTarget) -> Result<UnitListing, Error> {
        Err(Error::Unsupported("list_units"))
    }

    /// Raw status text of a single ONU.
    async fn read_unit_status(
        &self,
        _target: &DeviceTarget,
        _unit: UnitAddress,
    ) -> Result<String, Error> {
        Err(Error::Unsupported("read_unit_status"))
    }

    async fn provision_unit(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        serial: &str,
    ) -> Result<(), Error>;

    async fn delete_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error>;

    /// Replace the serial bound to `unit`.
    ///
    /// Default: delete, wait [`reprovision_delay`](Self::reprovision_delay),
    /// provision again with the new serial.
    async fn update_unit_serial(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        serial: &str,
    ) -> Result<(), Error> {
        self.delete_unit(target, unit).await?;
        tokio::time::sleep(self.reprovision_delay()).await;
        self.provision_unit(target, unit, serial).await
    }

    async fn reboot_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error>;

    /// Factory reset.
    async fn reset_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error>;

    async fn create_pppoe_account(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        request: &PppoeRequest,
    ) -> Result<(), Error>;

    /// Settle time between delete and re-provision in [`update_unit_serial`](Self::update_unit_serial).
    fn reprovision_delay(&self) -> Duration {
        Duration::from_secs(1)
    }
}
