#![allow(clippy::unwrap_used, dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gponctl_api::{
    DeviceAdapter, DeviceTarget, Error, OpticalPower, Performance, PppoeRequest, RawUnit,
    SystemInfo, UnitAddress, UnitListing,
};
use gponctl_core::{
    Alarm, AlarmId, Controller, ControllerConfig, CoreError, DeviceGateway, DeviceStateUpdate,
    InventoryStore, InventoryTx, MemoryStore, NewAlarm, NewUnit, Olt, OltId, Onu, OnuStatus,
    PppoeAccount, PppoeAccountId, PppoeAccountWrite, UnitId, UnitKey, UnitUpsert,
};

// ── Scripted device ──────────────────────────────────────────────────

/// What the next `list_units` call returns.
#[derive(Debug, Clone)]
pub enum Listing {
    Units(Vec<RawUnit>),
    /// Walk died after `fetched` rows.
    Partial { fetched: usize },
}

/// One fake standing in for all three transports.
pub struct FakeDevice {
    pub sys_name: Mutex<Option<String>>,
    pub sys_descr: Mutex<Option<String>>,
    pub rest_online: AtomicBool,
    pub performance: Mutex<Option<Performance>>,
    pub listing: Mutex<Listing>,
    pub list_delay: Mutex<Duration>,
    pub reject_ops: AtomicBool,
    /// Addresses that never answer.
    pub unreachable: Mutex<HashSet<String>>,
    /// Addresses whose unit listing panics mid-walk.
    pub panics: Mutex<HashSet<String>>,
    /// Call log, e.g. `list start 10.0.0.1`, `provision 1:2 ZTEG01`.
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            sys_name: Mutex::new(Some("olt-east".into())),
            sys_descr: Mutex::new(None),
            rest_online: AtomicBool::new(false),
            performance: Mutex::new(None),
            listing: Mutex::new(Listing::Units(Vec::new())),
            list_delay: Mutex::new(Duration::ZERO),
            reject_ops: AtomicBool::new(false),
            unreachable: Mutex::new(HashSet::new()),
            panics: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeDevice {
    pub fn set_units(&self, units: Vec<RawUnit>) {
        *self.listing.lock().unwrap() = Listing::Units(units);
    }

    pub fn go_offline(&self) {
        *self.sys_name.lock().unwrap() = None;
        self.rest_online.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_reachable(&self, target: &DeviceTarget) -> Result<(), Error> {
        if self.unreachable.lock().unwrap().contains(&target.address) {
            return Err(Error::Unreachable {
                address: target.address.clone(),
                reason: "no response".into(),
            });
        }
        Ok(())
    }

    fn operation(&self, target: &DeviceTarget, call: String) -> Result<(), Error> {
        self.check_reachable(target)?;
        self.log(call);
        if self.reject_ops.load(Ordering::SeqCst) {
            return Err(Error::Rejected {
                message: "%Error 20203: No such ONU".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceAdapter for FakeDevice {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn read_system_info(&self, target: &DeviceTarget) -> Result<SystemInfo, Error> {
        self.check_reachable(target)?;
        let name = self.sys_name.lock().unwrap().clone();
        if name.is_none() {
            return Err(Error::Timeout { timeout_secs: 5 });
        }
        Ok(SystemInfo {
            name,
            description: self.sys_descr.lock().unwrap().clone(),
            uptime_secs: Some(3600),
            location: None,
        })
    }

    async fn read_status(&self, target: &DeviceTarget) -> Result<bool, Error> {
        self.check_reachable(target)?;
        Ok(self.rest_online.load(Ordering::SeqCst))
    }

    async fn read_performance(&self, target: &DeviceTarget) -> Result<Performance, Error> {
        self.check_reachable(target)?;
        self.performance
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::Unsupported("read_performance"))
    }

    async fn list_units(&self, target: &DeviceTarget) -> Result<UnitListing, Error> {
        self.check_reachable(target)?;
        self.log(format!("list start {}", target.address));
        let blows_up = self.panics.lock().unwrap().contains(&target.address);
        assert!(!blows_up, "listing for {} blew up", target.address);
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let listing = self.listing.lock().unwrap().clone();
        self.log(format!("list end {}", target.address));
        match listing {
            Listing::Units(units) => Ok(UnitListing {
                units,
                truncated: false,
            }),
            Listing::Partial { fetched } => Err(Error::PartialList {
                fetched,
                reason: "request timed out".into(),
            }),
        }
    }

    async fn provision_unit(&self, target: &DeviceTarget, unit: UnitAddress, serial: &str) -> Result<(), Error> {
        self.operation(target, format!("provision {unit} {serial}"))
    }

    async fn delete_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.operation(target, format!("delete {unit}"))
    }

    async fn reboot_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.operation(target, format!("reboot {unit}"))
    }

    async fn reset_unit(&self, target: &DeviceTarget, unit: UnitAddress) -> Result<(), Error> {
        self.operation(target, format!("reset {unit}"))
    }

    async fn create_pppoe_account(
        &self,
        target: &DeviceTarget,
        unit: UnitAddress,
        request: &PppoeRequest,
    ) -> Result<(), Error> {
        self.operation(target, format!("pppoe {unit} {}", request.username))
    }

    fn reprovision_delay(&self) -> Duration {
        Duration::ZERO
    }
}

pub fn raw(pon_port: u32, onu_id: u32, serial: &str, status: &str) -> RawUnit {
    RawUnit {
        pon_port,
        onu_id,
        serial_number: serial.into(),
        status: status.into(),
        rx_power: Some(OpticalPower::CentiDbm(-2000)),
        tx_power: Some(OpticalPower::CentiDbm(250)),
        rx_bytes: Some(1_000),
        tx_bytes: Some(2_000),
    }
}

// ── Store with injectable commit failure ─────────────────────────────

/// Delegates to a [`MemoryStore`]; when `fail_unit_commits` is set, any
/// commit that carries unit writes fails without applying anything.
#[derive(Clone)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_unit_commits: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_unit_commits: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl InventoryStore for FailingStore {
    async fn get_device(&self, id: OltId) -> Result<Option<Olt>, CoreError> {
        self.inner.get_device(id).await
    }

    async fn list_devices(&self) -> Result<Vec<Olt>, CoreError> {
        self.inner.list_devices().await
    }

    async fn insert_device(&self, olt: Olt) -> Result<OltId, CoreError> {
        self.inner.insert_device(olt).await
    }

    async fn list_units(&self, olt_id: Option<OltId>) -> Result<Vec<Onu>, CoreError> {
        self.inner.list_units(olt_id).await
    }

    async fn list_alarms(&self) -> Result<Vec<Alarm>, CoreError> {
        self.inner.list_alarms().await
    }

    async fn get_pppoe_account(&self, unit_id: UnitId) -> Result<Option<PppoeAccount>, CoreError> {
        self.inner.get_pppoe_account(unit_id).await
    }

    async fn acknowledge_alarm(&self, id: AlarmId, at: chrono::DateTime<Utc>) -> Result<Alarm, CoreError> {
        self.inner.acknowledge_alarm(id, at).await
    }

    async fn clear_alarm(&self, id: AlarmId, at: chrono::DateTime<Utc>) -> Result<Alarm, CoreError> {
        self.inner.clear_alarm(id, at).await
    }

    async fn begin(&self) -> Result<Box<dyn InventoryTx>, CoreError> {
        Ok(Box::new(FailingTx {
            inner: self.inner.begin().await?,
            fail: self.fail_unit_commits.load(Ordering::SeqCst),
            touched_units: false,
        }))
    }
}

struct FailingTx {
    inner: Box<dyn InventoryTx>,
    fail: bool,
    touched_units: bool,
}

#[async_trait]
impl InventoryTx for FailingTx {
    async fn get_unit_by_key(&mut self, key: &UnitKey) -> Result<Option<Onu>, CoreError> {
        self.inner.get_unit_by_key(key).await
    }

    async fn get_unit_by_serial(&mut self, serial: &str) -> Result<Option<Onu>, CoreError> {
        self.inner.get_unit_by_serial(serial).await
    }

    async fn get_unit(&mut self, id: UnitId) -> Result<Option<Onu>, CoreError> {
        self.inner.get_unit(id).await
    }

    async fn upsert_unit(&mut self, unit: UnitUpsert) -> Result<UnitId, CoreError> {
        self.touched_units = true;
        self.inner.upsert_unit(unit).await
    }

    async fn delete_unit(&mut self, id: UnitId) -> Result<(), CoreError> {
        self.touched_units = true;
        self.inner.delete_unit(id).await
    }

    async fn insert_alarm(&mut self, alarm: NewAlarm) -> Result<AlarmId, CoreError> {
        self.inner.insert_alarm(alarm).await
    }

    async fn update_device_state(&mut self, id: OltId, update: DeviceStateUpdate) -> Result<(), CoreError> {
        self.inner.update_device_state(id, update).await
    }

    async fn upsert_pppoe_account(&mut self, account: PppoeAccountWrite) -> Result<PppoeAccountId, CoreError> {
        self.inner.upsert_pppoe_account(account).await
    }

    async fn commit(self: Box<Self>) -> Result<(), CoreError> {
        if self.fail && self.touched_units {
            return Err(CoreError::StoreWriteFailure {
                message: "disk full".into(),
            });
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), CoreError> {
        self.inner.rollback().await
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub store: MemoryStore,
    pub device: Arc<FakeDevice>,
    pub controller: Controller,
    pub olt: OltId,
}

pub async fn harness() -> Harness {
    harness_with(ControllerConfig::default(), None).await
}

/// Build a controller over `FakeDevice`. With `failing`, the controller
/// talks to that wrapper instead of the bare memory store.
pub async fn harness_with(config: ControllerConfig, failing: Option<FailingStore>) -> Harness {
    let store = failing.as_ref().map_or_else(MemoryStore::new, |f| f.inner.clone());
    let olt = store
        .insert_device(Olt::new(OltId(0), "east", "10.0.0.1"))
        .await
        .unwrap();

    let device = Arc::new(FakeDevice::default());
    let adapter: Arc<dyn DeviceAdapter> = device.clone();
    let gateway = DeviceGateway::new(adapter.clone(), adapter.clone(), adapter);
    let backing: Arc<dyn InventoryStore> = match failing {
        Some(f) => Arc::new(f),
        None => Arc::new(store.clone()),
    };
    let controller = Controller::new(config, backing, gateway);

    Harness {
        store,
        device,
        controller,
        olt,
    }
}

/// Insert a unit row directly.
pub async fn seed_unit(store: &MemoryStore, olt: OltId, pon_port: u32, onu_id: u32, serial: &str, status: OnuStatus) -> UnitId {
    let mut tx = store.begin().await.unwrap();
    let id = tx
        .upsert_unit(UnitUpsert::Create(NewUnit {
            olt_id: olt,
            serial_number: serial.into(),
            pon_port,
            onu_id,
            status,
            rx_power: Some(-19.0),
            tx_power: Some(2.0),
            rx_bytes: Some(5),
            tx_bytes: Some(6),
            provisioned_at: Utc::now(),
            last_seen_at: Some(Utc::now()),
        }))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    id
}

pub fn unit(store: &MemoryStore, serial: &str) -> Onu {
    store
        .units()
        .into_iter()
        .find(|u| u.serial_number == serial)
        .unwrap()
}
