// ── In-memory inventory ──
//
// Reference `InventoryStore`. Transactions stage writes in an overlay and
// apply them under one commit lock; uniqueness of serials and unit keys is
// checked against the merged result before anything becomes visible. With
// a backing file, the merged inventory is written (tmp + rename) before
// the in-memory swap, so a failed write leaves both unchanged.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{InventoryStore, InventoryTx};
use crate::error::CoreError;
use crate::model::{
    Alarm, AlarmId, AlarmStatus, DeviceStateUpdate, NewAlarm, Olt, OltId, Onu, PppoeAccount,
    PppoeAccountId, PppoeAccountWrite, PppoeStatus, UnitId, UnitKey, UnitUpsert,
};

// ── Inventory state ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Inventory {
    olts: BTreeMap<OltId, Olt>,
    units: BTreeMap<UnitId, Onu>,
    alarms: BTreeMap<AlarmId, Alarm>,
    pppoe: BTreeMap<PppoeAccountId, PppoeAccount>,
}

/// On-disk layout: flat lists, one per table.
#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    olts: Vec<Olt>,
    #[serde(default)]
    units: Vec<Onu>,
    #[serde(default)]
    alarms: Vec<Alarm>,
    #[serde(default)]
    pppoe_accounts: Vec<PppoeAccount>,
}

impl Inventory {
    fn from_file(file: InventoryFile) -> Self {
        Self {
            olts: file.olts.into_iter().map(|o| (o.id, o)).collect(),
            units: file.units.into_iter().map(|u| (u.id, u)).collect(),
            alarms: file.alarms.into_iter().map(|a| (a.id, a)).collect(),
            pppoe: file.pppoe_accounts.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    fn to_file(&self) -> InventoryFile {
        InventoryFile {
            olts: self.olts.values().cloned().collect(),
            units: self.units.values().cloned().collect(),
            alarms: self.alarms.values().cloned().collect(),
            pppoe_accounts: self.pppoe.values().cloned().collect(),
        }
    }

    /// Highest id in any table.
    fn max_id(&self) -> u64 {
        let olts = self.olts.keys().map(|k| k.0);
        let units = self.units.keys().map(|k| k.0);
        let alarms = self.alarms.keys().map(|k| k.0);
        let pppoe = self.pppoe.keys().map(|k| k.0);
        olts.chain(units).chain(alarms).chain(pppoe).max().unwrap_or(0)
    }

    fn check_unique(&self) -> Result<(), CoreError> {
        let mut serials = HashSet::with_capacity(self.units.len());
        let mut keys = HashSet::with_capacity(self.units.len());
        for unit in self.units.values() {
            if !serials.insert(unit.serial_number.as_str()) {
                return Err(CoreError::store(format!(
                    "serial number {} already exists",
                    unit.serial_number
                )));
            }
            if !keys.insert(unit.key()) {
                return Err(CoreError::store(format!("{} is already occupied", unit.key())));
            }
        }
        let mut usernames = HashSet::with_capacity(self.pppoe.len());
        for account in self.pppoe.values() {
            if !usernames.insert(account.username.as_str()) {
                return Err(CoreError::store(format!(
                    "PPPoE username {} already exists",
                    account.username
                )));
            }
        }
        Ok(())
    }
}

struct Shared {
    state: RwLock<Inventory>,
    next_id: AtomicU64,
    path: Option<PathBuf>,
    /// Serializes every mutation, including the file write.
    commit_lock: Mutex<()>,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, Inventory> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Inventory {
        self.read().clone()
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Persist (when file-backed) and publish `next`. Caller holds `commit_lock`.
    async fn publish(&self, next: Inventory) -> Result<(), CoreError> {
        if let Some(path) = &self.path {
            write_file(path, &next).await?;
        }
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }
}

async fn write_file(path: &Path, inventory: &Inventory) -> Result<(), CoreError> {
    let json = serde_json::to_vec_pretty(&inventory.to_file())
        .map_err(|e| CoreError::store(format!("cannot encode inventory: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::store(format!("cannot create {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| CoreError::store(format!("cannot write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| CoreError::store(format!("cannot replace {}: {e}", path.display())))?;
    debug!(path = %path.display(), "inventory saved");
    Ok(())
}

// ── MemoryStore ──────────────────────────────────────────────────────

/// In-memory inventory with optional JSON file persistence.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.read();
        f.debug_struct("MemoryStore")
            .field("path", &self.shared.path)
            .field("olts", &state.olts.len())
            .field("units", &state.units.len())
            .field("alarms", &state.alarms.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty, not file-backed.
    pub fn new() -> Self {
        Self::with_state(Inventory::default(), None)
    }

    fn with_state(state: Inventory, path: Option<PathBuf>) -> Self {
        let next_id = state.max_id() + 1;
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                next_id: AtomicU64::new(next_id),
                path,
                commit_lock: Mutex::new(()),
            }),
        }
    }

    /// Load the inventory at `path`, or start empty if it does not exist.
    /// Every commit is written back to the same file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: InventoryFile = serde_json::from_slice(&bytes).map_err(|e| CoreError::Config {
                    message: format!("invalid inventory file {}: {e}", path.display()),
                })?;
                Inventory::from_file(file)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Inventory::default(),
            Err(e) => {
                return Err(CoreError::Config {
                    message: format!("cannot read inventory file {}: {e}", path.display()),
                });
            }
        };
        Ok(Self::with_state(state, Some(path)))
    }

    pub fn path(&self) -> Option<&Path> {
        self.shared.path.as_deref()
    }

    /// Write the current inventory to the backing file.
    pub async fn save(&self) -> Result<(), CoreError> {
        let _guard = self.shared.commit_lock.lock().await;
        match &self.shared.path {
            Some(path) => write_file(path, &self.shared.snapshot()).await,
            None => Ok(()),
        }
    }

    // ── Read helpers ─────────────────────────────────────────────────

    pub fn units(&self) -> Vec<Onu> {
        self.shared.read().units.values().cloned().collect()
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.shared.read().alarms.values().cloned().collect()
    }

    pub fn pppoe_accounts(&self) -> Vec<PppoeAccount> {
        self.shared.read().pppoe.values().cloned().collect()
    }

    pub fn devices(&self) -> Vec<Olt> {
        self.shared.read().olts.values().cloned().collect()
    }

    async fn update_alarm(
        &self,
        id: AlarmId,
        change: impl FnOnce(&mut Alarm) -> Result<(), CoreError> + Send,
    ) -> Result<Alarm, CoreError> {
        let _guard = self.shared.commit_lock.lock().await;
        let mut next = self.shared.snapshot();
        let alarm = next.alarms.get_mut(&id).ok_or(CoreError::AlarmNotFound { id })?;
        change(alarm)?;
        let updated = alarm.clone();
        self.shared.publish(next).await?;
        Ok(updated)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_device(&self, mut olt: Olt) -> Result<OltId, CoreError> {
        let _guard = self.shared.commit_lock.lock().await;
        if olt.id.0 == 0 {
            olt.id = OltId(self.shared.allocate());
        } else {
            self.shared.next_id.fetch_max(olt.id.0 + 1, Ordering::Relaxed);
        }
        let id = olt.id;
        let mut next = self.shared.snapshot();
        next.olts.insert(id, olt);
        self.shared.publish(next).await?;
        Ok(id)
    }

    async fn get_device(&self, id: OltId) -> Result<Option<Olt>, CoreError> {
        Ok(self.shared.read().olts.get(&id).cloned())
    }

    async fn list_devices(&self) -> Result<Vec<Olt>, CoreError> {
        Ok(self.devices())
    }

    async fn list_units(&self, olt_id: Option<OltId>) -> Result<Vec<Onu>, CoreError> {
        Ok(self
            .shared
            .read()
            .units
            .values()
            .filter(|u| olt_id.is_none_or(|id| u.olt_id == id))
            .cloned()
            .collect())
    }

    async fn list_alarms(&self) -> Result<Vec<Alarm>, CoreError> {
        Ok(self.alarms())
    }

    async fn get_pppoe_account(&self, unit_id: UnitId) -> Result<Option<PppoeAccount>, CoreError> {
        Ok(self
            .shared
            .read()
            .pppoe
            .values()
            .find(|a| a.unit_id == unit_id)
            .cloned())
    }

    async fn acknowledge_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<Alarm, CoreError> {
        self.update_alarm(id, |alarm| match alarm.status {
            AlarmStatus::Active => {
                alarm.status = AlarmStatus::Acknowledged;
                alarm.acknowledged_at = Some(at);
                Ok(())
            }
            AlarmStatus::Acknowledged => Ok(()),
            AlarmStatus::Cleared => Err(CoreError::Conflict {
                message: format!("alarm {id} is already cleared"),
            }),
        })
        .await
    }

    async fn clear_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<Alarm, CoreError> {
        self.update_alarm(id, |alarm| {
            if alarm.status != AlarmStatus::Cleared {
                alarm.status = AlarmStatus::Cleared;
                alarm.cleared_at = Some(at);
            }
            Ok(())
        })
        .await
    }

    async fn begin(&self) -> Result<Box<dyn InventoryTx>, CoreError> {
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.shared),
            units: BTreeMap::new(),
            alarms: Vec::new(),
            devices: Vec::new(),
            pppoe: Vec::new(),
        }))
    }
}

// ── Transaction ──────────────────────────────────────────────────────

struct MemoryTx {
    shared: Arc<Shared>,
    /// Staged unit rows; `None` marks a delete.
    units: BTreeMap<UnitId, Option<Onu>>,
    alarms: Vec<Alarm>,
    devices: Vec<(OltId, DeviceStateUpdate)>,
    pppoe: Vec<(PppoeAccountId, PppoeAccountWrite)>,
}

impl MemoryTx {
    /// Find a unit in the merged view: staged rows first, then committed
    /// rows the transaction has not touched.
    fn find_unit(&self, pred: impl Fn(&Onu) -> bool) -> Option<Onu> {
        if let Some(unit) = self.units.values().flatten().find(|u| pred(u)) {
            return Some(unit.clone());
        }
        let state = self.shared.read();
        state
            .units
            .values()
            .filter(|u| !self.units.contains_key(&u.id))
            .find(|u| pred(u))
            .cloned()
    }

    fn unit_exists(&self, id: UnitId) -> bool {
        match self.units.get(&id) {
            Some(staged) => staged.is_some(),
            None => self.shared.read().units.contains_key(&id),
        }
    }
}

#[async_trait]
impl InventoryTx for MemoryTx {
    async fn get_unit_by_key(&mut self, key: &UnitKey) -> Result<Option<Onu>, CoreError> {
        Ok(self.find_unit(|u| u.key() == *key))
    }

    async fn get_unit_by_serial(&mut self, serial: &str) -> Result<Option<Onu>, CoreError> {
        Ok(self.find_unit(|u| u.serial_number == serial))
    }

    async fn get_unit(&mut self, id: UnitId) -> Result<Option<Onu>, CoreError> {
        Ok(self.find_unit(|u| u.id == id))
    }

    async fn upsert_unit(&mut self, unit: UnitUpsert) -> Result<UnitId, CoreError> {
        match unit {
            UnitUpsert::Create(new) => {
                let id = UnitId(self.shared.allocate());
                self.units.insert(id, Some(new.into_onu(id)));
                Ok(id)
            }
            UnitUpsert::Update(onu) => {
                if !self.unit_exists(onu.id) {
                    return Err(CoreError::UnitNotFound {
                        identifier: onu.id.to_string(),
                    });
                }
                let id = onu.id;
                self.units.insert(id, Some(onu));
                Ok(id)
            }
        }
    }

    async fn delete_unit(&mut self, id: UnitId) -> Result<(), CoreError> {
        if !self.unit_exists(id) {
            return Err(CoreError::UnitNotFound {
                identifier: id.to_string(),
            });
        }
        self.units.insert(id, None);
        Ok(())
    }

    async fn insert_alarm(&mut self, alarm: NewAlarm) -> Result<AlarmId, CoreError> {
        let id = AlarmId(self.shared.allocate());
        self.alarms.push(alarm.into_alarm(id));
        Ok(id)
    }

    async fn update_device_state(&mut self, id: OltId, update: DeviceStateUpdate) -> Result<(), CoreError> {
        if !self.shared.read().olts.contains_key(&id) {
            return Err(CoreError::OltNotFound { id });
        }
        self.devices.push((id, update));
        Ok(())
    }

    async fn upsert_pppoe_account(&mut self, account: PppoeAccountWrite) -> Result<PppoeAccountId, CoreError> {
        if !self.unit_exists(account.unit_id) {
            return Err(CoreError::UnitNotFound {
                identifier: account.unit_id.to_string(),
            });
        }
        let staged = self
            .pppoe
            .iter()
            .find(|(_, w)| w.unit_id == account.unit_id)
            .map(|(id, _)| *id);
        let committed = || {
            self.shared
                .read()
                .pppoe
                .values()
                .find(|a| a.unit_id == account.unit_id)
                .map(|a| a.id)
        };
        let id = staged
            .or_else(committed)
            .unwrap_or_else(|| PppoeAccountId(self.shared.allocate()));
        self.pppoe.push((id, account));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), CoreError> {
        let this = *self;
        let _guard = this.shared.commit_lock.lock().await;
        let mut next = this.shared.snapshot();

        for (id, staged) in this.units {
            match staged {
                Some(unit) => {
                    next.units.insert(id, unit);
                }
                None => {
                    next.units.remove(&id);
                    next.pppoe.retain(|_, a| a.unit_id != id);
                }
            }
        }
        for (id, update) in this.devices {
            let olt = next
                .olts
                .get_mut(&id)
                .ok_or_else(|| CoreError::store(format!("OLT {id} disappeared before commit")))?;
            update.apply(olt);
        }
        for alarm in this.alarms {
            next.alarms.insert(alarm.id, alarm);
        }
        for (id, write) in this.pppoe {
            if !next.units.contains_key(&write.unit_id) {
                return Err(CoreError::store(format!(
                    "PPPoE account for missing unit {}",
                    write.unit_id
                )));
            }
            let created_at = next.pppoe.get(&id).map_or(write.at, |a| a.created_at);
            let status = next.pppoe.get(&id).map_or(PppoeStatus::Active, |a| a.status);
            next.pppoe.insert(
                id,
                PppoeAccount {
                    id,
                    unit_id: write.unit_id,
                    username: write.username,
                    password_hash: write.password_hash,
                    service_name: write.service_name,
                    vlan_id: write.vlan_id,
                    status,
                    created_at,
                    updated_at: write.at,
                },
            );
        }

        next.check_unique()?;
        this.shared.publish(next).await
    }

    async fn rollback(self: Box<Self>) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{AlarmSeverity, NewUnit, OltStatus, OnuStatus};

    fn new_unit(olt_id: OltId, pon_port: u32, onu_id: u32, serial: &str) -> NewUnit {
        NewUnit {
            olt_id,
            serial_number: serial.into(),
            pon_port,
            onu_id,
            status: OnuStatus::Online,
            rx_power: Some(0.0),
            tx_power: None,
            rx_bytes: None,
            tx_bytes: None,
            provisioned_at: Utc::now(),
            last_seen_at: Some(Utc::now()),
        }
    }

    async fn store_with_olt() -> (MemoryStore, OltId) {
        let store = MemoryStore::new();
        let id = store
            .insert_device(Olt::new(OltId(0), "east", "10.0.0.1"))
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        let id = tx
            .upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG01")))
            .await
            .unwrap();

        assert!(store.units().is_empty());
        assert_eq!(tx.get_unit(id).await.unwrap().unwrap().serial_number, "ZTEG01");

        tx.commit().await.unwrap();
        assert_eq!(store.units().len(), 1);
        assert_eq!(store.units()[0].rx_power, Some(0.0));
        assert_eq!(store.units()[0].tx_power, None);
    }

    #[tokio::test]
    async fn dropped_transaction_is_discarded() {
        let (store, olt) = store_with_olt().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG01")))
                .await
                .unwrap();
            tx.insert_alarm(NewAlarm::onu_down(olt, UnitId(99), "ZTEG01", Utc::now()))
                .await
                .unwrap();
        }
        assert!(store.units().is_empty());
        assert!(store.alarms().is_empty());
    }

    #[tokio::test]
    async fn duplicate_serial_fails_whole_commit() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG01")))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 2, "ZTEG02")))
            .await
            .unwrap();
        tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 3, "ZTEG01")))
            .await
            .unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, CoreError::StoreWriteFailure { .. }), "{err:?}");
        assert_eq!(store.units().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_key_fails_commit() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG01")))
            .await
            .unwrap();
        tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG02")))
            .await
            .unwrap();
        assert!(tx.commit().await.is_err());
        assert!(store.units().is_empty());
    }

    #[tokio::test]
    async fn device_state_update_applies_on_commit() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        tx.update_device_state(olt, DeviceStateUpdate::status_only(OltStatus::Offline, Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.get_device(olt).await.unwrap().unwrap().status, OltStatus::Unknown);
        tx.commit().await.unwrap();
        let stored = store.get_device(olt).await.unwrap().unwrap();
        assert_eq!(stored.status, OltStatus::Offline);
        assert!(stored.last_polled_at.is_some());
    }

    #[tokio::test]
    async fn alarm_lifecycle() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        let id = tx
            .insert_alarm(NewAlarm::onu_down(olt, UnitId(5), "ZTEG05", Utc::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let alarm = &store.alarms()[0];
        assert_eq!(alarm.severity, AlarmSeverity::Major);
        assert_eq!(alarm.alarm_type, "onu_down");
        assert_eq!(alarm.message, "ONU ZTEG05 is offline");
        assert!(alarm.is_active());

        let acked = store.acknowledge_alarm(id, Utc::now()).await.unwrap();
        assert_eq!(acked.status, AlarmStatus::Acknowledged);
        let cleared = store.clear_alarm(id, Utc::now()).await.unwrap();
        assert_eq!(cleared.status, AlarmStatus::Cleared);
        assert!(matches!(
            store.acknowledge_alarm(id, Utc::now()).await,
            Err(CoreError::Conflict { .. })
        ));
        assert!(matches!(
            store.clear_alarm(AlarmId(999), Utc::now()).await,
            Err(CoreError::AlarmNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn pppoe_account_is_one_per_unit() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        let unit = tx
            .upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG01")))
            .await
            .unwrap();
        let write = |user: &str| PppoeAccountWrite {
            unit_id: unit,
            username: user.into(),
            password_hash: "$argon2id$v=19$fixture".into(),
            service_name: None,
            vlan_id: Some(100),
            at: Utc::now(),
        };
        let first = tx.upsert_pppoe_account(write("cust-1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let second = tx.upsert_pppoe_account(write("cust-1b")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, second);
        let accounts = store.pppoe_accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].username, "cust-1b");
    }

    #[tokio::test]
    async fn deleting_a_unit_drops_its_account() {
        let (store, olt) = store_with_olt().await;
        let mut tx = store.begin().await.unwrap();
        let unit = tx
            .upsert_unit(UnitUpsert::Create(new_unit(olt, 1, 1, "ZTEG01")))
            .await
            .unwrap();
        tx.upsert_pppoe_account(PppoeAccountWrite {
            unit_id: unit,
            username: "cust-1".into(),
            password_hash: "h".into(),
            service_name: None,
            vlan_id: None,
            at: Utc::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete_unit(unit).await.unwrap();
        assert!(tx.get_unit(unit).await.unwrap().is_none());
        tx.commit().await.unwrap();
        assert!(store.units().is_empty());
        assert!(store.pppoe_accounts().is_empty());
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inventory.json");

        let store = MemoryStore::open(&path).await.unwrap();
        let olt = store
            .insert_device(Olt::new(OltId(0), "east", "10.0.0.1"))
            .await
            .unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_unit(UnitUpsert::Create(new_unit(olt, 2, 7, "ZTEG27")))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.devices().len(), 1);
        let units = reopened.units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key(), UnitKey::new(olt, 2, 7));

        // Fresh ids continue after the loaded ones.
        let next = reopened
            .insert_device(Olt::new(OltId(0), "west", "10.0.0.2"))
            .await
            .unwrap();
        assert!(next.0 > units[0].id.0);
    }

    #[tokio::test]
    async fn missing_file_starts_empty_and_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("absent.json")).await.unwrap();
        assert!(store.devices().is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            MemoryStore::open(&bad).await,
            Err(CoreError::Config { .. })
        ));
    }
}
