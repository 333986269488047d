// ── Inventory Store ──
//
// Durable OLT / ONU / Alarm / PPPoE state. The engine only ever writes
// through an `InventoryTx`; each OLT task opens its own transaction and
// nothing is visible to other readers until `commit`.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{
    Alarm, AlarmId, DeviceStateUpdate, NewAlarm, Olt, OltId, Onu, PppoeAccount, PppoeAccountId,
    PppoeAccountWrite, UnitId, UnitKey, UnitUpsert,
};

pub use memory::MemoryStore;

/// Shared handle to the inventory.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_device(&self, id: OltId) -> Result<Option<Olt>, CoreError>;

    async fn list_devices(&self) -> Result<Vec<Olt>, CoreError>;

    /// Add or replace an OLT record. An id of 0 gets a fresh id.
    async fn insert_device(&self, olt: Olt) -> Result<OltId, CoreError>;

    /// Units of one OLT, or of every OLT when `olt_id` is `None`.
    async fn list_units(&self, olt_id: Option<OltId>) -> Result<Vec<Onu>, CoreError>;

    async fn list_alarms(&self) -> Result<Vec<Alarm>, CoreError>;

    async fn get_pppoe_account(&self, unit_id: UnitId) -> Result<Option<PppoeAccount>, CoreError>;

    /// Operator acknowledgement. Only an active alarm can be acknowledged.
    async fn acknowledge_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<Alarm, CoreError>;

    /// Operator clear. Idempotent for an already-cleared alarm.
    async fn clear_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<Alarm, CoreError>;

    /// Open a transaction scope.
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, CoreError>;
}

/// One transaction. Dropping it without `commit` discards every staged write.
#[async_trait]
pub trait InventoryTx: Send {
    async fn get_unit_by_key(&mut self, key: &UnitKey) -> Result<Option<Onu>, CoreError>;

    async fn get_unit_by_serial(&mut self, serial: &str) -> Result<Option<Onu>, CoreError>;

    async fn get_unit(&mut self, id: UnitId) -> Result<Option<Onu>, CoreError>;

    async fn upsert_unit(&mut self, unit: UnitUpsert) -> Result<UnitId, CoreError>;

    async fn delete_unit(&mut self, id: UnitId) -> Result<(), CoreError>;

    async fn insert_alarm(&mut self, alarm: NewAlarm) -> Result<AlarmId, CoreError>;

    async fn update_device_state(&mut self, id: OltId, update: DeviceStateUpdate) -> Result<(), CoreError>;

    /// Create or replace the account bound to `account.unit_id`.
    async fn upsert_pppoe_account(&mut self, account: PppoeAccountWrite) -> Result<PppoeAccountId, CoreError>;

    /// Apply every staged write, or none.
    async fn commit(self: Box<Self>) -> Result<(), CoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), CoreError>;
}
