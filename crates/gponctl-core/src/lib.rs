//! Polling, reconciliation and inventory engine between `gponctl-api` and
//! its consumers (CLI, daemons).
//!
//! - **[`Controller`]**: facade owning the gateway, store and engine.
//!   [`start()`](Controller::start) spawns the periodic poll loop;
//!   `trigger_poll` / `trigger_sync` run one cycle on demand; unit
//!   operations (provision, delete, reboot, reset, serial update, PPPoE)
//!   go to the device first and to the inventory second.
//!
//! - **[`SyncEngine`]**: one single-flight cycle per OLT (status,
//!   performance, unit list, reconcile), committed as one transaction.
//!
//! - **[`DeviceGateway`]**: dispatch to the SNMP, SSH or REST adapter the
//!   operator picked, plus normalization of device replies.
//!
//! - **[`InventoryStore`]**: transactional inventory seam, with
//!   [`MemoryStore`] as the JSON-file-backed implementation.
//!
//! - **Domain model** ([`model`]): `Olt`, `Onu`, `Alarm`, `PppoeAccount`
//!   and the transient poll results.

pub mod config;
pub mod controller;
pub mod convert;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, EngineConfig};
pub use controller::Controller;
pub use crypto::SecretCipher;
pub use engine::{plan_reconciliation, PollState, ReconcilePlan, SyncEngine};
pub use error::CoreError;
pub use gateway::{DeviceGateway, Method, Operation, StatusProbe};
pub use store::{InventoryStore, InventoryTx, MemoryStore};

pub use model::{
    AdminStatus, Alarm, AlarmId, AlarmSeverity, AlarmStatus, ApiSettings, CycleResult,
    DeviceStateUpdate, NewAlarm, NewUnit, Olt, OltId, OltPerformance, OltStatus, Onu, OnuStatus,
    PollResult, PollSnapshot, PppoeAccount, PppoeAccountId, PppoeAccountWrite, PppoeCredentials,
    PppoeStatus, SnmpSettings, SshSettings, StoredSecret, SyncResult, SystemSummary, UnitId,
    UnitKey, UnitSnapshot, UnitUpsert,
};
