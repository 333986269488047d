// ── Canonical domain model ──
//
// Transport-independent types shared by the gateway, engine, store and
// consumers. Everything here is plain data.

pub mod alarm;
pub mod ids;
pub mod olt;
pub mod onu;
pub mod pppoe;
pub mod snapshot;

pub use alarm::{Alarm, AlarmSeverity, AlarmStatus, NewAlarm, ONU_DOWN};
pub use ids::{AlarmId, OltId, PppoeAccountId, UnitId};
pub use olt::{
    ApiSettings, DeviceStateUpdate, Olt, OltPerformance, OltStatus, SnmpSettings, SshSettings,
    StoredSecret,
};
pub use onu::{AdminStatus, NewUnit, Onu, OnuStatus, UnitKey, UnitUpsert};
pub use pppoe::{PppoeAccount, PppoeAccountWrite, PppoeCredentials, PppoeStatus};
pub use snapshot::{CycleResult, PollResult, PollSnapshot, SyncResult, SystemSummary, UnitSnapshot};
