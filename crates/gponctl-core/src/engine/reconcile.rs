// ── Reconciliation planning ──
//
// Pure diff between one OLT's unit snapshot and the rows already stored
// at the same positions. No I/O: the engine looks the rows up inside its
// transaction, hands them in, and applies the resulting plan.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{NewAlarm, NewUnit, OltId, Onu, OnuStatus, UnitSnapshot, UnitUpsert};

/// Writes for one OLT, in the order the device listed its units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub writes: Vec<UnitUpsert>,
    /// `onu_down` alarms for matched units that went Online → Offline.
    pub alarms: Vec<NewAlarm>,
    /// Matched units whose status did not change.
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn creates(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w, UnitUpsert::Create(_)))
            .count()
    }

    pub fn updates(&self) -> usize {
        self.writes.len() - self.creates()
    }

    pub fn status_changes(&self) -> usize {
        self.updates() - self.unchanged
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.alarms.is_empty()
    }
}

/// Plan the merge of `snapshot` into inventory.
///
/// `existing` maps `(pon_port, onu_id)` to the stored row at that position.
/// Units stored but absent from the snapshot are not touched. Matched rows
/// always get fresh optics, counters and `last_seen_at`; a missing reading
/// overwrites the stored one with `None`.
pub fn plan_reconciliation(
    olt_id: OltId,
    snapshot: &[UnitSnapshot],
    existing: &HashMap<(u32, u32), Onu>,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for unit in snapshot {
        let Some(stored) = existing.get(&(unit.pon_port, unit.onu_id)) else {
            plan.writes.push(UnitUpsert::Create(NewUnit {
                olt_id,
                serial_number: unit.serial_number.clone(),
                pon_port: unit.pon_port,
                onu_id: unit.onu_id,
                status: unit.status,
                rx_power: unit.rx_power_dbm,
                tx_power: unit.tx_power_dbm,
                rx_bytes: unit.rx_bytes,
                tx_bytes: unit.tx_bytes,
                provisioned_at: now,
                last_seen_at: Some(now),
            }));
            continue;
        };

        let mut row = stored.clone();
        if row.status == unit.status {
            plan.unchanged += 1;
        } else {
            if row.status == OnuStatus::Online && unit.status == OnuStatus::Offline {
                plan.alarms
                    .push(NewAlarm::onu_down(olt_id, row.id, &row.serial_number, now));
            }
            row.status = unit.status;
            row.last_status_change = Some(now);
        }
        row.rx_power = unit.rx_power_dbm;
        row.tx_power = unit.tx_power_dbm;
        row.rx_bytes = unit.rx_bytes;
        row.tx_bytes = unit.tx_bytes;
        row.last_seen_at = Some(now);
        plan.writes.push(UnitUpsert::Update(row));
    }

    plan
}
