// ── Poll & Sync Engine ──
//
// One independent cycle per OLT: status → performance → unit list →
// reconcile. Cycles for the same OLT are single-flight; cycles for
// different OLTs share nothing but the store. Every write for one OLT
// goes through one transaction, so a cancelled or failed cycle leaves
// the inventory as it was.

mod reconcile;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::convert;
use crate::crypto::SecretCipher;
use crate::error::CoreError;
use crate::gateway::{DeviceGateway, Method};
use crate::model::{
    Alarm, CycleResult, DeviceStateUpdate, Olt, OltId, PollResult, PollSnapshot, SyncResult,
    UnitKey,
};
use crate::store::{InventoryStore, InventoryTx};

pub use reconcile::{plan_reconciliation, ReconcilePlan};
pub use state::PollState;

use state::{IdleOnDrop, PollStates};

const ALARM_CHANNEL_SIZE: usize = 256;

/// Drives polling and reconciliation for every OLT in the store.
pub struct SyncEngine {
    store: Arc<dyn InventoryStore>,
    gateway: DeviceGateway,
    cipher: Arc<SecretCipher>,
    config: EngineConfig,
    locks: DashMap<OltId, Arc<Mutex<()>>>,
    states: PollStates,
    alarm_tx: broadcast::Sender<Arc<Alarm>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        gateway: DeviceGateway,
        cipher: Arc<SecretCipher>,
        config: EngineConfig,
    ) -> Self {
        let (alarm_tx, _) = broadcast::channel(ALARM_CHANNEL_SIZE);
        Self {
            store,
            gateway,
            cipher,
            config,
            locks: DashMap::new(),
            states: PollStates::default(),
            alarm_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Alarms raised by reconciliation, delivered after their commit.
    pub fn subscribe_alarms(&self) -> broadcast::Receiver<Arc<Alarm>> {
        self.alarm_tx.subscribe()
    }

    pub fn state(&self, olt_id: OltId) -> PollState {
        self.states.get(olt_id)
    }

    pub fn watch_state(&self, olt_id: OltId) -> watch::Receiver<PollState> {
        self.states.subscribe(olt_id)
    }

    /// Take the single-flight lock for `olt_id`. Held for a whole cycle and
    /// for every administrative operation on that OLT.
    pub async fn lock(&self, olt_id: OltId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(olt_id).or_default().value());
        lock.lock_owned().await
    }

    // ── Entry points ─────────────────────────────────────────────────

    /// Status and performance only. Unit rows are not touched.
    pub async fn poll(&self, olt_id: OltId) -> Result<PollResult, CoreError> {
        let _guard = self.lock(olt_id).await;
        let _idle = IdleOnDrop {
            states: &self.states,
            olt_id,
        };
        let result = self.deadline(self.poll_locked(olt_id)).await;
        self.note_failure(olt_id, result.as_ref().err());
        result
    }

    /// Enumerate units and reconcile, without a status poll first.
    pub async fn sync(&self, olt_id: OltId, method: Option<Method>) -> Result<SyncResult, CoreError> {
        let _guard = self.lock(olt_id).await;
        let _idle = IdleOnDrop {
            states: &self.states,
            olt_id,
        };
        let method = method.unwrap_or(self.config.default_method);
        let result = self
            .deadline(async {
                let olt = self.device(olt_id).await?;
                self.sync_locked(&olt, method).await
            })
            .await;
        self.note_failure(olt_id, result.as_ref().err());
        result
    }

    /// Full cycle. An offline OLT ends the cycle after the status write.
    pub async fn poll_and_sync(&self, olt_id: OltId, method: Option<Method>) -> Result<CycleResult, CoreError> {
        let _guard = self.lock(olt_id).await;
        let _idle = IdleOnDrop {
            states: &self.states,
            olt_id,
        };
        let method = method.unwrap_or(self.config.default_method);
        let result = self
            .deadline(async {
                let poll = self.poll_locked(olt_id).await?;
                if !poll.status.is_online() {
                    debug!(%olt_id, "OLT offline, skipping unit sync");
                    return Ok(CycleResult { poll, sync: None });
                }
                let olt = self.device(olt_id).await?;
                let sync = self.sync_locked(&olt, method).await?;
                Ok(CycleResult {
                    poll,
                    sync: Some(sync),
                })
            })
            .await;
        self.note_failure(olt_id, result.as_ref().err());
        result
    }

    /// One cycle for every stored OLT, each on its own task. A failing or
    /// panicking OLT never affects the others.
    pub async fn poll_all(self: &Arc<Self>) -> Result<Vec<(OltId, Result<CycleResult, CoreError>)>, CoreError> {
        let devices = self.store.list_devices().await?;
        let handles: Vec<_> = devices
            .iter()
            .map(|olt| {
                let engine = Arc::clone(self);
                let olt_id = olt.id;
                (olt_id, tokio::spawn(async move { engine.poll_and_sync(olt_id, None).await }))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (olt_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let err = CoreError::Internal(format!("poll cycle for OLT {olt_id} aborted: {e}"));
                    self.note_failure(olt_id, Some(&err));
                    Err(err)
                }
            };
            match &result {
                Ok(cycle) => match &cycle.sync {
                    Some(sync) => info!(
                        %olt_id,
                        created = sync.created,
                        updated = sync.updated,
                        status_changes = sync.status_changes,
                        alarms = sync.alarms_raised,
                        "cycle complete"
                    ),
                    None => info!(%olt_id, status = %cycle.poll.status, "cycle complete"),
                },
                Err(e) => warn!(%olt_id, error = %e, transient = e.is_transient(), "cycle failed"),
            }
            results.push((olt_id, result));
        }
        Ok(results)
    }

    // ── Cycle steps ──────────────────────────────────────────────────

    async fn deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        tokio::time::timeout(self.config.task_timeout, fut)
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: self.config.task_timeout.as_secs(),
            })?
    }

    fn note_failure(&self, olt_id: OltId, error: Option<&CoreError>) {
        if let Some(e) = error {
            self.states.set(
                olt_id,
                PollState::Failed {
                    reason: e.to_string(),
                },
            );
        }
    }

    async fn device(&self, olt_id: OltId) -> Result<Olt, CoreError> {
        self.store
            .get_device(olt_id)
            .await?
            .ok_or(CoreError::OltNotFound { id: olt_id })
    }

    async fn poll_locked(&self, olt_id: OltId) -> Result<PollResult, CoreError> {
        self.states.set(olt_id, PollState::Polling);
        let olt = self.device(olt_id).await?;
        let target = convert::device_target(&olt, &self.cipher);

        let probe = self.gateway.probe(&target).await;
        let performance = if probe.status.is_online() {
            match self.gateway.poll_performance(&target).await {
                Ok(perf) => Some(perf),
                Err(e) => {
                    debug!(%olt_id, error = %e, "performance unavailable");
                    None
                }
            }
        } else {
            None
        };

        let hostname = probe
            .system
            .as_ref()
            .and_then(|s| s.system_name.clone())
            .filter(|name| !name.trim().is_empty());
        let firmware_version = probe
            .system
            .as_ref()
            .and_then(|s| s.description.as_deref())
            .and_then(convert::firmware_from_description);
        let update = DeviceStateUpdate {
            status: probe.status,
            polled_at: Utc::now(),
            performance: performance.clone(),
            hostname,
            firmware_version,
        };

        let mut tx = self.store.begin().await?;
        if let Err(e) = tx.update_device_state(olt_id, update).await {
            rollback(tx, olt_id).await;
            return Err(e);
        }
        tx.commit().await?;

        debug!(%olt_id, status = %probe.status, "status recorded");
        Ok(PollResult {
            olt_id,
            status: probe.status,
            performance,
            system: probe.system,
        })
    }

    async fn sync_locked(&self, olt: &Olt, method: Method) -> Result<SyncResult, CoreError> {
        let olt_id = olt.id;
        self.states.set(olt_id, PollState::Polling);
        let target = convert::device_target(olt, &self.cipher);

        // A failed listing discards everything fetched so far.
        let snapshot = self.gateway.list_units(&target, method).await?;
        if snapshot.truncated {
            warn!(%olt_id, units = snapshot.units.len(), "unit listing hit the row cap");
        }

        self.states.set(olt_id, PollState::Reconciling);
        self.reconcile(olt_id, &snapshot).await
    }

    /// Broadcast a committed alarm. No subscribers is fine.
    pub(crate) fn announce(&self, alarm: Arc<Alarm>) {
        let _ = self.alarm_tx.send(alarm);
    }

    /// Plan and apply `snapshot` in one transaction.
    async fn reconcile(&self, olt_id: OltId, snapshot: &PollSnapshot) -> Result<SyncResult, CoreError> {
        let failed = |cause: CoreError| CoreError::SyncFailed {
            olt_id,
            cause: Box::new(cause),
        };

        let mut tx = self.store.begin().await.map_err(failed)?;
        let (plan, alarms) = match stage(tx.as_mut(), olt_id, snapshot).await {
            Ok(staged) => staged,
            Err(e) => {
                rollback(tx, olt_id).await;
                return Err(failed(e));
            }
        };
        tx.commit().await.map_err(failed)?;

        for alarm in alarms.iter().cloned() {
            warn!(%olt_id, unit_id = ?alarm.unit_id, message = %alarm.message, "alarm raised");
            self.announce(alarm);
        }

        Ok(SyncResult {
            olt_id,
            created: plan.creates(),
            updated: plan.updates(),
            status_changes: plan.status_changes(),
            alarms_raised: alarms.len(),
            truncated: snapshot.truncated,
        })
    }
}

/// Look up, plan and stage. Nothing is visible until the caller commits.
async fn stage(
    tx: &mut dyn InventoryTx,
    olt_id: OltId,
    snapshot: &PollSnapshot,
) -> Result<(ReconcilePlan, Vec<Arc<Alarm>>), CoreError> {
    let mut existing = HashMap::with_capacity(snapshot.units.len());
    for unit in &snapshot.units {
        let key = UnitKey::new(olt_id, unit.pon_port, unit.onu_id);
        if let Some(row) = tx.get_unit_by_key(&key).await? {
            existing.insert((unit.pon_port, unit.onu_id), row);
        }
    }

    let plan = plan_reconciliation(olt_id, &snapshot.units, &existing, Utc::now());
    for write in &plan.writes {
        tx.upsert_unit(write.clone()).await?;
    }
    let mut alarms = Vec::with_capacity(plan.alarms.len());
    for alarm in &plan.alarms {
        let id = tx.insert_alarm(alarm.clone()).await?;
        alarms.push(Arc::new(alarm.clone().into_alarm(id)));
    }
    Ok((plan, alarms))
}

async fn rollback(tx: Box<dyn InventoryTx>, olt_id: OltId) {
    if let Err(e) = tx.rollback().await {
        warn!(%olt_id, error = %e, "rollback failed");
    }
}
