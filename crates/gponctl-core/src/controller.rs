// ── Controller ──
//
// Facade over the engine, gateway and store. On-demand calls report
// success or failure to the caller; the periodic loop only logs. Device
// operations run first and the inventory is written only when the device
// accepted them.

use std::sync::Arc;

use chrono::Utc;
use gponctl_api::UnitAddress;
use secrecy::SecretString;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::convert;
use crate::crypto::SecretCipher;
use crate::engine::{PollState, SyncEngine};
use crate::error::CoreError;
use crate::gateway::{DeviceGateway, Method, Operation};
use crate::model::{
    Alarm, AlarmId, NewAlarm, NewUnit, Olt, OltId, Onu, OnuStatus, PollResult, PppoeAccount, PppoeAccountWrite,
    PppoeCredentials, StoredSecret, SyncResult, UnitId, UnitKey, UnitUpsert,
};
use crate::store::InventoryStore;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<dyn InventoryStore>,
    gateway: DeviceGateway,
    engine: Arc<SyncEngine>,
    cipher: Arc<SecretCipher>,
    poller: Mutex<Option<Poller>>,
}

/// A running periodic loop. Each `start` gets a fresh token, so a
/// controller can be started again after `shutdown`.
struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("engine", &self.inner.engine)
            .field("cipher", &self.inner.cipher)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller. Does NOT start polling; call
    /// [`start()`](Self::start) for the periodic loop.
    pub fn new(config: ControllerConfig, store: Arc<dyn InventoryStore>, gateway: DeviceGateway) -> Self {
        let cipher = Arc::new(
            config
                .encryption_key
                .as_ref()
                .map_or_else(SecretCipher::plaintext, SecretCipher::new),
        );
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            gateway.clone(),
            Arc::clone(&cipher),
            config.engine.clone(),
        ));
        Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                gateway,
                engine,
                cipher,
                poller: Mutex::new(None),
            }),
        }
    }

    /// Controller over the real SNMP, SSH and REST transports.
    pub fn from_config(config: ControllerConfig, store: Arc<dyn InventoryStore>) -> Result<Self, CoreError> {
        let gateway = DeviceGateway::from_transport(&config.transport, config.oids.clone())?;
        Ok(Self::new(config, store, gateway))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.inner.store
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.inner.engine
    }

    /// Alarms raised by reconciliation.
    pub fn alarms(&self) -> broadcast::Receiver<Arc<Alarm>> {
        self.inner.engine.subscribe_alarms()
    }

    pub fn poll_state(&self, olt_id: OltId) -> watch::Receiver<PollState> {
        self.inner.engine.watch_state(olt_id)
    }

    // ── Inventory ────────────────────────────────────────────────────

    pub async fn list_devices(&self) -> Result<Vec<Olt>, CoreError> {
        self.inner.store.list_devices().await
    }

    pub async fn list_units(&self, olt_id: Option<OltId>) -> Result<Vec<Onu>, CoreError> {
        self.inner.store.list_units(olt_id).await
    }

    pub async fn list_alarms(&self) -> Result<Vec<Alarm>, CoreError> {
        self.inner.store.list_alarms().await
    }

    /// Add an OLT. Secrets must already be sealed with [`seal`](Self::seal).
    pub async fn register_device(&self, olt: Olt) -> Result<OltId, CoreError> {
        if olt.ip_address.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "OLT address must not be empty".into(),
            });
        }
        let id = self.inner.store.insert_device(olt).await?;
        info!(olt_id = %id, "OLT registered");
        Ok(id)
    }

    /// Encrypt a credential for storage with the configured key.
    pub fn seal(&self, secret: &SecretString) -> Result<StoredSecret, CoreError> {
        self.inner.cipher.seal(secret)
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// On-demand status poll.
    pub async fn trigger_poll(&self, olt_id: OltId) -> Result<PollResult, CoreError> {
        self.inner.engine.poll(olt_id).await
    }

    /// On-demand full cycle. Fails with `Unreachable` when the OLT is
    /// offline, since no reconciliation happened.
    pub async fn trigger_sync(&self, olt_id: OltId, method: Option<Method>) -> Result<SyncResult, CoreError> {
        let cycle = self.inner.engine.poll_and_sync(olt_id, method).await?;
        cycle.sync.ok_or_else(|| CoreError::Unreachable {
            reason: format!("OLT {olt_id} is offline"),
        })
    }

    // ── Unit operations ──────────────────────────────────────────────

    /// Provision a unit on the device, then record it as Online.
    pub async fn provision(
        &self,
        olt_id: OltId,
        pon_port: u32,
        onu_id: u32,
        serial: &str,
        method: Option<Method>,
    ) -> Result<Onu, CoreError> {
        let serial = validated_serial(serial)?;
        let method = self.method(method);
        let _guard = self.inner.engine.lock(olt_id).await;
        let olt = self.device(olt_id).await?;

        let mut tx = self.inner.store.begin().await?;
        if let Some(existing) = tx.get_unit_by_serial(&serial).await? {
            return Err(CoreError::Conflict {
                message: format!("serial {serial} already belongs to {}", existing.key()),
            });
        }
        let key = UnitKey::new(olt_id, pon_port, onu_id);
        if let Some(existing) = tx.get_unit_by_key(&key).await? {
            return Err(CoreError::Conflict {
                message: format!("{key} is occupied by {}", existing.serial_number),
            });
        }

        self.execute(
            &olt,
            pon_port,
            onu_id,
            &Operation::Provision {
                serial: serial.clone(),
            },
            method,
        )
        .await?;

        let now = Utc::now();
        let id = tx
            .upsert_unit(UnitUpsert::Create(NewUnit {
                olt_id,
                serial_number: serial,
                pon_port,
                onu_id,
                status: OnuStatus::Online,
                rx_power: None,
                tx_power: None,
                rx_bytes: None,
                tx_bytes: None,
                provisioned_at: now,
                last_seen_at: Some(now),
            }))
            .await?;
        let unit = tx.get_unit(id).await?.ok_or_else(|| CoreError::Internal(format!("staged unit {id} vanished")))?;
        tx.commit().await?;

        info!(%olt_id, pon_port, onu_id, serial = %unit.serial_number, %method, "unit provisioned");
        Ok(unit)
    }

    /// Remove a unit from the device and drop its inventory row, if any.
    pub async fn deprovision(
        &self,
        olt_id: OltId,
        pon_port: u32,
        onu_id: u32,
        method: Option<Method>,
    ) -> Result<(), CoreError> {
        let method = self.method(method);
        let _guard = self.inner.engine.lock(olt_id).await;
        let olt = self.device(olt_id).await?;

        self.execute(&olt, pon_port, onu_id, &Operation::Delete, method).await?;

        let mut tx = self.inner.store.begin().await?;
        match tx.get_unit_by_key(&UnitKey::new(olt_id, pon_port, onu_id)).await? {
            Some(unit) => {
                tx.delete_unit(unit.id).await?;
                tx.commit().await?;
            }
            None => debug!(%olt_id, pon_port, onu_id, "deleted unit had no inventory row"),
        }

        info!(%olt_id, pon_port, onu_id, %method, "unit deprovisioned");
        Ok(())
    }

    /// Replace the serial bound to a position.
    pub async fn update_serial(
        &self,
        olt_id: OltId,
        pon_port: u32,
        onu_id: u32,
        new_serial: &str,
        method: Option<Method>,
    ) -> Result<Onu, CoreError> {
        let serial = validated_serial(new_serial)?;
        let method = self.method(method);
        let _guard = self.inner.engine.lock(olt_id).await;
        let olt = self.device(olt_id).await?;

        let mut tx = self.inner.store.begin().await?;
        let key = UnitKey::new(olt_id, pon_port, onu_id);
        let mut unit = tx
            .get_unit_by_key(&key)
            .await?
            .ok_or_else(|| CoreError::UnitNotFound {
                identifier: key.to_string(),
            })?;
        if let Some(other) = tx.get_unit_by_serial(&serial).await? {
            if other.id != unit.id {
                return Err(CoreError::Conflict {
                    message: format!("serial {serial} already belongs to {}", other.key()),
                });
            }
        }

        self.execute(
            &olt,
            pon_port,
            onu_id,
            &Operation::UpdateSerial {
                serial: serial.clone(),
            },
            method,
        )
        .await?;

        unit.serial_number = serial;
        tx.upsert_unit(UnitUpsert::Update(unit.clone())).await?;
        tx.commit().await?;

        info!(%olt_id, pon_port, onu_id, serial = %unit.serial_number, %method, "serial updated");
        Ok(unit)
    }

    pub async fn reboot(&self, olt_id: OltId, pon_port: u32, onu_id: u32, method: Option<Method>) -> Result<(), CoreError> {
        self.device_only(olt_id, pon_port, onu_id, &Operation::Reboot, method).await
    }

    /// Factory reset.
    pub async fn reset(&self, olt_id: OltId, pon_port: u32, onu_id: u32, method: Option<Method>) -> Result<(), CoreError> {
        self.device_only(olt_id, pon_port, onu_id, &Operation::Reset, method).await
    }

    /// Push PPPoE credentials to a unit and store the account with a
    /// hashed password.
    pub async fn create_pppoe_account(
        &self,
        unit_id: UnitId,
        credentials: PppoeCredentials,
        method: Option<Method>,
    ) -> Result<PppoeAccount, CoreError> {
        if credentials.username.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "PPPoE username must not be empty".into(),
            });
        }
        let method = self.method(method);

        let olt_id = {
            let mut probe = self.inner.store.begin().await?;
            let unit = probe.get_unit(unit_id).await?.ok_or_else(|| CoreError::UnitNotFound {
                identifier: unit_id.to_string(),
            })?;
            unit.olt_id
        };
        let _guard = self.inner.engine.lock(olt_id).await;
        let olt = self.device(olt_id).await?;

        // Re-read under the lock; a sync may have moved or removed it.
        let mut tx = self.inner.store.begin().await?;
        let unit = tx.get_unit(unit_id).await?.ok_or_else(|| CoreError::UnitNotFound {
            identifier: unit_id.to_string(),
        })?;

        let write = PppoeAccountWrite::from_credentials(unit_id, &credentials, Utc::now())?;
        self.execute(
            &olt,
            unit.pon_port,
            unit.onu_id,
            &Operation::CreatePppoe { credentials },
            method,
        )
        .await?;

        tx.upsert_pppoe_account(write).await?;
        tx.commit().await?;

        info!(%olt_id, %unit_id, %method, "PPPoE account created");
        self.inner
            .store
            .get_pppoe_account(unit_id)
            .await?
            .ok_or_else(|| CoreError::Internal(format!("PPPoE account for unit {unit_id} vanished")))
    }

    // ── Alarms ───────────────────────────────────────────────────────

    /// Record an operator-raised alarm and announce it like an engine alarm.
    pub async fn raise_alarm(&self, alarm: NewAlarm) -> Result<Alarm, CoreError> {
        if alarm.message.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "alarm message must not be empty".into(),
            });
        }
        if let Some(olt_id) = alarm.olt_id {
            self.device(olt_id).await?;
        }

        let mut tx = self.inner.store.begin().await?;
        let id = tx.insert_alarm(alarm.clone()).await?;
        tx.commit().await?;

        let alarm = alarm.into_alarm(id);
        info!(alarm_id = %id, severity = %alarm.severity, kind = %alarm.alarm_type, "alarm raised by operator");
        self.inner.engine.announce(Arc::new(alarm.clone()));
        Ok(alarm)
    }

    pub async fn acknowledge_alarm(&self, id: AlarmId) -> Result<Alarm, CoreError> {
        self.inner.store.acknowledge_alarm(id, Utc::now()).await
    }

    /// Clearing is always an operator action; the engine never clears.
    pub async fn clear_alarm(&self, id: AlarmId) -> Result<Alarm, CoreError> {
        self.inner.store.clear_alarm(id, Utc::now()).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the periodic fan-out loop. A second call while it runs is a
    /// no-op.
    pub async fn start(&self) {
        let mut poller = self.inner.poller.lock().await;
        if poller.is_some() {
            debug!("poller already running");
            return;
        }
        let interval = self.inner.config.engine.poll_interval;
        info!(interval_secs = interval.as_secs(), "starting poller");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_task(self.clone(), interval, cancel.clone()));
        *poller = Some(Poller { cancel, handle });
    }

    /// Stop the loop. An in-flight cycle finishes (or times out) first.
    pub async fn shutdown(&self) {
        let Some(poller) = self.inner.poller.lock().await.take() else {
            return;
        };
        poller.cancel.cancel();
        if let Err(e) = poller.handle.await {
            warn!(error = %e, "poller task ended abnormally");
        }
        debug!("poller stopped");
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn method(&self, method: Option<Method>) -> Method {
        method.unwrap_or(self.inner.config.engine.default_method)
    }

    async fn device(&self, olt_id: OltId) -> Result<Olt, CoreError> {
        self.inner
            .store
            .get_device(olt_id)
            .await?
            .ok_or(CoreError::OltNotFound { id: olt_id })
    }

    async fn execute(
        &self,
        olt: &Olt,
        pon_port: u32,
        onu_id: u32,
        operation: &Operation,
        method: Method,
    ) -> Result<(), CoreError> {
        let target = convert::device_target(olt, &self.inner.cipher);
        let result = self
            .inner
            .gateway
            .execute(&target, UnitAddress::new(pon_port, onu_id), operation, method)
            .await;
        if let Err(e) = &result {
            warn!(olt_id = %olt.id, pon_port, onu_id, %method, op = operation.name(), error = %e, "unit operation failed");
        }
        result
    }

    async fn device_only(
        &self,
        olt_id: OltId,
        pon_port: u32,
        onu_id: u32,
        operation: &Operation,
        method: Option<Method>,
    ) -> Result<(), CoreError> {
        let method = self.method(method);
        let _guard = self.inner.engine.lock(olt_id).await;
        let olt = self.device(olt_id).await?;
        self.execute(&olt, pon_port, onu_id, operation, method).await?;
        info!(%olt_id, pon_port, onu_id, %method, op = operation.name(), "unit operation done");
        Ok(())
    }
}

fn validated_serial(serial: &str) -> Result<String, CoreError> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "serial number must not be empty".into(),
        });
    }
    Ok(serial.to_owned())
}

// ── Background task ──────────────────────────────────────────────────

/// Run one cycle per tick. The next tick waits for every OLT of the
/// current cycle; cancellation is only observed between cycles.
async fn poll_task(controller: Controller, interval: std::time::Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match controller.inner.engine.poll_all().await {
                    Ok(results) => {
                        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                        debug!(olts = results.len(), failed, "poll cycle finished");
                    }
                    Err(e) => warn!(error = %e, "cannot list OLTs for poll cycle"),
                }
            }
        }
    }
}
