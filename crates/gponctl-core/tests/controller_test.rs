#![allow(clippy::unwrap_used)]

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use gponctl_core::model::pppoe::verify_password;
use gponctl_core::{
    AlarmSeverity, AlarmStatus, ControllerConfig, CoreError, EngineConfig, Method, NewAlarm, Olt,
    OltId, OnuStatus, PppoeCredentials, UnitId,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;

use common::{harness, harness_with, raw, seed_unit, unit};

// ── Provisioning ─────────────────────────────────────────────────────

#[tokio::test]
async fn provision_records_online_unit_after_device_accepts() {
    let h = harness().await;

    let onu = h
        .controller
        .provision(h.olt, 1, 5, " ZTEG00000005 ", Some(Method::Ssh))
        .await
        .unwrap();

    assert_eq!(onu.serial_number, "ZTEG00000005");
    assert_eq!(onu.status, OnuStatus::Online);
    assert!(onu.provisioned_at.is_some());
    assert_eq!(h.device.calls(), vec!["provision 1:5 ZTEG00000005"]);
    assert_eq!(h.store.units(), vec![onu]);
}

#[tokio::test]
async fn duplicate_serial_is_rejected_before_touching_device() {
    let h = harness().await;
    seed_unit(&h.store, h.olt, 1, 1, "ZTEG0001", OnuStatus::Online).await;

    let err = h
        .controller
        .provision(h.olt, 2, 9, "ZTEG0001", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");
    assert!(h.device.calls().is_empty());
    assert_eq!(h.store.units().len(), 1);
}

#[tokio::test]
async fn occupied_position_is_a_conflict() {
    let h = harness().await;
    seed_unit(&h.store, h.olt, 1, 1, "ZTEG0001", OnuStatus::Online).await;
    let err = h
        .controller
        .provision(h.olt, 1, 1, "ZTEG0002", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err:?}");
}

#[tokio::test]
async fn device_rejection_leaves_inventory_alone() {
    let h = harness().await;
    h.device.reject_ops.store(true, Ordering::SeqCst);

    let err = h
        .controller
        .provision(h.olt, 1, 5, "ZTEG0005", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Rejected { .. }), "{err:?}");
    assert!(h.store.units().is_empty());
}

#[tokio::test]
async fn blank_serial_is_invalid() {
    let h = harness().await;
    let err = h.controller.provision(h.olt, 1, 1, "   ", None).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn deprovision_removes_row() {
    let h = harness().await;
    seed_unit(&h.store, h.olt, 3, 4, "ZTEG0034", OnuStatus::Online).await;

    h.controller.deprovision(h.olt, 3, 4, None).await.unwrap();

    assert_eq!(h.device.calls(), vec!["delete 3:4"]);
    assert!(h.store.units().is_empty());
}

#[tokio::test]
async fn update_serial_rewrites_row_in_place() {
    let h = harness().await;
    let id = seed_unit(&h.store, h.olt, 1, 2, "OLDSERIAL", OnuStatus::Online).await;

    let onu = h
        .controller
        .update_serial(h.olt, 1, 2, "NEWSERIAL", Some(Method::Snmp))
        .await
        .unwrap();

    assert_eq!(onu.id, id);
    assert_eq!(unit(&h.store, "NEWSERIAL").id, id);
    // The default adapter path is delete, settle, provision.
    assert_eq!(h.device.calls(), vec!["delete 1:2", "provision 1:2 NEWSERIAL"]);
}

#[tokio::test]
async fn update_serial_of_missing_unit_is_not_found() {
    let h = harness().await;
    let err = h
        .controller
        .update_serial(h.olt, 9, 9, "NEWSERIAL", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnitNotFound { .. }), "{err:?}");
    assert!(h.device.calls().is_empty());
}

#[tokio::test]
async fn reboot_and_reset_go_to_device_only() {
    let h = harness().await;
    h.controller.reboot(h.olt, 1, 1, None).await.unwrap();
    h.controller.reset(h.olt, 1, 2, Some(Method::Rest)).await.unwrap();
    assert_eq!(h.device.calls(), vec!["reboot 1:1", "reset 1:2"]);

    let err = h.controller.reboot(OltId(77), 1, 1, None).await.unwrap_err();
    assert!(matches!(err, CoreError::OltNotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_device_surfaces_as_unreachable() {
    let h = harness().await;
    h.device.unreachable.lock().unwrap().insert("10.0.0.1".into());
    let err = h.controller.reboot(h.olt, 1, 1, None).await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
}

// ── PPPoE ────────────────────────────────────────────────────────────

#[tokio::test]
async fn pppoe_account_is_stored_hashed() {
    let h = harness().await;
    let unit_id = seed_unit(&h.store, h.olt, 1, 3, "ZTEG0013", OnuStatus::Online).await;
    let password = SecretString::from("s3cret-pw");

    let account = h
        .controller
        .create_pppoe_account(
            unit_id,
            PppoeCredentials {
                username: "cust-0013".into(),
                password: password.clone(),
                service_name: None,
                vlan_id: Some(100),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(account.unit_id, unit_id);
    assert_eq!(account.vlan_id, Some(100));
    assert!(!account.password_hash.contains("s3cret-pw"));
    assert!(verify_password(&password, &account.password_hash));
    assert_eq!(h.device.calls(), vec!["pppoe 1:3 cust-0013"]);
    assert_eq!(h.store.pppoe_accounts().len(), 1);
}

#[tokio::test]
async fn pppoe_for_missing_unit_is_not_found() {
    let h = harness().await;
    let err = h
        .controller
        .create_pppoe_account(
            UnitId(12345),
            PppoeCredentials {
                username: "cust".into(),
                password: SecretString::from("pw"),
                service_name: None,
                vlan_id: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnitNotFound { .. }), "{err:?}");
}

// ── Alarms ───────────────────────────────────────────────────────────

#[tokio::test]
async fn operator_acknowledges_then_clears() {
    let h = harness().await;
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "online")]);
    h.controller.trigger_sync(h.olt, None).await.unwrap();
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "offline")]);
    h.controller.trigger_sync(h.olt, None).await.unwrap();

    let id = h.store.alarms()[0].id;
    let acked = h.controller.acknowledge_alarm(id).await.unwrap();
    assert_eq!(acked.status, AlarmStatus::Acknowledged);
    assert!(acked.acknowledged_at.is_some());

    let cleared = h.controller.clear_alarm(id).await.unwrap();
    assert_eq!(cleared.status, AlarmStatus::Cleared);
    assert!(cleared.cleared_at.is_some());
}

#[tokio::test]
async fn operator_alarm_is_stored_and_broadcast() {
    let h = harness().await;
    let mut feed = h.controller.alarms();

    let alarm = h
        .controller
        .raise_alarm(NewAlarm {
            olt_id: Some(h.olt),
            unit_id: None,
            severity: AlarmSeverity::Critical,
            alarm_type: "manual".into(),
            message: "fiber cut on feeder 3".into(),
            details: None,
            occurred_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    assert_eq!(alarm.status, AlarmStatus::Active);
    assert_eq!(h.store.alarms(), vec![alarm.clone()]);
    assert_eq!(*feed.try_recv().unwrap(), alarm);

    let err = h
        .controller
        .raise_alarm(NewAlarm {
            olt_id: Some(OltId(404)),
            ..NewAlarm::onu_down(h.olt, UnitId(1), "X", chrono::Utc::now())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::OltNotFound { .. }), "{err:?}");
}

// ── Registration ─────────────────────────────────────────────────────

#[tokio::test]
async fn register_device_validates_and_seals() {
    let h = harness().await;
    let err = h
        .controller
        .register_device(Olt::new(OltId(0), "blank", " "))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");

    let mut olt = Olt::new(OltId(0), "north", "10.0.0.9");
    olt.ssh.password = Some(h.controller.seal(&SecretString::from("ssh-pw")).unwrap());
    let id = h.controller.register_device(olt).await.unwrap();
    assert_ne!(id, h.olt);
    assert_eq!(h.controller.list_devices().await.unwrap().len(), 2);
}

// ── Periodic loop ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn periodic_loop_runs_each_interval_until_shutdown() {
    let config = ControllerConfig {
        engine: EngineConfig {
            poll_interval: Duration::from_secs(30),
            ..EngineConfig::default()
        },
        ..ControllerConfig::default()
    };
    let h = harness_with(config, None).await;
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "online")]);

    h.controller.start().await;
    h.controller.start().await;
    tokio::time::sleep(Duration::from_secs(65)).await;
    h.controller.shutdown().await;

    // Ticks at 0s, 30s and 60s.
    assert_eq!(h.device.calls_starting("list start"), 3);
    assert_eq!(h.store.units().len(), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.device.calls_starting("list start"), 3);
}

#[tokio::test(start_paused = true)]
async fn controller_can_be_started_again_after_shutdown() {
    let config = ControllerConfig {
        engine: EngineConfig {
            poll_interval: Duration::from_secs(30),
            ..EngineConfig::default()
        },
        ..ControllerConfig::default()
    };
    let h = harness_with(config, None).await;

    h.controller.start().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.controller.shutdown().await;
    assert_eq!(h.device.calls_starting("list start"), 1);

    h.controller.start().await;
    tokio::time::sleep(Duration::from_secs(35)).await;
    h.controller.shutdown().await;
    h.controller.shutdown().await;

    // First tick of the second run plus one at 30s.
    assert_eq!(h.device.calls_starting("list start"), 3);
}
