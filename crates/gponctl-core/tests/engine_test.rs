#![allow(clippy::unwrap_used)]

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use gponctl_api::{OpticalPower, Performance};
use gponctl_core::{
    AlarmSeverity, AlarmStatus, ControllerConfig, CoreError, EngineConfig, InventoryStore, MemoryStore,
    Olt, OltId, OltStatus, OnuStatus, PollState,
};
use pretty_assertions::assert_eq;

use common::{harness, harness_with, raw, seed_unit, unit, FailingStore, Listing};

// ── Offline handling ─────────────────────────────────────────────────

#[tokio::test]
async fn offline_olt_skips_sync_and_keeps_units() {
    let h = harness().await;
    seed_unit(&h.store, h.olt, 1, 1, "ZTEG0001", OnuStatus::Online).await;
    let before = h.store.units();
    h.device.go_offline();
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "offline")]);

    let cycle = h.controller.engine().poll_and_sync(h.olt, None).await.unwrap();

    assert_eq!(cycle.poll.status, OltStatus::Offline);
    assert!(cycle.sync.is_none());
    assert_eq!(h.device.calls_starting("list"), 0);
    assert_eq!(h.store.units(), before);
    assert!(h.store.alarms().is_empty());

    let olt = h.store.get_device(h.olt).await.unwrap().unwrap();
    assert_eq!(olt.status, OltStatus::Offline);
    assert!(olt.last_polled_at.is_some());
}

#[tokio::test]
async fn trigger_sync_on_offline_olt_is_unreachable() {
    let h = harness().await;
    h.device.go_offline();
    let err = h.controller.trigger_sync(h.olt, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Unreachable { .. }), "{err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn rest_status_alone_counts_as_online() {
    let h = harness().await;
    h.device.go_offline();
    h.device.rest_online.store(true, Ordering::SeqCst);

    let poll = h.controller.trigger_poll(h.olt).await.unwrap();
    assert_eq!(poll.status, OltStatus::Online);
    assert!(poll.system.is_none());
}

// ── Reconciliation ───────────────────────────────────────────────────

#[tokio::test]
async fn mixed_snapshot_scenario() {
    let h = harness().await;
    seed_unit(&h.store, h.olt, 1, 1, "A", OnuStatus::Online).await;
    let b = seed_unit(&h.store, h.olt, 1, 2, "B", OnuStatus::Online).await;
    seed_unit(&h.store, h.olt, 1, 3, "C", OnuStatus::Offline).await;
    let a_before = unit(&h.store, "A");
    let c_before = unit(&h.store, "C");

    h.device.set_units(vec![
        raw(1, 1, "A", "online"),
        raw(1, 2, "B", "offline"),
        raw(1, 4, "D", "online"),
    ]);
    let result = h.controller.trigger_sync(h.olt, None).await.unwrap();

    assert_eq!(result.created, 1);
    assert_eq!(result.updated, 2);
    assert_eq!(result.status_changes, 1);
    assert_eq!(result.alarms_raised, 1);

    let b_after = unit(&h.store, "B");
    assert_eq!(b_after.status, OnuStatus::Offline);
    assert!(b_after.last_status_change.is_some());

    let a_after = unit(&h.store, "A");
    assert_eq!(a_after.status, OnuStatus::Online);
    assert_eq!(a_after.last_status_change, a_before.last_status_change);

    assert_eq!(unit(&h.store, "C"), c_before);

    let d = unit(&h.store, "D");
    assert_eq!(d.status, OnuStatus::Online);
    assert_eq!((d.pon_port, d.onu_id), (1, 4));
    assert!(d.provisioned_at.is_some());
    assert!(d.last_seen_at.is_some());

    let alarms = h.store.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].unit_id, Some(b));
    assert_eq!(alarms[0].severity, AlarmSeverity::Major);
    assert_eq!(alarms[0].alarm_type, "onu_down");
    assert_eq!(alarms[0].status, AlarmStatus::Active);
}

#[tokio::test]
async fn identical_snapshot_twice_is_idempotent() {
    let h = harness().await;
    h.device
        .set_units(vec![raw(1, 1, "ZTEG0001", "online"), raw(1, 2, "ZTEG0002", "offline")]);

    let first = h.controller.trigger_sync(h.olt, None).await.unwrap();
    assert_eq!(first.created, 2);
    let after_first = h.store.units();

    let second = h.controller.trigger_sync(h.olt, None).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(second.status_changes, 0);
    assert_eq!(second.alarms_raised, 0);

    for (before, after) in after_first.iter().zip(h.store.units()) {
        assert_eq!(before.last_status_change, after.last_status_change);
        assert_eq!(before.status, after.status);
    }
    assert!(h.store.alarms().is_empty());
}

#[tokio::test]
async fn offline_then_recovery_raises_exactly_one_alarm() {
    let h = harness().await;
    let mut alarms_rx = h.controller.alarms();
    h.device.set_units(vec![raw(2, 7, "ZTEG0027", "online")]);
    h.controller.trigger_sync(h.olt, None).await.unwrap();

    h.device.set_units(vec![raw(2, 7, "ZTEG0027", "los")]);
    let down = h.controller.trigger_sync(h.olt, None).await.unwrap();
    assert_eq!(down.alarms_raised, 1);

    let broadcast = alarms_rx.recv().await.unwrap();
    assert_eq!(broadcast.message, "ONU ZTEG0027 is offline");

    h.device.set_units(vec![raw(2, 7, "ZTEG0027", "working")]);
    let up = h.controller.trigger_sync(h.olt, None).await.unwrap();
    assert_eq!(up.status_changes, 1);
    assert_eq!(up.alarms_raised, 0);

    // Recovery does not clear the alarm.
    let alarms = h.store.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].status, AlarmStatus::Active);
}

#[tokio::test]
async fn zero_power_is_stored_and_missing_stays_null() {
    let h = harness().await;
    let mut zero = raw(1, 1, "ZTEG0001", "online");
    zero.rx_power = Some(OpticalPower::CentiDbm(0));
    zero.tx_power = None;
    zero.rx_bytes = None;
    h.device.set_units(vec![zero]);

    h.controller.trigger_sync(h.olt, None).await.unwrap();

    let stored = unit(&h.store, "ZTEG0001");
    assert_eq!(stored.rx_power, Some(0.0));
    assert_eq!(stored.tx_power, None);
    assert_eq!(stored.rx_bytes, None);
    assert_eq!(stored.tx_bytes, Some(2_000));
}

#[tokio::test]
async fn duplicate_position_in_listing_writes_nothing() {
    let h = harness().await;
    h.device
        .set_units(vec![raw(1, 1, "ZTEG0001", "online"), raw(1, 1, "ZTEG0002", "online")]);

    let err = h.controller.trigger_sync(h.olt, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Protocol { .. }), "{err:?}");
    assert!(h.store.units().is_empty());
}

// ── Failure paths ────────────────────────────────────────────────────

#[tokio::test]
async fn partial_list_failure_discards_whole_listing() {
    let h = harness().await;
    seed_unit(&h.store, h.olt, 1, 1, "ZTEG0001", OnuStatus::Online).await;
    let before = h.store.units();
    *h.device.listing.lock().unwrap() = Listing::Partial { fetched: 2 };

    let err = h.controller.trigger_sync(h.olt, None).await.unwrap_err();

    assert!(
        matches!(err, CoreError::PartialListFailure { fetched: 2, .. }),
        "{err:?}"
    );
    assert!(err.is_transient());
    assert_eq!(h.store.units(), before);
    assert!(h.store.alarms().is_empty());
    let olt = h.store.get_device(h.olt).await.unwrap().unwrap();
    assert_eq!(olt.status, OltStatus::Online);
    assert_eq!(h.controller.engine().state(h.olt), PollState::Idle);
}

#[tokio::test]
async fn commit_failure_rolls_back_and_reports_sync_failed() {
    let failing = FailingStore::new(MemoryStore::new());
    let flag = failing.fail_unit_commits.clone();
    let h = harness_with(ControllerConfig::default(), Some(failing)).await;
    seed_unit(&h.store, h.olt, 1, 1, "A", OnuStatus::Online).await;
    let before = h.store.units();

    flag.store(true, Ordering::SeqCst);
    h.device
        .set_units(vec![raw(1, 1, "A", "offline"), raw(1, 2, "B", "online")]);
    let err = h.controller.trigger_sync(h.olt, None).await.unwrap_err();

    match &err {
        CoreError::SyncFailed { olt_id, cause } => {
            assert_eq!(*olt_id, h.olt);
            assert!(matches!(**cause, CoreError::StoreWriteFailure { .. }), "{cause:?}");
        }
        other => panic!("expected SyncFailed, got {other:?}"),
    }
    assert!(err.is_transient());
    assert_eq!(h.store.units(), before);
    assert!(h.store.alarms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cycle_exceeding_task_timeout_is_abandoned() {
    let config = ControllerConfig {
        engine: EngineConfig {
            task_timeout: Duration::from_secs(5),
            ..EngineConfig::default()
        },
        ..ControllerConfig::default()
    };
    let h = harness_with(config, None).await;
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "online")]);
    *h.device.list_delay.lock().unwrap() = Duration::from_secs(60);

    let err = h.controller.trigger_sync(h.olt, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Timeout { timeout_secs: 5 }), "{err:?}");
    assert!(h.store.units().is_empty());
    assert_eq!(h.controller.engine().state(h.olt), PollState::Idle);
}

// ── Concurrency ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_syncs_on_one_olt_run_one_after_the_other() {
    let h = harness().await;
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "online")]);
    *h.device.list_delay.lock().unwrap() = Duration::from_secs(3);

    let mut states = h.controller.poll_state(h.olt);
    let (first, second) = tokio::join!(
        h.controller.trigger_sync(h.olt, None),
        h.controller.trigger_sync(h.olt, None),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.created + second.created, 1);
    assert_eq!(first.updated + second.updated, 1);
    assert_eq!(h.store.units().len(), 1);

    let lists: Vec<String> = h
        .device
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("list"))
        .collect();
    assert_eq!(
        lists,
        vec![
            "list start 10.0.0.1",
            "list end 10.0.0.1",
            "list start 10.0.0.1",
            "list end 10.0.0.1",
        ]
    );
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), PollState::Idle);
}

#[tokio::test(start_paused = true)]
async fn different_olts_poll_concurrently_and_fail_independently() {
    let h = harness().await;
    let west = h
        .store
        .insert_device(Olt::new(OltId(0), "west", "10.0.0.2"))
        .await
        .unwrap();
    h.device.unreachable.lock().unwrap().insert("10.0.0.2".into());
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "online")]);
    *h.device.list_delay.lock().unwrap() = Duration::from_secs(2);

    let started = tokio::time::Instant::now();
    let results = h.controller.engine().poll_all().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));

    assert_eq!(results.len(), 2);
    for (olt_id, result) in &results {
        let cycle = result.as_ref().unwrap();
        if *olt_id == west {
            assert_eq!(cycle.poll.status, OltStatus::Offline);
            assert!(cycle.sync.is_none());
        } else {
            assert_eq!(cycle.sync.as_ref().unwrap().created, 1);
        }
    }
}

#[tokio::test]
async fn panicking_olt_cycle_does_not_take_down_the_others() {
    let h = harness().await;
    let west = h
        .store
        .insert_device(Olt::new(OltId(0), "west", "10.0.0.2"))
        .await
        .unwrap();
    h.device.panics.lock().unwrap().insert("10.0.0.2".into());
    h.device.set_units(vec![raw(1, 1, "ZTEG0001", "online")]);

    let results = h.controller.engine().poll_all().await.unwrap();

    assert_eq!(results.len(), 2);
    for (olt_id, result) in &results {
        if *olt_id == west {
            assert!(matches!(result, Err(CoreError::Internal(_))), "got {result:?}");
        } else {
            assert_eq!(result.as_ref().unwrap().sync.as_ref().unwrap().created, 1);
        }
    }
    assert!(matches!(h.controller.engine().state(west), PollState::Failed { .. }));
    assert_eq!(h.store.units().len(), 1);
}

// ── Device state ─────────────────────────────────────────────────────

#[tokio::test]
async fn poll_merges_performance_and_backfills_identity() {
    let h = harness().await;
    *h.device.sys_descr.lock().unwrap() = Some("ZXA10 C320 Software Version V2.1.0".into());
    *h.device.performance.lock().unwrap() = Some(Performance {
        cpu_usage: Some(12.0),
        memory_usage: Some(40.0),
        temperature: None,
        uptime_secs: Some(3600),
    });
    h.controller.trigger_poll(h.olt).await.unwrap();

    *h.device.performance.lock().unwrap() = Some(Performance {
        cpu_usage: Some(30.0),
        memory_usage: None,
        temperature: Some(41.0),
        uptime_secs: None,
    });
    *h.device.sys_name.lock().unwrap() = Some("renamed".into());
    let poll = h.controller.trigger_poll(h.olt).await.unwrap();
    assert_eq!(poll.status, OltStatus::Online);

    let olt = h.store.get_device(h.olt).await.unwrap().unwrap();
    assert_eq!(olt.performance.cpu_usage, Some(30.0));
    assert_eq!(olt.performance.memory_usage, Some(40.0));
    assert_eq!(olt.performance.temperature, Some(41.0));
    assert_eq!(olt.performance.uptime_secs, Some(3600));
    // First non-empty value wins; later names do not overwrite it.
    assert_eq!(olt.hostname.as_deref(), Some("olt-east"));
    assert_eq!(
        olt.firmware_version.as_deref(),
        Some("ZXA10 C320 Software Version V2.1.0")
    );
}

#[tokio::test]
async fn unknown_olt_is_not_found() {
    let h = harness().await;
    let err = h.controller.trigger_poll(OltId(404)).await.unwrap_err();
    assert!(matches!(err, CoreError::OltNotFound { .. }), "{err:?}");
    assert!(!err.is_transient());
}
