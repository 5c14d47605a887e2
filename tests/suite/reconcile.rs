//! Reconciliation cycles and the monitor loop.

use std::collections::BTreeSet;
use std::time::Duration;

use deepfreeze_core::monitor::CycleReport;
use deepfreeze_core::{FreezeMonitor, MonitorPhase, MonitorSettings, MonitorStatus};
use tokio::sync::watch;

use crate::common::{FakeDevice, manager, unit};

fn settings() -> MonitorSettings {
    MonitorSettings {
        interval: Duration::from_millis(500),
        backoff: Duration::from_secs(5),
    }
}

async fn one_cycle(monitor: &FreezeMonitor) -> CycleReport {
    let (status, _rx) = watch::channel(MonitorStatus::default());
    monitor.run_cycle(&status).await.unwrap()
}

#[tokio::test]
async fn terminates_only_suspended_running_units() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit("com.example.a")).await.is_applied());
    device.set_running(&["com.example.a", "com.example.b"]);

    let monitor = FreezeMonitor::new(manager, device.clone(), settings());
    let report = one_cycle(&monitor).await;

    assert_eq!(report.terminated, vec![unit("com.example.a")]);
    assert_eq!(device.terminate_calls(), vec![unit("com.example.a")]);
    assert_eq!(device.running(), BTreeSet::from([unit("com.example.b")]));
}

#[tokio::test]
async fn a_clean_cycle_leaves_no_suspended_unit_running() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    for u in ["com.example.a", "com.example.c", "com.example.e"] {
        assert!(manager.toggle(&unit(u)).await.is_applied());
    }
    device.set_running(&[
        "com.example.a",
        "com.example.b",
        "com.example.c",
        "com.example.d",
    ]);

    let monitor = FreezeMonitor::new(manager.clone(), device.clone(), settings());
    let report = one_cycle(&monitor).await;

    assert!(report.failed.is_empty());
    let running = device.running();
    assert!(manager.list_suspended().iter().all(|u| !running.contains(u)));
    assert_eq!(
        running,
        BTreeSet::from([unit("com.example.b"), unit("com.example.d")])
    );
}

#[tokio::test]
async fn one_failed_termination_does_not_stop_the_cycle() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit("com.example.a")).await.is_applied());
    assert!(manager.toggle(&unit("com.example.b")).await.is_applied());
    device.set_running(&["com.example.a", "com.example.b"]);
    device.make_unkillable("com.example.a");

    let monitor = FreezeMonitor::new(manager, device.clone(), settings());
    let report = one_cycle(&monitor).await;

    assert_eq!(report.terminated, vec![unit("com.example.b")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, unit("com.example.a"));
}

#[tokio::test]
async fn without_capability_the_cycle_only_counts() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit("com.example.a")).await.is_applied());
    device.set_running(&["com.example.a"]);
    device.set_held(false);

    let monitor = FreezeMonitor::new(manager, device.clone(), settings());
    let report = one_cycle(&monitor).await;

    assert!(report.enforcement_skipped);
    assert_eq!(report.suspended_count, 1);
    assert!(device.terminate_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn monitor_loop_enforces_until_stopped() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit("com.example.a")).await.is_applied());
    device.set_running(&["com.example.a"]);

    let handle = FreezeMonitor::new(manager, device.clone(), settings()).start();
    let mut status = handle.subscribe();
    status
        .wait_for(|s| s.cycles >= 1 && s.phase == MonitorPhase::Idle)
        .await
        .unwrap();
    assert!(device.running().is_empty());

    // The unit comes back; the next tick stops it again.
    device.set_running(&["com.example.a"]);
    status.wait_for(|s| s.cycles >= 2).await.unwrap();
    assert!(device.running().is_empty());
    assert_eq!(device.terminate_calls().len(), 2);
    assert!(handle.status().cycles >= 2);

    handle.stop().await;
    assert_eq!(status.borrow().phase, MonitorPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn failing_cycles_accumulate_failures() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    device.blind_introspection();

    let handle = FreezeMonitor::new(manager, device.clone(), settings()).start();
    let mut status = handle.subscribe();
    status
        .wait_for(|s| s.consecutive_failures >= 2)
        .await
        .unwrap();

    handle.stop().await;
    assert_eq!(status.borrow().phase, MonitorPhase::Stopped);
}
