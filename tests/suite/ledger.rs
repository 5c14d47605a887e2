//! Freeze manager behavior through the public API.

use std::collections::BTreeSet;
use std::sync::Arc;

use deepfreeze_core::{JsonFileStore, LedgerStore, StoreError};
use deepfreeze_types::{ToggleOutcome, UnitId};

use crate::common::{FakeDevice, HOME_UNIT, SELF_UNIT, manager, manager_with_store, unit};

/// A store whose writes always fail.
struct BrokenStore;

impl LedgerStore for BrokenStore {
    fn load(&self) -> Result<BTreeSet<UnitId>, StoreError> {
        Ok(BTreeSet::new())
    }

    fn put(&self, _unit: &UnitId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    fn remove(&self, _unit: &UnitId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }
}

#[tokio::test]
async fn freezing_a_fresh_unit_records_it() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    let game = unit("com.example.game");

    let outcome = manager.toggle(&game).await;

    assert_eq!(
        outcome,
        ToggleOutcome::Applied {
            now_suspended: true
        }
    );
    assert!(manager.is_suspended(&game));
    assert_eq!(device.suspend_calls(), vec![(game.clone(), true)]);
    assert!(device.os_suspended().contains(&game));
}

#[tokio::test]
async fn critical_units_are_never_touched() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;

    for critical in ["com.android.systemui", "com.android.settings", "android", SELF_UNIT, HOME_UNIT] {
        assert_eq!(
            manager.toggle(&unit(critical)).await,
            ToggleOutcome::AlreadyCritical,
            "{critical} should be protected"
        );
    }

    assert!(device.suspend_calls().is_empty());
    assert_eq!(manager.suspended_count(), 0);
}

#[tokio::test]
async fn toggling_twice_restores_the_original_state() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    let game = unit("com.example.game");

    assert!(manager.toggle(&game).await.is_applied());
    assert_eq!(
        manager.toggle(&game).await,
        ToggleOutcome::Applied {
            now_suspended: false
        }
    );

    assert!(!manager.is_suspended(&game));
    assert!(device.os_suspended().is_empty());
    assert_eq!(
        device.suspend_calls(),
        vec![(game.clone(), true), (game, false)]
    );
}

#[tokio::test]
async fn toggle_without_capability_changes_nothing() {
    let device = FakeDevice::new();
    device.set_held(false);
    let manager = manager(&device).await;

    let outcome = manager.toggle(&unit("com.example.game")).await;

    assert_eq!(outcome, ToggleOutcome::CapabilityUnavailable);
    assert!(device.suspend_calls().is_empty());
    assert_eq!(manager.suspended_count(), 0);
}

#[tokio::test]
async fn policy_refusal_leaves_the_ledger_alone() {
    let device = FakeDevice::new();
    device.reject_suspend("com.example.locked");
    let manager = manager(&device).await;

    let outcome = manager.toggle(&unit("com.example.locked")).await;

    assert!(matches!(outcome, ToggleOutcome::PolicyError(_)));
    assert_eq!(manager.suspended_count(), 0);
}

#[tokio::test]
async fn failed_ledger_write_rolls_the_os_change_back() {
    let device = FakeDevice::new();
    let manager = manager_with_store(&device, Arc::new(BrokenStore)).await;
    let game = unit("com.example.game");

    let outcome = manager.toggle(&game).await;

    assert!(matches!(outcome, ToggleOutcome::StoreFailed(_)));
    assert!(!manager.is_suspended(&game));
    assert!(device.os_suspended().is_empty());
    assert_eq!(
        device.suspend_calls(),
        vec![(game.clone(), true), (game, false)]
    );
}

#[tokio::test]
async fn unfreeze_all_keeps_units_that_fail_to_resume() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    let x = unit("com.example.x");
    let y = unit("com.example.y");
    assert!(manager.toggle(&x).await.is_applied());
    assert!(manager.toggle(&y).await.is_applied());

    device.reject_suspend("com.example.x");
    let results = manager.unfreeze_all().await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], (ref u, ToggleOutcome::PolicyError(_)) if *u == x));
    assert!(results[1].1.is_applied());
    assert_eq!(manager.list_suspended(), BTreeSet::from([x]));
}

#[tokio::test]
async fn unfreeze_all_requires_the_capability() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit("com.example.x")).await.is_applied());

    device.set_held(false);

    assert!(manager.unfreeze_all().await.is_err());
    assert_eq!(manager.suspended_count(), 1);
}

#[tokio::test]
async fn prune_drops_only_uninstalled_units() {
    let device = FakeDevice::new();
    device.install_plain(&["com.example.kept", "com.example.gone"]);
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit("com.example.kept")).await.is_applied());
    assert!(manager.toggle(&unit("com.example.gone")).await.is_applied());

    device.uninstall("com.example.gone");
    let pruned = manager.prune_uninstalled(device.as_ref()).await.unwrap();

    assert_eq!(pruned, vec![unit("com.example.gone")]);
    assert_eq!(
        manager.list_suspended(),
        BTreeSet::from([unit("com.example.kept")])
    );
}

#[tokio::test]
async fn ledger_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let device = FakeDevice::new();

    {
        let manager = manager_with_store(&device, Arc::new(JsonFileStore::new(&path))).await;
        assert!(manager.toggle(&unit("com.example.a")).await.is_applied());
        assert!(manager.toggle(&unit("com.example.b")).await.is_applied());
        assert!(manager.toggle(&unit("com.example.b")).await.is_applied());
    }

    let restarted = manager_with_store(&device, Arc::new(JsonFileStore::new(&path))).await;
    assert_eq!(
        restarted.list_suspended(),
        BTreeSet::from([unit("com.example.a")])
    );

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk, serde_json::json!({ "com.example.a": true }));
}

#[tokio::test]
async fn a_double_tap_freezes_once() {
    let device = FakeDevice::new();
    let manager = manager(&device).await;
    let game = unit("com.example.game");

    let (first, second) = tokio::join!(manager.toggle(&game), manager.toggle(&game));

    let frozen = ToggleOutcome::Applied {
        now_suspended: true,
    };
    assert_eq!(first, frozen);
    assert_eq!(second, frozen);
    assert!(manager.is_suspended(&game));
    assert_eq!(device.suspend_calls(), vec![(game.clone(), true)]);
    assert!(device.os_suspended().contains(&game));
}
