//! Launch resolver against the simulated device.

use std::sync::{Arc, Mutex};

use deepfreeze_core::launch::strategies::{LaunchCtx, LaunchStrategy, StrategyFut};
use deepfreeze_core::launch::tables::LaunchTables;
use deepfreeze_core::{AppLauncher, FreezeManager, LaunchSettings, StrategyError};
use deepfreeze_types::{
    EntryPoint, ExecutionContext, HostError, IntentTarget, LaunchFlag, RegistryEntry, StrategyId,
    UnitId,
};

use crate::common::{FakeDevice, manager, unit};

const GAME: &str = "com.example.game";

#[derive(Clone, Copy)]
enum Behavior {
    Fail,
    /// Host accepts, nothing comes up.
    Accept,
    /// Host accepts and the unit's process appears.
    Start,
}

struct Recorded {
    id: StrategyId,
    behavior: Behavior,
    device: Arc<FakeDevice>,
    log: Arc<Mutex<Vec<StrategyId>>>,
}

impl LaunchStrategy for Recorded {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, _ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.id);
            match self.behavior {
                Behavior::Fail => Err(StrategyError::Host(HostError::Rejected("denied".into()))),
                Behavior::Accept => Ok(true),
                Behavior::Start => {
                    self.device.set_running(&[unit.as_str()]);
                    Ok(true)
                }
            }
        })
    }
}

fn install_game(device: &FakeDevice) {
    device.install(
        RegistryEntry::new(unit(GAME)).with_launch_entry(".MainActivity"),
        vec![
            EntryPoint::new("com.example.game.MainActivity").launcher(0),
            EntryPoint::new("com.example.game.SettingsActivity").exported(),
        ],
    );
}

fn launcher(device: &Arc<FakeDevice>, manager: Arc<FreezeManager>) -> AppLauncher {
    AppLauncher::new(
        device.clone(),
        device.clone(),
        device.clone(),
        manager,
        LaunchTables::builtin(),
        LaunchSettings::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn first_verified_strategy_wins_and_stops_the_chain() {
    let device = FakeDevice::new();
    install_game(&device);
    let manager = manager(&device).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let step = |id: StrategyId, behavior: Behavior| -> Box<dyn LaunchStrategy> {
        Box::new(Recorded {
            id,
            behavior,
            device: device.clone(),
            log: log.clone(),
        })
    };
    let chain = vec![
        step(StrategyId::DirectEntryPoint, Behavior::Fail),
        step(StrategyId::DeepLink, Behavior::Accept),
        step(StrategyId::LauncherQuery, Behavior::Start),
        step(StrategyId::PriorityName, Behavior::Start),
    ];
    let launcher = launcher(&device, manager).with_chain(chain);

    let result = launcher.launch_detailed(&unit(GAME)).await;

    assert!(result.success);
    assert!(result.verified);
    assert_eq!(result.selected_strategy, Some(StrategyId::LauncherQuery));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            StrategyId::DirectEntryPoint,
            StrategyId::DeepLink,
            StrategyId::LauncherQuery
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn blind_verifier_trusts_an_accepted_start() {
    let device = FakeDevice::new();
    install_game(&device);
    device.set_starts_spawn(false);
    device.blind_introspection();
    let manager = manager(&device).await;

    let result = launcher(&device, manager).launch_detailed(&unit(GAME)).await;

    assert!(result.success);
    assert!(!result.verified, "nothing confirmed the start");
    assert_eq!(result.selected_strategy, Some(StrategyId::DirectEntryPoint));
    assert_eq!(device.starts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn default_chain_starts_the_registered_entry_point() {
    let device = FakeDevice::new();
    install_game(&device);
    let manager = manager(&device).await;

    let result = launcher(&device, manager).launch_detailed(&unit(GAME)).await;

    assert_eq!(result.selected_strategy, Some(StrategyId::DirectEntryPoint));
    assert!(result.verified);
    let starts = device.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(
        starts[0].target,
        IntentTarget::Component {
            unit: unit(GAME),
            class_name: "com.example.game.MainActivity".into(),
        }
    );
    assert!(device.running().contains(&unit(GAME)));
}

#[tokio::test(start_paused = true)]
async fn frozen_units_are_not_launched() {
    let device = FakeDevice::new();
    install_game(&device);
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit(GAME)).await.is_applied());

    let launcher = launcher(&device, manager);

    assert!(!launcher.launch(&unit(GAME)).await);
    assert!(!launcher.launch(&unit("com.example.missing")).await);
    assert!(device.starts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_chain_reports_failure() {
    let device = FakeDevice::new();
    install_game(&device);
    device.set_accept_starts(false);
    let manager = manager(&device).await;

    let result = launcher(&device, manager).launch_detailed(&unit(GAME)).await;

    assert!(!result.success);
    assert_eq!(result.selected_strategy, None);
    assert!(!device.starts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn lock_task_mode_never_sends_clearing_flags() {
    let device = FakeDevice::new();
    install_game(&device);
    device.set_context(ExecutionContext::Restricted);
    device.set_accept_starts(false);
    let manager = manager(&device).await;

    let result = launcher(&device, manager).launch_detailed(&unit(GAME)).await;

    assert!(!result.success);
    let starts = device.starts();
    assert!(!starts.is_empty());
    for intent in &starts {
        assert!(
            !intent.has_flag(LaunchFlag::ClearTask) && !intent.has_flag(LaunchFlag::ClearTop),
            "restricted start carried a clearing flag: {intent}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn lock_task_mode_uses_the_restricted_chain() {
    let device = FakeDevice::new();
    install_game(&device);
    device.set_context(ExecutionContext::Restricted);
    let manager = manager(&device).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let normal: Vec<Box<dyn LaunchStrategy>> = vec![Box::new(Recorded {
        id: StrategyId::BruteForce,
        behavior: Behavior::Start,
        device: device.clone(),
        log: log.clone(),
    })];
    let restricted: Vec<Box<dyn LaunchStrategy>> = vec![Box::new(Recorded {
        id: StrategyId::TaskResume,
        behavior: Behavior::Start,
        device: device.clone(),
        log: log.clone(),
    })];

    let result = launcher(&device, manager)
        .with_chain(normal)
        .with_restricted_chain(restricted)
        .launch_detailed(&unit(GAME))
        .await;

    assert_eq!(result.selected_strategy, Some(StrategyId::TaskResume));
    assert_eq!(*log.lock().unwrap(), vec![StrategyId::TaskResume]);
}

#[tokio::test(start_paused = true)]
async fn lock_task_launch_reports_the_restricted_strategy() {
    let device = FakeDevice::new();
    install_game(&device);
    device.set_context(ExecutionContext::Restricted);
    let manager = manager(&device).await;

    let result = launcher(&device, manager).launch_detailed(&unit(GAME)).await;

    assert!(result.success);
    assert_eq!(result.selected_strategy, Some(StrategyId::LockTaskEntryPoint));
    assert!(device.starts()[0].has_flag(LaunchFlag::ReorderToFront));
}

#[tokio::test]
async fn launch_info_explains_a_frozen_unit() {
    let device = FakeDevice::new();
    install_game(&device);
    let manager = manager(&device).await;
    assert!(manager.toggle(&unit(GAME)).await.is_applied());

    let info = launcher(&device, manager).launch_info(&unit(GAME)).await;

    assert!(info.installed);
    assert!(info.hidden);
    assert!(info.suspended);
    assert!(!info.can_launch);
    assert_eq!(info.launch_component.as_deref(), Some(".MainActivity"));
    assert_eq!(info.entry_points.len(), 2);
}
