//! Service wiring and command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use deepfreeze_config::DeepfreezeConfig;
use deepfreeze_core::launch::tables::LaunchTables;
use deepfreeze_core::{
    AppLauncher, CriticalSet, FreezeManager, FreezeMonitor, JsonFileStore, LaunchSettings,
    LedgerStore, MemoryStore, MonitorSettings, RemediationTable, Troubleshooter,
};
use deepfreeze_device::ShellDevice;
use deepfreeze_types::TroubleshootResult;
use tracing::{info, warn};

use crate::Command;

pub struct Services {
    device: Arc<ShellDevice>,
    manager: Arc<FreezeManager>,
    launcher: Arc<AppLauncher>,
    troubleshooter: Troubleshooter,
    monitor: MonitorSettings,
    ledger_location: String,
}

impl Services {
    pub async fn connect(config: &DeepfreezeConfig) -> Result<Self> {
        let device = Arc::new(ShellDevice::from_config(config));

        let (store, ledger_location): (Arc<dyn LedgerStore>, String) = match config.ledger_path() {
            Some(path) => {
                let location = path.display().to_string();
                (Arc::new(JsonFileStore::new(path)), location)
            }
            None => {
                warn!("No home directory for the ledger; suspensions will not persist");
                (Arc::new(MemoryStore::default()), "memory".to_string())
            }
        };

        let critical = CriticalSet::new(config.self_unit(), config.telephony_unit())
            .with_units(config.extra_critical_units())
            .resolve_home_handler(device.as_ref())
            .await;

        let manager = Arc::new(
            FreezeManager::new(store, device.clone(), critical)
                .with_context(|| format!("failed to load ledger from {ledger_location}"))?,
        );

        let tables = match &config.launch {
            Some(launch) => LaunchTables::builtin().with_config(launch),
            None => LaunchTables::builtin(),
        };
        let launcher = Arc::new(AppLauncher::new(
            device.clone(),
            device.clone(),
            device.clone(),
            manager.clone(),
            tables,
            LaunchSettings::from_config(config),
        ));

        let remediations = match &config.troubleshoot {
            Some(troubleshoot) => RemediationTable::builtin().with_config(troubleshoot),
            None => RemediationTable::builtin(),
        };
        let troubleshooter = Troubleshooter::new(launcher.clone(), remediations);

        Ok(Self {
            device,
            manager,
            launcher,
            troubleshooter,
            monitor: MonitorSettings {
                interval: config.monitor_interval(),
                backoff: config.monitor_backoff(),
            },
            ledger_location,
        })
    }
}

/// Run one command. `Ok(false)` means the operation was rejected or failed.
pub async fn run(services: &Services, command: Command) -> Result<bool> {
    match command {
        Command::Status => {
            let held = services.manager.is_capability_held().await;
            println!("capability held: {held}");
            println!("suspended units: {}", services.manager.suspended_count());
            println!("critical units:  {}", services.manager.critical_set().len());
            println!("ledger:          {}", services.ledger_location);
            Ok(true)
        }
        Command::List => {
            for unit in services.manager.list_suspended() {
                println!("{unit}");
            }
            Ok(true)
        }
        Command::Toggle { unit } => {
            let outcome = services.manager.toggle(&unit).await;
            println!("{unit}: {outcome}");
            Ok(outcome.is_applied())
        }
        Command::UnfreezeAll => {
            let results = services.manager.unfreeze_all().await?;
            let mut all_applied = true;
            for (unit, outcome) in &results {
                println!("{unit}: {outcome}");
                all_applied &= outcome.is_applied();
            }
            if results.is_empty() {
                println!("nothing to unfreeze");
            }
            Ok(all_applied)
        }
        Command::Prune => {
            let pruned = services.manager.prune_uninstalled(services.device.as_ref()).await?;
            for unit in &pruned {
                println!("pruned {unit}");
            }
            println!("{} ledger entries pruned", pruned.len());
            Ok(true)
        }
        Command::Monitor => monitor(services).await,
        Command::Launch { unit } => {
            let result = services.launcher.launch_detailed(&unit).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                eprintln!("hint: run `deepfreeze troubleshoot {unit}`");
            }
            Ok(result.success)
        }
        Command::Troubleshoot { unit, attempt } => {
            let result = services.troubleshooter.classify(&unit).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !attempt {
                return Ok(true);
            }
            if matches!(
                result,
                TroubleshootResult::NotInstalled | TroubleshootResult::Suspended
            ) {
                eprintln!("no alternative launch for a unit that is {}", describe(&result));
                return Ok(false);
            }
            let launched = services.troubleshooter.attempt_alternative_launch(&unit).await;
            println!("alternative launch: {}", if launched { "started" } else { "failed" });
            Ok(launched)
        }
    }
}

fn describe(result: &TroubleshootResult) -> &'static str {
    match result {
        TroubleshootResult::NotInstalled => "not installed",
        TroubleshootResult::Suspended => "suspended",
        TroubleshootResult::NoResolvableEntryPoint { .. } => "missing an entry point",
        TroubleshootResult::LaunchFailedWithCandidates { .. } => "failing to launch",
    }
}

async fn monitor(services: &Services) -> Result<bool> {
    if !services.manager.is_capability_held().await {
        warn!("Privileged capability not held; the monitor will only report counts");
    }

    let handle = FreezeMonitor::new(
        services.manager.clone(),
        services.device.clone(),
        services.monitor,
    )
    .start();
    let mut status = handle.subscribe();
    let mut seen_cycles = 0;
    println!("monitoring {} suspended units; Ctrl-C to stop", services.manager.suspended_count());

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if snapshot.cycles == seen_cycles {
                    continue;
                }
                seen_cycles = snapshot.cycles;
                for unit in &snapshot.last_terminated {
                    println!("terminated {unit}");
                }
            }
        }
    }

    info!("Stopping freeze monitor");
    handle.stop().await;
    Ok(true)
}
