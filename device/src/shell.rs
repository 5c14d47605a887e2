//! `ShellDevice`: every platform trait backed by device shell commands.

use std::collections::BTreeSet;
use std::sync::Arc;

use deepfreeze_config::{DeepfreezeConfig, Transport};
use deepfreeze_core::{ActivityHost, PlatformFut, PrivilegedCapability, Registry};
use deepfreeze_types::{
    CapabilityError, EntryPoint, ExecutionContext, HostError, LaunchIntent, RegistryEntry,
    RegistryError, RunningSet, TaskInfo, UnitId,
};
use tracing::{debug, warn};

use crate::command;
use crate::parse::{
    PackageDump, am_start_failure, merge_entry_points, parse_foreground_unit,
    parse_launcher_activities, parse_lock_task_state, parse_package_dump, parse_package_list,
    parse_process_names, parse_recent_tasks, parse_resolved_activity, parse_suspend_state,
    parse_uid_is_privileged,
};
use crate::runner::{AdbRunner, CommandOutput, CommandRunner, LocalRunner, RunnerError};

/// Resolver placeholder returned when several home apps tie and none is default.
const RESOLVER_UNIT: &str = "android";

pub struct ShellDevice {
    runner: Arc<dyn CommandRunner>,
}

impl ShellDevice {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn from_config(config: &DeepfreezeConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = match config.transport() {
            Transport::Adb => Arc::new(AdbRunner::new(config.serial())),
            Transport::Local => Arc::new(LocalRunner::default()),
        };
        Self::new(runner)
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, RunnerError> {
        self.runner.run(command).await
    }

    /// Stdout of a command that must exit zero; the error is human-readable.
    async fn stdout(&self, command: &str) -> Result<String, String> {
        let output = self.run(command).await.map_err(|e| e.to_string())?;
        if output.success {
            Ok(output.stdout)
        } else {
            let detail = output.combined();
            Err(format!("`{command}` failed: {}", detail.trim()))
        }
    }

    async fn package_dump(&self, unit: &UnitId) -> Result<Option<PackageDump>, RegistryError> {
        let out = self
            .stdout(&command::dump_package(unit))
            .await
            .map_err(RegistryError::Lookup)?;
        Ok(parse_package_dump(unit, &out).filter(|dump| dump.installed))
    }

    async fn launch_entry(&self, unit: &UnitId) -> Option<String> {
        match self.stdout(&command::resolve_launcher_activity(unit)).await {
            Ok(out) => parse_resolved_activity(&out)
                .filter(|(owner, _)| owner == unit)
                .map(|(_, class_name)| class_name),
            Err(e) => {
                debug!(unit = %unit, "Launcher activity lookup failed: {e}");
                None
            }
        }
    }

    async fn units(&self, command: &str) -> Result<BTreeSet<UnitId>, RegistryError> {
        let out = self.stdout(command).await.map_err(RegistryError::Lookup)?;
        Ok(parse_package_list(&out).into_iter().collect())
    }

    async fn start(&self, command: String) -> Result<(), HostError> {
        let output = self
            .run(&command)
            .await
            .map_err(|e| HostError::Failed(e.to_string()))?;
        let combined = output.combined();
        if let Some(line) = am_start_failure(&combined) {
            return Err(
                if line.contains("does not exist") || line.contains("Unable to resolve") {
                    HostError::NoHandler(line)
                } else {
                    HostError::Rejected(line)
                },
            );
        }
        if !output.success {
            return Err(HostError::Failed(combined.trim().to_string()));
        }
        Ok(())
    }
}

impl Registry for ShellDevice {
    fn enumerate(&self) -> PlatformFut<'_, Result<Vec<RegistryEntry>, RegistryError>> {
        Box::pin(async move {
            let all = self.units(command::LIST_PACKAGES).await?;
            let disabled = self.units(command::LIST_DISABLED_PACKAGES).await?;
            let system = self.units(command::LIST_SYSTEM_PACKAGES).await?;
            Ok(all
                .into_iter()
                .map(|unit| {
                    let mut entry = RegistryEntry::new(unit);
                    entry.enabled = !disabled.contains(&entry.unit);
                    entry.system = system.contains(&entry.unit);
                    entry
                })
                .collect())
        })
    }

    fn get_entry<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Option<RegistryEntry>, RegistryError>> {
        Box::pin(async move {
            let Some(dump) = self.package_dump(unit).await? else {
                return Ok(None);
            };
            let mut entry = RegistryEntry::new(unit.clone());
            entry.enabled = dump.enabled;
            entry.hidden = dump.hidden || dump.suspended;
            entry.system = dump.system;
            entry.launch_entry = self.launch_entry(unit).await;
            Ok(Some(entry))
        })
    }

    fn entry_points<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Vec<EntryPoint>, RegistryError>> {
        Box::pin(async move {
            let dump = self
                .package_dump(unit)
                .await?
                .ok_or_else(|| RegistryError::NotFound(unit.clone()))?;
            let launchers = match self.stdout(&command::query_launcher_activities(unit)).await {
                Ok(out) => parse_launcher_activities(unit, &out),
                Err(e) => {
                    debug!(unit = %unit, "Launcher query failed: {e}");
                    Vec::new()
                }
            };
            Ok(merge_entry_points(launchers, &dump.activities))
        })
    }

    fn is_enabled<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<bool, RegistryError>> {
        Box::pin(async move { Ok(self.package_dump(unit).await?.is_some_and(|dump| dump.enabled)) })
    }
}

impl PrivilegedCapability for ShellDevice {
    fn is_held(&self) -> PlatformFut<'_, bool> {
        Box::pin(async move {
            match self.stdout(command::CURRENT_UID).await {
                Ok(out) => parse_uid_is_privileged(&out),
                Err(e) => {
                    warn!("Capability check failed: {e}");
                    false
                }
            }
        })
    }

    fn set_suspended<'a>(
        &'a self,
        unit: &'a UnitId,
        suspended: bool,
    ) -> PlatformFut<'a, Result<(), CapabilityError>> {
        Box::pin(async move {
            let output = self
                .run(&command::pm_set_suspended(unit, suspended))
                .await
                .map_err(|e| CapabilityError::Failed(e.to_string()))?;
            let combined = output.combined();
            match parse_suspend_state(&combined) {
                Some(state) if state == suspended => Ok(()),
                Some(state) => Err(CapabilityError::Rejected {
                    unit: unit.clone(),
                    reason: format!("suspended state stayed {state}"),
                }),
                None if output.success && am_start_failure(&combined).is_none() => Ok(()),
                None => Err(CapabilityError::Rejected {
                    unit: unit.clone(),
                    reason: combined.trim().to_string(),
                }),
            }
        })
    }

    fn list_processes(&self) -> PlatformFut<'_, Result<RunningSet, CapabilityError>> {
        Box::pin(async move {
            match self.stdout(command::LIST_PROCESSES).await {
                Ok(out) => Ok(parse_process_names(&out)),
                Err(e) => {
                    debug!("Full process listing failed, falling back: {e}");
                    let out = self
                        .stdout(command::LIST_PROCESSES_FALLBACK)
                        .await
                        .map_err(CapabilityError::Failed)?;
                    Ok(parse_process_names(&out).mark_partial())
                }
            }
        })
    }

    fn terminate<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<(), CapabilityError>> {
        Box::pin(async move {
            self.stdout(&command::force_stop(unit))
                .await
                .map(|_| ())
                .map_err(CapabilityError::Failed)
        })
    }

    fn resolve_default_home_handler(
        &self,
    ) -> PlatformFut<'_, Result<Option<UnitId>, CapabilityError>> {
        Box::pin(async move {
            let out = self
                .stdout(&command::resolve_home_activity())
                .await
                .map_err(CapabilityError::Failed)?;
            Ok(parse_resolved_activity(&out)
                .map(|(unit, _)| unit)
                .filter(|unit| unit.as_str() != RESOLVER_UNIT))
        })
    }
}

impl ActivityHost for ShellDevice {
    fn start_activity<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>> {
        Box::pin(async move { self.start(command::am_start(intent)).await })
    }

    fn send_broadcast<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>> {
        Box::pin(async move {
            self.stdout(&command::am_broadcast(intent))
                .await
                .map(|_| ())
                .map_err(HostError::Failed)
        })
    }

    fn recent_tasks(&self, limit: usize) -> PlatformFut<'_, Result<Vec<TaskInfo>, HostError>> {
        Box::pin(async move {
            let out = self
                .stdout(command::DUMP_RECENTS)
                .await
                .map_err(HostError::Failed)?;
            Ok(parse_recent_tasks(&out, limit))
        })
    }

    fn foreground_unit(&self) -> PlatformFut<'_, Result<Option<UnitId>, HostError>> {
        Box::pin(async move {
            let out = self
                .stdout(command::DUMP_ACTIVITIES)
                .await
                .map_err(HostError::Failed)?;
            Ok(parse_foreground_unit(&out))
        })
    }

    fn execution_context(&self) -> PlatformFut<'_, Result<ExecutionContext, HostError>> {
        Box::pin(async move {
            let out = self
                .stdout(command::DUMP_ACTIVITIES)
                .await
                .map_err(HostError::Failed)?;
            Ok(parse_lock_task_state(&out))
        })
    }

    fn move_task_to_front(&self, _task_id: i32) -> PlatformFut<'_, Result<(), HostError>> {
        Box::pin(async move { Err(HostError::Unsupported("move_task_to_front over shell")) })
    }
}
