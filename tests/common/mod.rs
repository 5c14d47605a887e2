//! Shared test utilities and fixtures
//!
//! A scripted in-memory device standing in for the registry, the privileged
//! capability and the activity host at once.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use deepfreeze_core::{
    ActivityHost, CriticalSet, FreezeManager, LedgerStore, MemoryStore, PlatformFut,
    PrivilegedCapability, Registry,
};
use deepfreeze_types::{
    CapabilityError, EntryPoint, ExecutionContext, HostError, IntentTarget, LaunchIntent,
    RegistryEntry, RegistryError, RunningSet, TaskInfo, UnitId,
};

pub const SELF_UNIT: &str = "com.asadbyte.deepfreezer";
pub const HOME_UNIT: &str = "com.launcher.home";

pub fn unit(s: &str) -> UnitId {
    UnitId::new(s).unwrap()
}

#[derive(Default)]
struct DeviceState {
    packages: BTreeMap<UnitId, (RegistryEntry, Vec<EntryPoint>)>,
    running: BTreeSet<UnitId>,
    os_suspended: BTreeSet<UnitId>,
    suspend_calls: Vec<(UnitId, bool)>,
    terminate_calls: Vec<UnitId>,
    rejected: BTreeSet<UnitId>,
    unkillable: BTreeSet<UnitId>,
    starts: Vec<LaunchIntent>,
    broadcasts: Vec<LaunchIntent>,
    home: Option<UnitId>,
    context: ExecutionContext,
    recents_fail: bool,
    foreground_fail: bool,
    processes_fail: bool,
}

/// Simulated device. Accepted starts spawn the target's process unless
/// `starts_spawn` is off.
pub struct FakeDevice {
    held: AtomicBool,
    accept_starts: AtomicBool,
    starts_spawn: AtomicBool,
    state: Mutex<DeviceState>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            held: AtomicBool::new(true),
            accept_starts: AtomicBool::new(true),
            starts_spawn: AtomicBool::new(true),
            state: Mutex::new(DeviceState {
                home: Some(unit(HOME_UNIT)),
                ..DeviceState::default()
            }),
        }
    }
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn install(&self, entry: RegistryEntry, entry_points: Vec<EntryPoint>) {
        let mut state = self.state.lock().unwrap();
        state.packages.insert(entry.unit.clone(), (entry, entry_points));
    }

    pub fn install_plain(&self, units: &[&str]) {
        for u in units {
            self.install(RegistryEntry::new(unit(u)), Vec::new());
        }
    }

    pub fn uninstall(&self, u: &str) {
        self.state.lock().unwrap().packages.remove(&unit(u));
    }

    pub fn set_held(&self, held: bool) {
        self.held.store(held, Ordering::SeqCst);
    }

    pub fn set_accept_starts(&self, accept: bool) {
        self.accept_starts.store(accept, Ordering::SeqCst);
    }

    pub fn set_starts_spawn(&self, spawn: bool) {
        self.starts_spawn.store(spawn, Ordering::SeqCst);
    }

    pub fn set_context(&self, context: ExecutionContext) {
        self.state.lock().unwrap().context = context;
    }

    pub fn set_running(&self, units: &[&str]) {
        self.state.lock().unwrap().running = units.iter().map(|u| unit(u)).collect();
    }

    pub fn reject_suspend(&self, u: &str) {
        self.state.lock().unwrap().rejected.insert(unit(u));
    }

    pub fn make_unkillable(&self, u: &str) {
        self.state.lock().unwrap().unkillable.insert(unit(u));
    }

    /// Every introspection call errors.
    pub fn blind_introspection(&self) {
        let mut state = self.state.lock().unwrap();
        state.recents_fail = true;
        state.foreground_fail = true;
        state.processes_fail = true;
    }

    pub fn running(&self) -> BTreeSet<UnitId> {
        self.state.lock().unwrap().running.clone()
    }

    pub fn os_suspended(&self) -> BTreeSet<UnitId> {
        self.state.lock().unwrap().os_suspended.clone()
    }

    pub fn suspend_calls(&self) -> Vec<(UnitId, bool)> {
        self.state.lock().unwrap().suspend_calls.clone()
    }

    pub fn terminate_calls(&self) -> Vec<UnitId> {
        self.state.lock().unwrap().terminate_calls.clone()
    }

    pub fn starts(&self) -> Vec<LaunchIntent> {
        self.state.lock().unwrap().starts.clone()
    }

    pub fn broadcasts(&self) -> Vec<LaunchIntent> {
        self.state.lock().unwrap().broadcasts.clone()
    }
}

fn target_unit(intent: &LaunchIntent) -> Option<UnitId> {
    match &intent.target {
        IntentTarget::Component { unit, .. } | IntentTarget::Package(unit) => Some(unit.clone()),
        IntentTarget::Uri { unit, .. } => unit.clone(),
    }
}

impl Registry for FakeDevice {
    fn enumerate(&self) -> PlatformFut<'_, Result<Vec<RegistryEntry>, RegistryError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state.packages.values().map(|(e, _)| e.clone()).collect())
        })
    }

    fn get_entry<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Option<RegistryEntry>, RegistryError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state.packages.get(unit).map(|(e, _)| {
                let mut entry = e.clone();
                entry.hidden |= state.os_suspended.contains(unit);
                entry
            }))
        })
    }

    fn entry_points<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Vec<EntryPoint>, RegistryError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state
                .packages
                .get(unit)
                .map(|(_, points)| points.clone())
                .ok_or_else(|| RegistryError::NotFound(unit.clone()))
        })
    }

    fn is_enabled<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<bool, RegistryError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state.packages.get(unit).is_some_and(|(e, _)| e.enabled))
        })
    }
}

impl PrivilegedCapability for FakeDevice {
    fn is_held(&self) -> PlatformFut<'_, bool> {
        Box::pin(async move { self.held.load(Ordering::SeqCst) })
    }

    fn set_suspended<'a>(
        &'a self,
        unit: &'a UnitId,
        suspended: bool,
    ) -> PlatformFut<'a, Result<(), CapabilityError>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            state.suspend_calls.push((unit.clone(), suspended));
            if state.rejected.contains(unit) {
                return Err(CapabilityError::Rejected {
                    unit: unit.clone(),
                    reason: "policy refused".into(),
                });
            }
            if suspended {
                state.os_suspended.insert(unit.clone());
            } else {
                state.os_suspended.remove(unit);
            }
            Ok(())
        })
    }

    fn list_processes(&self) -> PlatformFut<'_, Result<RunningSet, CapabilityError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            if state.processes_fail {
                return Err(CapabilityError::Failed("ps denied".into()));
            }
            Ok(state.running.iter().cloned().collect())
        })
    }

    fn terminate<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<(), CapabilityError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.terminate_calls.push(unit.clone());
            if state.unkillable.contains(unit) {
                return Err(CapabilityError::Failed(format!("{unit} respawned")));
            }
            state.running.remove(unit);
            Ok(())
        })
    }

    fn resolve_default_home_handler(
        &self,
    ) -> PlatformFut<'_, Result<Option<UnitId>, CapabilityError>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().home.clone()) })
    }
}

impl ActivityHost for FakeDevice {
    fn start_activity<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.starts.push(intent.clone());
            if !self.accept_starts.load(Ordering::SeqCst) {
                return Err(HostError::NoHandler(intent.to_string()));
            }
            if self.starts_spawn.load(Ordering::SeqCst)
                && let Some(unit) = target_unit(intent)
            {
                state.running.insert(unit);
            }
            Ok(())
        })
    }

    fn send_broadcast<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>> {
        Box::pin(async move {
            self.state.lock().unwrap().broadcasts.push(intent.clone());
            Ok(())
        })
    }

    fn recent_tasks(&self, _limit: usize) -> PlatformFut<'_, Result<Vec<TaskInfo>, HostError>> {
        Box::pin(async move {
            if self.state.lock().unwrap().recents_fail {
                return Err(HostError::Failed("recents denied".into()));
            }
            Ok(Vec::new())
        })
    }

    fn foreground_unit(&self) -> PlatformFut<'_, Result<Option<UnitId>, HostError>> {
        Box::pin(async move {
            if self.state.lock().unwrap().foreground_fail {
                return Err(HostError::Failed("foreground denied".into()));
            }
            Ok(None)
        })
    }

    fn execution_context(&self) -> PlatformFut<'_, Result<ExecutionContext, HostError>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().context) })
    }

    fn move_task_to_front(&self, _task_id: i32) -> PlatformFut<'_, Result<(), HostError>> {
        Box::pin(async move { Err(HostError::Unsupported("move_task_to_front")) })
    }
}

/// Critical set as the CLI builds it, with the device's home handler.
pub async fn critical_set(device: &FakeDevice) -> CriticalSet {
    CriticalSet::new(unit(SELF_UNIT), None)
        .resolve_home_handler(device)
        .await
}

pub async fn manager_with_store(
    device: &Arc<FakeDevice>,
    store: Arc<dyn LedgerStore>,
) -> Arc<FreezeManager> {
    let critical = critical_set(device).await;
    Arc::new(FreezeManager::new(store, device.clone(), critical).unwrap())
}

pub async fn manager(device: &Arc<FakeDevice>) -> Arc<FreezeManager> {
    manager_with_store(device, Arc::new(MemoryStore::default())).await
}
