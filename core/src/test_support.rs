//! In-crate fakes for unit tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use deepfreeze_types::{
    CapabilityError, EntryPoint, ExecutionContext, HostError, LaunchIntent, RegistryEntry,
    RegistryError, RunningSet, TaskInfo, UnitId,
};

use crate::StoreError;
use crate::platform::{
    ActivityHost, LedgerStore, PlatformFut, PrivilegedCapability, Registry,
};

pub fn id(s: &str) -> UnitId {
    UnitId::new(s).unwrap()
}

#[derive(Default)]
pub struct FakeCapability {
    held: AtomicBool,
    home: Mutex<Option<UnitId>>,
    home_fails: AtomicBool,
    rejected: Mutex<HashSet<UnitId>>,
    suspend_calls: Mutex<Vec<(UnitId, bool)>>,
    running: Mutex<Option<RunningSet>>,
    terminated: Mutex<Vec<UnitId>>,
    process_queries: AtomicUsize,
}

impl FakeCapability {
    pub fn held() -> Arc<Self> {
        let cap = Self::default();
        cap.held.store(true, Ordering::SeqCst);
        *cap.running.lock().unwrap() = Some(RunningSet::default());
        Arc::new(cap)
    }

    pub fn not_held() -> Arc<Self> {
        let cap = Self::default();
        *cap.running.lock().unwrap() = Some(RunningSet::default());
        Arc::new(cap)
    }

    pub fn set_home(&self, home: Option<UnitId>) {
        *self.home.lock().unwrap() = home;
    }

    pub fn fail_home_lookup(&self) {
        self.home_fails.store(true, Ordering::SeqCst);
    }

    pub fn reject(&self, unit: &UnitId) {
        self.rejected.lock().unwrap().insert(unit.clone());
    }

    /// `None` makes `list_processes` fail.
    pub fn set_running(&self, running: Option<RunningSet>) {
        *self.running.lock().unwrap() = running;
    }

    pub fn suspend_calls(&self) -> Vec<(UnitId, bool)> {
        self.suspend_calls.lock().unwrap().clone()
    }

    pub fn terminated(&self) -> Vec<UnitId> {
        self.terminated.lock().unwrap().clone()
    }

    pub fn process_queries(&self) -> usize {
        self.process_queries.load(Ordering::SeqCst)
    }
}

impl PrivilegedCapability for FakeCapability {
    fn is_held(&self) -> PlatformFut<'_, bool> {
        Box::pin(async move { self.held.load(Ordering::SeqCst) })
    }

    fn set_suspended<'a>(
        &'a self,
        unit: &'a UnitId,
        suspended: bool,
    ) -> PlatformFut<'a, Result<(), CapabilityError>> {
        Box::pin(async move {
            // A real suspend is a round trip to the platform.
            tokio::task::yield_now().await;
            if self.rejected.lock().unwrap().contains(unit) {
                return Err(CapabilityError::Rejected {
                    unit: unit.clone(),
                    reason: "refused".into(),
                });
            }
            self.suspend_calls.lock().unwrap().push((unit.clone(), suspended));
            Ok(())
        })
    }

    fn list_processes(&self) -> PlatformFut<'_, Result<RunningSet, CapabilityError>> {
        Box::pin(async move {
            self.process_queries.fetch_add(1, Ordering::SeqCst);
            self.running
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CapabilityError::Failed("ps unavailable".into()))
        })
    }

    fn terminate<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<(), CapabilityError>> {
        Box::pin(async move {
            self.terminated.lock().unwrap().push(unit.clone());
            Ok(())
        })
    }

    fn resolve_default_home_handler(
        &self,
    ) -> PlatformFut<'_, Result<Option<UnitId>, CapabilityError>> {
        Box::pin(async move {
            if self.home_fails.load(Ordering::SeqCst) {
                return Err(CapabilityError::Failed("resolver unavailable".into()));
            }
            Ok(self.home.lock().unwrap().clone())
        })
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    entries: BTreeMap<UnitId, (RegistryEntry, Vec<EntryPoint>)>,
}

impl FakeRegistry {
    pub fn with_units(units: &[&str]) -> Self {
        let mut registry = Self::default();
        for unit in units {
            registry.add(RegistryEntry::new(id(unit)), Vec::new());
        }
        registry
    }

    pub fn add(&mut self, entry: RegistryEntry, entry_points: Vec<EntryPoint>) {
        self.entries.insert(entry.unit.clone(), (entry, entry_points));
    }
}

impl Registry for FakeRegistry {
    fn enumerate(&self) -> PlatformFut<'_, Result<Vec<RegistryEntry>, RegistryError>> {
        Box::pin(async move { Ok(self.entries.values().map(|(e, _)| e.clone()).collect()) })
    }

    fn get_entry<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Option<RegistryEntry>, RegistryError>> {
        Box::pin(async move { Ok(self.entries.get(unit).map(|(e, _)| e.clone())) })
    }

    fn entry_points<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Vec<EntryPoint>, RegistryError>> {
        Box::pin(async move {
            self.entries
                .get(unit)
                .map(|(_, points)| points.clone())
                .ok_or_else(|| RegistryError::NotFound(unit.clone()))
        })
    }

    fn is_enabled<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<bool, RegistryError>> {
        Box::pin(async move { Ok(self.entries.get(unit).is_some_and(|(e, _)| e.enabled)) })
    }
}

/// Activity host whose introspection answers are scripted per test.
pub struct FakeHost {
    pub context: ExecutionContext,
    pub accept_starts: bool,
    pub recents: Mutex<Result<Vec<TaskInfo>, HostError>>,
    pub foreground: Mutex<Result<Option<UnitId>, HostError>>,
    pub starts: Mutex<Vec<LaunchIntent>>,
    pub broadcasts: Mutex<Vec<LaunchIntent>>,
    pub moved_tasks: Mutex<Vec<i32>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            context: ExecutionContext::Normal,
            accept_starts: true,
            recents: Mutex::new(Ok(Vec::new())),
            foreground: Mutex::new(Ok(None)),
            starts: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            moved_tasks: Mutex::new(Vec::new()),
        }
    }
}

impl FakeHost {
    pub fn failing_introspection() -> Self {
        Self {
            recents: Mutex::new(Err(HostError::Failed("recents denied".into()))),
            foreground: Mutex::new(Err(HostError::Failed("foreground denied".into()))),
            ..Self::default()
        }
    }

    pub fn starts(&self) -> Vec<LaunchIntent> {
        self.starts.lock().unwrap().clone()
    }
}

impl ActivityHost for FakeHost {
    fn start_activity<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>> {
        Box::pin(async move {
            self.starts.lock().unwrap().push(intent.clone());
            if self.accept_starts {
                Ok(())
            } else {
                Err(HostError::NoHandler(intent.to_string()))
            }
        })
    }

    fn send_broadcast<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>> {
        Box::pin(async move {
            self.broadcasts.lock().unwrap().push(intent.clone());
            Ok(())
        })
    }

    fn recent_tasks(&self, limit: usize) -> PlatformFut<'_, Result<Vec<TaskInfo>, HostError>> {
        Box::pin(async move {
            self.recents
                .lock()
                .unwrap()
                .clone()
                .map(|tasks| tasks.into_iter().take(limit).collect())
        })
    }

    fn foreground_unit(&self) -> PlatformFut<'_, Result<Option<UnitId>, HostError>> {
        Box::pin(async move { self.foreground.lock().unwrap().clone() })
    }

    fn execution_context(&self) -> PlatformFut<'_, Result<ExecutionContext, HostError>> {
        Box::pin(async move { Ok(self.context) })
    }

    fn move_task_to_front(&self, task_id: i32) -> PlatformFut<'_, Result<(), HostError>> {
        Box::pin(async move {
            self.moved_tasks.lock().unwrap().push(task_id);
            Ok(())
        })
    }
}

/// Store whose writes always fail.
pub struct FailingStore;

impl LedgerStore for FailingStore {
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
