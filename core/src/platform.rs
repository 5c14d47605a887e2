//! Async seams to the device.
//!
//! Every platform call returns a boxed future so the traits stay object-safe
//! and can be shared as `Arc<dyn ...>` between the freeze manager, the
//! reconciliation loop and the launcher.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use deepfreeze_types::{
    CapabilityError, EntryPoint, ExecutionContext, HostError, LaunchIntent, RegistryEntry,
    RegistryError, RunningSet, TaskInfo, UnitId,
};

use crate::StoreError;

pub type PlatformFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Installed-unit metadata.
pub trait Registry: Send + Sync {
    fn enumerate(&self) -> PlatformFut<'_, Result<Vec<RegistryEntry>, RegistryError>>;

    /// `Ok(None)` when the unit is not installed.
    fn get_entry<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Option<RegistryEntry>, RegistryError>>;

    /// Declared entry points in manifest order.
    fn entry_points<'a>(
        &'a self,
        unit: &'a UnitId,
    ) -> PlatformFut<'a, Result<Vec<EntryPoint>, RegistryError>>;

    fn is_enabled<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<bool, RegistryError>>;
}

/// The device-owner style privilege that can suspend and kill units.
pub trait PrivilegedCapability: Send + Sync {
    fn is_held(&self) -> PlatformFut<'_, bool>;

    fn set_suspended<'a>(
        &'a self,
        unit: &'a UnitId,
        suspended: bool,
    ) -> PlatformFut<'a, Result<(), CapabilityError>>;

    fn list_processes(&self) -> PlatformFut<'_, Result<RunningSet, CapabilityError>>;

    fn terminate<'a>(&'a self, unit: &'a UnitId) -> PlatformFut<'a, Result<(), CapabilityError>>;

    /// The unit currently answering `MAIN`/`HOME`, if any.
    fn resolve_default_home_handler(
        &self,
    ) -> PlatformFut<'_, Result<Option<UnitId>, CapabilityError>>;
}

/// Launch and task introspection surface.
pub trait ActivityHost: Send + Sync {
    fn start_activity<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>>;

    fn send_broadcast<'a>(&'a self, intent: &'a LaunchIntent) -> PlatformFut<'a, Result<(), HostError>>;

    /// Most recent first, at most `limit` entries.
    fn recent_tasks(&self, limit: usize) -> PlatformFut<'_, Result<Vec<TaskInfo>, HostError>>;

    fn foreground_unit(&self) -> PlatformFut<'_, Result<Option<UnitId>, HostError>>;

    fn execution_context(&self) -> PlatformFut<'_, Result<ExecutionContext, HostError>>;

    fn move_task_to_front(&self, task_id: i32) -> PlatformFut<'_, Result<(), HostError>>;
}

/// Durable backing for the suspension ledger.
///
/// Each mutation must be atomic: after a crash the store reflects either the
/// state before or after the call.
pub trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<BTreeSet<UnitId>, StoreError>;
    fn put(&self, unit: &UnitId) -> Result<(), StoreError>;
    fn remove(&self, unit: &UnitId) -> Result<(), StoreError>;
}
