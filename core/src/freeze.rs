//! Suspension ledger and policy enforcer.
//!
//! [`FreezeManager`] is the only writer of suspension intent. A ledger entry
//! is committed only after the privileged capability has applied the change,
//! and a failed commit rolls the OS change back.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use deepfreeze_types::{CapabilityError, ToggleOutcome, UnitId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::FreezeError;
use crate::platform::{LedgerStore, PrivilegedCapability, Registry};

pub const SHELL_UI_UNIT: &str = "com.android.systemui";
pub const SETTINGS_UNIT: &str = "com.android.settings";
pub const PLATFORM_UNIT: &str = "android";
pub const DEFAULT_TELEPHONY_UNIT: &str = "com.android.phone";

/// Units that must never be suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalSet {
    members: BTreeSet<UnitId>,
}

impl CriticalSet {
    /// Fixed members: shell UI, settings, the platform, ourselves, telephony.
    #[must_use]
    pub fn new(self_unit: UnitId, telephony_unit: Option<UnitId>) -> Self {
        let mut members: BTreeSet<UnitId> = [SHELL_UI_UNIT, SETTINGS_UNIT, PLATFORM_UNIT]
            .into_iter()
            .map(UnitId::from_static)
            .collect();
        members.insert(self_unit);
        members.insert(telephony_unit.unwrap_or_else(|| UnitId::from_static(DEFAULT_TELEPHONY_UNIT)));
        Self { members }
    }

    pub fn with_units(mut self, units: impl IntoIterator<Item = UnitId>) -> Self {
        self.members.extend(units);
        self
    }

    /// Add the home handler resolved at startup. A failed lookup is logged and
    /// leaves the set unchanged; toggles still query the handler live.
    pub async fn resolve_home_handler(mut self, capability: &dyn PrivilegedCapability) -> Self {
        match capability.resolve_default_home_handler().await {
            Ok(Some(home)) => {
                debug!(unit = %home, "Protecting default home handler");
                self.members.insert(home);
            }
            Ok(None) => debug!("No default home handler resolved"),
            Err(e) => warn!("Failed to resolve default home handler at startup: {e}"),
        }
        self
    }

    #[must_use]
    pub fn contains(&self, unit: &UnitId) -> bool {
        self.members.contains(unit)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub struct FreezeManager {
    store: Arc<dyn LedgerStore>,
    capability: Arc<dyn PrivilegedCapability>,
    critical: CriticalSet,
    suspended: RwLock<BTreeSet<UnitId>>,
    // One async lock per unit so ledger writes on the same unit run one at a time.
    unit_locks: Mutex<HashMap<UnitId, Arc<tokio::sync::Mutex<()>>>>,
    // Toggles currently running, keyed by unit. Duplicates await the result.
    in_flight: Mutex<HashMap<UnitId, watch::Receiver<Option<ToggleOutcome>>>>,
}

enum Flight {
    Lead(watch::Sender<Option<ToggleOutcome>>),
    Follow(watch::Receiver<Option<ToggleOutcome>>),
}

/// Clears the in-flight slot when the leading toggle finishes or is dropped.
struct FlightLease<'a> {
    manager: &'a FreezeManager,
    unit: &'a UnitId,
}

impl Drop for FlightLease<'_> {
    fn drop(&mut self) {
        self.manager
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(self.unit);
    }
}

impl FreezeManager {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        capability: Arc<dyn PrivilegedCapability>,
        critical: CriticalSet,
    ) -> Result<Self, FreezeError> {
        let suspended = store.load()?;
        info!(count = suspended.len(), "Loaded suspension ledger");
        Ok(Self {
            store,
            capability,
            critical,
            suspended: RwLock::new(suspended),
            unit_locks: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn is_suspended(&self, unit: &UnitId) -> bool {
        self.read_suspended().contains(unit)
    }

    #[must_use]
    pub fn list_suspended(&self) -> BTreeSet<UnitId> {
        self.read_suspended().clone()
    }

    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.read_suspended().len()
    }

    #[must_use]
    pub fn critical_set(&self) -> &CriticalSet {
        &self.critical
    }

    pub async fn is_capability_held(&self) -> bool {
        self.capability.is_held().await
    }

    /// Safeguard check: static critical membership, then a live home lookup.
    pub async fn is_protected(&self, unit: &UnitId) -> bool {
        if self.critical.contains(unit) {
            return true;
        }
        match self.capability.resolve_default_home_handler().await {
            Ok(Some(home)) => home == *unit,
            Ok(None) => false,
            Err(e) => {
                warn!(unit = %unit, "Home handler lookup failed, relying on startup set: {e}");
                false
            }
        }
    }

    /// Flip the unit's suspension state.
    ///
    /// A toggle that arrives while another toggle on the same unit is still
    /// running does not flip again: it waits for and returns that toggle's
    /// outcome.
    pub async fn toggle(&self, unit: &UnitId) -> ToggleOutcome {
        if self.is_protected(unit).await {
            info!(unit = %unit, "Refusing to toggle critical unit");
            return ToggleOutcome::AlreadyCritical;
        }

        loop {
            match self.join_flight(unit) {
                Flight::Lead(tx) => {
                    let _lease = FlightLease {
                        manager: self,
                        unit,
                    };
                    let outcome = self.toggle_exclusive(unit).await;
                    tx.send_replace(Some(outcome.clone()));
                    return outcome;
                }
                Flight::Follow(mut rx) => {
                    debug!(unit = %unit, "Joining in-flight toggle");
                    let settled = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|outcome| (*outcome).clone());
                    if let Some(outcome) = settled {
                        return outcome;
                    }
                    // The leading toggle was dropped before it finished.
                }
            }
        }
    }

    async fn toggle_exclusive(&self, unit: &UnitId) -> ToggleOutcome {
        let lock = self.unit_lock(unit);
        let outcome = {
            let _guard = lock.lock().await;
            if self.capability.is_held().await {
                let target = !self.is_suspended(unit);
                self.apply(unit, target).await
            } else {
                warn!(unit = %unit, "Cannot toggle: privileged capability not held");
                ToggleOutcome::CapabilityUnavailable
            }
        };
        self.release_unit_lock(unit, lock);
        outcome
    }

    fn join_flight(&self, unit: &UnitId) -> Flight {
        let mut flights = self
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(rx) = flights.get(unit) {
            return Flight::Follow(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        flights.insert(unit.clone(), rx);
        Flight::Lead(tx)
    }

    /// Resume every unit in the ledger. One failure does not stop the batch.
    pub async fn unfreeze_all(&self) -> Result<Vec<(UnitId, ToggleOutcome)>, FreezeError> {
        if !self.capability.is_held().await {
            warn!("Cannot unfreeze all: privileged capability not held");
            return Err(FreezeError::CapabilityUnavailable);
        }

        let snapshot = self.list_suspended();
        let mut results = Vec::with_capacity(snapshot.len());
        for unit in snapshot {
            let lock = self.unit_lock(&unit);
            let outcome = {
                let _guard = lock.lock().await;
                if self.is_suspended(&unit) {
                    self.apply(&unit, false).await
                } else {
                    // Unfrozen concurrently since the snapshot was taken.
                    ToggleOutcome::Applied {
                        now_suspended: false,
                    }
                }
            };
            self.release_unit_lock(&unit, lock);
            if !outcome.is_applied() {
                warn!(unit = %unit, %outcome, "Unfreeze failed");
            }
            results.push((unit, outcome));
        }
        Ok(results)
    }

    /// Drop ledger entries for units the registry no longer knows.
    ///
    /// The capability is not called: there is nothing left to resume.
    pub async fn prune_uninstalled(&self, registry: &dyn Registry) -> Result<Vec<UnitId>, FreezeError> {
        let installed: BTreeSet<UnitId> = registry
            .enumerate()
            .await?
            .into_iter()
            .map(|entry| entry.unit)
            .collect();

        let mut pruned = Vec::new();
        for unit in self.list_suspended() {
            if installed.contains(&unit) {
                continue;
            }
            let lock = self.unit_lock(&unit);
            let removed = {
                let _guard = lock.lock().await;
                self.store.remove(&unit)
            };
            self.release_unit_lock(&unit, lock);
            removed?;
            self.write_suspended().remove(&unit);
            info!(unit = %unit, "Pruned ledger entry for uninstalled unit");
            pruned.push(unit);
        }
        Ok(pruned)
    }

    /// Call the capability, then commit. Caller holds the unit lock.
    async fn apply(&self, unit: &UnitId, suspend: bool) -> ToggleOutcome {
        if let Err(e) = self.capability.set_suspended(unit, suspend).await {
            warn!(unit = %unit, suspend, "Capability call failed: {e}");
            return capability_outcome(e);
        }

        let committed = if suspend {
            self.store.put(unit)
        } else {
            self.store.remove(unit)
        };

        if let Err(e) = committed {
            warn!(unit = %unit, suspend, "Ledger write failed, rolling back: {e}");
            if let Err(rollback) = self.capability.set_suspended(unit, !suspend).await {
                warn!(unit = %unit, "Rollback failed, OS state diverges from ledger: {rollback}");
            }
            return ToggleOutcome::StoreFailed(e.to_string());
        }

        {
            let mut suspended = self.write_suspended();
            if suspend {
                suspended.insert(unit.clone());
            } else {
                suspended.remove(unit);
            }
        }
        info!(unit = %unit, suspended = suspend, "Suspension state applied");
        ToggleOutcome::Applied {
            now_suspended: suspend,
        }
    }

    fn unit_lock(&self, unit: &UnitId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .unit_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(locks.entry(unit.clone()).or_default())
    }

    /// Drop the map's lock for `unit` once nobody else holds or awaits it.
    fn release_unit_lock(&self, unit: &UnitId, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self
            .unit_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if locks.get(unit).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(unit);
        }
    }

    fn read_suspended(&self) -> std::sync::RwLockReadGuard<'_, BTreeSet<UnitId>> {
        self.suspended
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_suspended(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<UnitId>> {
        self.suspended
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn capability_outcome(err: CapabilityError) -> ToggleOutcome {
    match err {
        CapabilityError::NotHeld | CapabilityError::Unsupported(_) => {
            ToggleOutcome::CapabilityUnavailable
        }
        CapabilityError::Rejected { reason, .. } => ToggleOutcome::PolicyError(reason),
        CapabilityError::Failed(message) => ToggleOutcome::PolicyError(message),
    }
}
