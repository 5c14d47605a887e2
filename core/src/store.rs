//! Ledger persistence.
//!
//! On disk the ledger is a JSON object of `unit -> true`. A key is only ever
//! present with `true`; unfreezing removes it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{fs, io};

use deepfreeze_types::UnitId;
use deepfreeze_utils::{atomic_write, recover_bak_file};

use crate::StoreError;
use crate::platform::LedgerStore;

pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write of the file across threads.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<UnitId, bool>, StoreError> {
        recover_bak_file(&self.path);
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: err,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(&self, map: &BTreeMap<UnitId, bool>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(map).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        atomic_write(&self.path, &bytes).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<UnitId, bool>) -> bool) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))?;
        let mut map = self.read_map()?;
        if f(&mut map) {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<BTreeSet<UnitId>, StoreError> {
        let map = self.read_map()?;
        Ok(map
            .into_iter()
            .filter_map(|(unit, suspended)| suspended.then_some(unit))
            .collect())
    }

    fn put(&self, unit: &UnitId) -> Result<(), StoreError> {
        self.mutate(|map| map.insert(unit.clone(), true) != Some(true))
    }

    fn remove(&self, unit: &UnitId) -> Result<(), StoreError> {
        self.mutate(|map| map.remove(unit).is_some())
    }
}

/// Volatile store, used when no ledger path is available and in tests.
#[derive(Default)]
pub struct MemoryStore {
    units: Mutex<BTreeSet<UnitId>>,
}

impl MemoryStore {
    #[must_use]
    pub fn with_units(units: impl IntoIterator<Item = UnitId>) -> Self {
        Self {
            units: Mutex::new(units.into_iter().collect()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeSet<UnitId>>, StoreError> {
        self.units
            .lock()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<BTreeSet<UnitId>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn put(&self, unit: &UnitId) -> Result<(), StoreError> {
        self.lock()?.insert(unit.clone());
        Ok(())
    }

    fn remove(&self, unit: &UnitId) -> Result<(), StoreError> {
        self.lock()?.remove(unit);
        Ok(())
    }
}
