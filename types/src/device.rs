//! Snapshots of device state as reported by the registry and the OS.

use std::collections::BTreeSet;

use crate::UnitId;

/// Registry metadata for one installed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub unit: UnitId,
    pub label: String,
    pub enabled: bool,
    /// Hidden or suspended at the OS level, regardless of our ledger.
    pub hidden: bool,
    pub system: bool,
    /// Class name of the registered launch entry point, if the unit declares one.
    pub launch_entry: Option<String>,
}

impl RegistryEntry {
    #[must_use]
    pub fn new(unit: UnitId) -> Self {
        let label = unit.as_str().to_string();
        Self {
            unit,
            label,
            enabled: true,
            hidden: false,
            system: false,
            launch_entry: None,
        }
    }

    pub fn with_launch_entry(mut self, class_name: impl Into<String>) -> Self {
        self.launch_entry = Some(class_name.into());
        self
    }
}

/// An addressable starting component of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Fully-qualified class name (`com.example.app.MainActivity`).
    pub class_name: String,
    pub exported: bool,
    /// Matches `ACTION_MAIN` + `CATEGORY_LAUNCHER`.
    pub launcher: bool,
    /// Resolver priority of the launcher filter; higher wins.
    pub priority: i32,
}

impl EntryPoint {
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            exported: false,
            launcher: false,
            priority: 0,
        }
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn launcher(mut self, priority: i32) -> Self {
        self.launcher = true;
        self.exported = true;
        self.priority = priority;
        self
    }

    /// Expand a manifest-relative name (`.MainActivity`) against its unit.
    #[must_use]
    pub fn qualify(unit: &UnitId, class_name: &str) -> String {
        if class_name.starts_with('.') {
            format!("{unit}{class_name}")
        } else {
            class_name.to_string()
        }
    }
}

/// One entry of the OS recent-task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: i32,
    pub base_unit: Option<UnitId>,
    pub top_unit: Option<UnitId>,
}

impl TaskInfo {
    #[must_use]
    pub fn involves(&self, unit: &UnitId) -> bool {
        self.base_unit.as_ref() == Some(unit) || self.top_unit.as_ref() == Some(unit)
    }
}

/// OS-observed set of units with at least one live process.
///
/// May be partial when the capability lacks full introspection rights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningSet {
    units: BTreeSet<UnitId>,
    partial: bool,
}

impl RunningSet {
    /// Build from raw process names; `unit:suffix` processes count as `unit`.
    pub fn from_process_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let units = names
            .into_iter()
            .filter_map(|name| UnitId::from_process_name(name.as_ref()))
            .collect();
        Self {
            units,
            partial: false,
        }
    }

    pub fn mark_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    #[must_use]
    pub fn contains(&self, unit: &UnitId) -> bool {
        self.units.contains(unit)
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitId> {
        self.units.iter()
    }
}

impl FromIterator<UnitId> for RunningSet {
    fn from_iter<T: IntoIterator<Item = UnitId>>(iter: T) -> Self {
        Self {
            units: iter.into_iter().collect(),
            partial: false,
        }
    }
}

/// Whether the device is confined to a kiosk-like single-app mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Normal,
    Restricted,
}

impl ExecutionContext {
    #[must_use]
    pub const fn is_restricted(self) -> bool {
        matches!(self, Self::Restricted)
    }
}
