use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unit identifier must not be empty")]
pub struct EmptyUnitIdError;

/// Stable key naming an installed application unit (e.g. `com.whatsapp`).
///
/// Invariant: non-empty after trimming, no surrounding whitespace. Enforced at
/// construction and at the deserialization boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(String);

impl UnitId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyUnitIdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(EmptyUnitIdError);
        }
        if trimmed.len() == value.len() {
            Ok(Self(value))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// For compile-time constants such as well-known system units.
    #[must_use]
    pub fn from_static(value: &'static str) -> Self {
        debug_assert!(!value.trim().is_empty() && value.trim().len() == value.len());
        Self(value.to_string())
    }

    /// Map an OS process name to the unit that owns it.
    ///
    /// Secondary processes are named `unit:suffix`; the owning unit is the
    /// part before the first colon.
    #[must_use]
    pub fn from_process_name(process: &str) -> Option<Self> {
        let base = process.split(':').next().unwrap_or(process);
        Self::new(base).ok()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UnitId {
    type Error = EmptyUnitIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for UnitId {
    type Error = EmptyUnitIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UnitId> for String {
    fn from(value: UnitId) -> Self {
        value.0
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one launch strategy in a resolver chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    DirectEntryPoint,
    DeepLink,
    LauncherQuery,
    PriorityName,
    ConventionalComponent,
    SystemAction,
    WakeThenRetry,
    HighestPriorityHandler,
    BruteForce,
    LockTaskEntryPoint,
    ExportedComponent,
    TaskResume,
    ResolvedLauncher,
    LockTaskDeepLink,
}

impl StrategyId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectEntryPoint => "direct_entry_point",
            Self::DeepLink => "deep_link",
            Self::LauncherQuery => "launcher_query",
            Self::PriorityName => "priority_name",
            Self::ConventionalComponent => "conventional_component",
            Self::SystemAction => "system_action",
            Self::WakeThenRetry => "wake_then_retry",
            Self::HighestPriorityHandler => "highest_priority_handler",
            Self::BruteForce => "brute_force",
            Self::LockTaskEntryPoint => "lock_task_entry_point",
            Self::ExportedComponent => "exported_component",
            Self::TaskResume => "task_resume",
            Self::ResolvedLauncher => "resolved_launcher",
            Self::LockTaskDeepLink => "lock_task_deep_link",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
