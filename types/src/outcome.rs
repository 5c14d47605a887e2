use std::fmt;

use serde::Serialize;

use crate::StrategyId;

/// Result of a single toggle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The unit is protected; nothing was changed.
    AlreadyCritical,
    /// The capability applied the change and the ledger recorded it.
    Applied { now_suspended: bool },
    /// The privileged capability is not held, or the call could not be made.
    CapabilityUnavailable,
    /// The OS refused to apply the change to this unit.
    PolicyError(String),
    /// The OS change was applied but the ledger write failed; the change was
    /// rolled back on a best-effort basis.
    StoreFailed(String),
}

impl ToggleOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

impl fmt::Display for ToggleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyCritical => f.write_str("rejected: unit is critical"),
            Self::Applied {
                now_suspended: true,
            } => f.write_str("frozen"),
            Self::Applied {
                now_suspended: false,
            } => f.write_str("unfrozen"),
            Self::CapabilityUnavailable => f.write_str("privileged capability unavailable"),
            Self::PolicyError(reason) => write!(f, "policy error: {reason}"),
            Self::StoreFailed(reason) => write!(f, "ledger write failed: {reason}"),
        }
    }
}

/// What a resolver returns for one `launch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchResult {
    pub success: bool,
    pub selected_strategy: Option<StrategyId>,
    pub verified: bool,
}

impl LaunchResult {
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            success: false,
            selected_strategy: None,
            verified: false,
        }
    }

    /// `verified` is false when the start was accepted but no check could
    /// confirm it.
    #[must_use]
    pub const fn succeeded(strategy: StrategyId, verified: bool) -> Self {
        Self {
            success: true,
            selected_strategy: Some(strategy),
            verified,
        }
    }
}
