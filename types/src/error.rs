use thiserror::Error;

use crate::UnitId;

/// Failure of a privileged capability call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The process does not hold the privileged capability at all.
    #[error("privileged capability is not held")]
    NotHeld,
    /// The OS accepted the call but refused to apply it to these units.
    #[error("policy rejected request for {unit}: {reason}")]
    Rejected { unit: UnitId, reason: String },
    #[error("capability call failed: {0}")]
    Failed(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unit not installed: {0}")]
    NotFound(UnitId),
    #[error("registry lookup failed: {0}")]
    Lookup(String),
}

/// Failure of the activity host (start, broadcast, introspection).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("no component handles {0}")]
    NoHandler(String),
    #[error("start rejected: {0}")]
    Rejected(String),
    #[error("host call failed: {0}")]
    Failed(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}
