use std::path::PathBuf;

use deepfreeze_types::{CapabilityError, HostError, RegistryError, UnitId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read ledger at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write ledger at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum FreezeError {
    #[error("privileged capability is not held")]
    CapabilityUnavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A failing reconciliation cycle. The loop logs it and backs off.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to read running processes: {0}")]
    RunningSet(#[source] CapabilityError),
}

/// Why a single launch strategy gave up. Never escapes the resolver.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("every candidate for {unit} was rejected: {last}")]
    Exhausted { unit: UnitId, last: HostError },
}
