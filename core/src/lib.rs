//! Suspension ledger, reconciliation loop, launch resolver and troubleshoot
//! advisor.
//!
//! Everything here talks to the device through the traits in [`platform`],
//! so the same services run against the shell backend or test fakes.

mod error;
pub mod freeze;
pub mod launch;
pub mod monitor;
pub mod platform;
pub mod store;
pub mod troubleshoot;

#[cfg(test)]
mod test_support;

pub use error::{FreezeError, MonitorError, StoreError, StrategyError};
pub use freeze::{CriticalSet, FreezeManager};
pub use launch::{AppLauncher, LaunchInfo, LaunchSettings};
pub use monitor::{FreezeMonitor, MonitorHandle, MonitorPhase, MonitorSettings, MonitorStatus};
pub use platform::{ActivityHost, LedgerStore, PlatformFut, PrivilegedCapability, Registry};
pub use store::{JsonFileStore, MemoryStore};
pub use troubleshoot::{RemediationTable, Troubleshooter};
