//! Core domain types for deepfreeze.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod device;
mod error;
mod ids;
pub mod intent;
mod outcome;
mod remediation;

pub use device::{EntryPoint, ExecutionContext, RegistryEntry, RunningSet, TaskInfo};
pub use error::{CapabilityError, HostError, RegistryError};
pub use ids::{EmptyUnitIdError, StrategyId, UnitId};
pub use intent::{ExtraValue, IntentTarget, LaunchFlag, LaunchIntent};
pub use outcome::{LaunchResult, ToggleOutcome};
pub use remediation::{Remediation, RemediationAction, TroubleshootResult};
