//! Post-launch verification.
//!
//! A start request the host accepted is not proof the unit came up. After a
//! settle delay the verifier looks for the unit in the process list, then the
//! recent tasks, then (outside lock-task mode) the foreground window. If every
//! check that applies errors out, the launch is assumed to have worked.

use std::sync::Arc;
use std::time::Duration;

use deepfreeze_types::{ExecutionContext, UnitId};
use tracing::{debug, warn};

use crate::platform::{ActivityHost, PrivilegedCapability};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationCheck {
    Process,
    RecentTask,
    Foreground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Confirmed(VerificationCheck),
    /// At least one check answered and none found the unit.
    Refuted,
    /// Every applicable check errored.
    Inconclusive,
}

impl Verification {
    /// Inconclusive counts as launched.
    #[must_use]
    pub const fn is_launched(self) -> bool {
        !matches!(self, Self::Refuted)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VerifierSettings {
    pub settle_delay: Duration,
    pub restricted_settle_delay: Duration,
    pub recent_task_limit: usize,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(deepfreeze_config::DEFAULT_SETTLE_DELAY_MS),
            restricted_settle_delay: Duration::from_millis(
                deepfreeze_config::DEFAULT_RESTRICTED_SETTLE_DELAY_MS,
            ),
            recent_task_limit: deepfreeze_config::DEFAULT_RECENT_TASK_LIMIT,
        }
    }
}

pub struct LaunchVerifier {
    capability: Arc<dyn PrivilegedCapability>,
    host: Arc<dyn ActivityHost>,
    settings: VerifierSettings,
}

impl LaunchVerifier {
    pub fn new(
        capability: Arc<dyn PrivilegedCapability>,
        host: Arc<dyn ActivityHost>,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            capability,
            host,
            settings,
        }
    }

    pub async fn verify(&self, unit: &UnitId, context: ExecutionContext) -> bool {
        self.check(unit, context).await.is_launched()
    }

    /// Like [`verify`](Self::verify), but keeps which check answered.
    pub async fn check(&self, unit: &UnitId, context: ExecutionContext) -> Verification {
        let delay = if context.is_restricted() {
            self.settings.restricted_settle_delay
        } else {
            self.settings.settle_delay
        };
        tokio::time::sleep(delay).await;

        let mut answered = false;

        match self.capability.list_processes().await {
            Ok(running) if running.contains(unit) => {
                debug!(unit = %unit, "Process verification succeeded");
                return Verification::Confirmed(VerificationCheck::Process);
            }
            Ok(_) => answered = true,
            Err(e) => debug!(unit = %unit, "Process check unavailable: {e}"),
        }

        match self.host.recent_tasks(self.settings.recent_task_limit).await {
            Ok(tasks) if tasks.iter().any(|task| task.involves(unit)) => {
                debug!(unit = %unit, "Task verification succeeded");
                return Verification::Confirmed(VerificationCheck::RecentTask);
            }
            Ok(_) => answered = true,
            Err(e) => debug!(unit = %unit, "Recent-task check unavailable: {e}"),
        }

        if !context.is_restricted() {
            match self.host.foreground_unit().await {
                Ok(Some(top)) if top == *unit => {
                    debug!(unit = %unit, "Foreground verification succeeded");
                    return Verification::Confirmed(VerificationCheck::Foreground);
                }
                Ok(_) => answered = true,
                Err(e) => debug!(unit = %unit, "Foreground check unavailable: {e}"),
            }
        }

        if answered {
            debug!(unit = %unit, "Launch not observed by any check");
            Verification::Refuted
        } else {
            warn!(unit = %unit, "Verification inconclusive, assuming launch succeeded");
            Verification::Inconclusive
        }
    }
}
