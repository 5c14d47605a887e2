//! Launch resolver.
//!
//! `AppLauncher::launch` runs pre-checks, then an ordered chain of
//! strategies. Each apparent success is verified; the first verified success
//! wins and no later strategy runs. Strategy errors are logged and the chain
//! moves on. Only an exhausted chain is reported as a failure.

pub mod candidates;
pub mod strategies;
pub mod tables;
pub mod verifier;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deepfreeze_config::DeepfreezeConfig;
use deepfreeze_types::{
    ExecutionContext, LaunchFlag, LaunchIntent, LaunchResult, RegistryEntry, Remediation,
    RemediationAction, StrategyId, UnitId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::freeze::FreezeManager;
use crate::platform::{ActivityHost, PrivilegedCapability, Registry};
use candidates::launcher_entries;
use strategies::{LaunchCtx, LaunchStrategy, default_chain, restricted_chain};
use tables::LaunchTables;
use verifier::{LaunchVerifier, Verification, VerifierSettings};

pub const MARKET_DETAILS_URI: &str = "market://details?id=";
pub const WEB_STORE_URI: &str = "https://play.google.com/store/apps/details?id=";
pub const ACTION_APPLICATION_DETAILS_SETTINGS: &str =
    "android.settings.APPLICATION_DETAILS_SETTINGS";
pub const ACTION_CALL: &str = "android.intent.action.CALL";

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Our own unit id, sent as referrer by lock-task strategies.
    pub self_unit: UnitId,
    pub wake_delay: Duration,
    pub verifier: VerifierSettings,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            self_unit: UnitId::from_static(deepfreeze_config::DEFAULT_SELF_UNIT),
            wake_delay: Duration::from_millis(deepfreeze_config::DEFAULT_WAKE_DELAY_MS),
            verifier: VerifierSettings::default(),
        }
    }
}

impl LaunchSettings {
    #[must_use]
    pub fn from_config(config: &DeepfreezeConfig) -> Self {
        Self {
            self_unit: config.self_unit(),
            wake_delay: config.wake_delay(),
            verifier: VerifierSettings {
                settle_delay: config.settle_delay(),
                restricted_settle_delay: config.restricted_settle_delay(),
                recent_task_limit: config.recent_task_limit(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy had no candidate for this unit.
    NotApplicable,
    /// The host accepted a start but verification did not observe the unit.
    Unverified,
    Verified,
    /// Every verification check errored; counted as a launch.
    Assumed,
    Failed(String),
}

/// One strategy's result within a single `launch` call.
#[derive(Debug, Clone)]
pub struct LaunchAttempt {
    pub strategy: StrategyId,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

/// Diagnostic snapshot of why a unit may not be startable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaunchInfo {
    pub installed: bool,
    pub enabled: bool,
    pub hidden: bool,
    pub suspended: bool,
    pub can_launch: bool,
    pub entry_points: Vec<String>,
    pub launch_component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct AppLauncher {
    registry: Arc<dyn Registry>,
    host: Arc<dyn ActivityHost>,
    manager: Arc<FreezeManager>,
    verifier: LaunchVerifier,
    tables: Arc<LaunchTables>,
    settings: LaunchSettings,
    chain: Vec<Box<dyn LaunchStrategy>>,
    restricted_chain: Vec<Box<dyn LaunchStrategy>>,
}

impl AppLauncher {
    pub fn new(
        registry: Arc<dyn Registry>,
        capability: Arc<dyn PrivilegedCapability>,
        host: Arc<dyn ActivityHost>,
        manager: Arc<FreezeManager>,
        tables: LaunchTables,
        settings: LaunchSettings,
    ) -> Self {
        let verifier = LaunchVerifier::new(capability, Arc::clone(&host), settings.verifier);
        Self {
            registry,
            host,
            manager,
            verifier,
            tables: Arc::new(tables),
            settings,
            chain: default_chain(),
            restricted_chain: restricted_chain(),
        }
    }

    /// Replace the normal-context chain.
    #[must_use]
    pub fn with_chain(mut self, chain: Vec<Box<dyn LaunchStrategy>>) -> Self {
        self.chain = chain;
        self
    }

    #[must_use]
    pub fn with_restricted_chain(mut self, chain: Vec<Box<dyn LaunchStrategy>>) -> Self {
        self.restricted_chain = chain;
        self
    }

    pub async fn launch(&self, unit: &UnitId) -> bool {
        self.launch_detailed(unit).await.success
    }

    pub async fn launch_detailed(&self, unit: &UnitId) -> LaunchResult {
        let Some(entry) = self.precheck(unit).await else {
            return LaunchResult::failed();
        };

        let context = match self.host.execution_context().await {
            Ok(context) => context,
            Err(e) => {
                debug!(unit = %unit, "Execution context unavailable, assuming normal: {e}");
                ExecutionContext::Normal
            }
        };
        let chain = if context.is_restricted() {
            info!(unit = %unit, "Lock-task mode active, using restricted chain");
            &self.restricted_chain
        } else {
            &self.chain
        };

        let mut ctx = LaunchCtx::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.host),
            Arc::clone(&self.tables),
            context,
            entry,
            self.settings.self_unit.clone(),
            self.settings.wake_delay,
        );

        let mut attempts: Vec<LaunchAttempt> = Vec::with_capacity(chain.len());
        for strategy in chain {
            let id = strategy.id();
            let outcome = match strategy.attempt(unit, &mut ctx).await {
                Ok(false) => AttemptOutcome::NotApplicable,
                Ok(true) => match self.verifier.check(unit, context).await {
                    Verification::Confirmed(check) => {
                        debug!(unit = %unit, strategy = %id, ?check, "Launch observed");
                        AttemptOutcome::Verified
                    }
                    Verification::Inconclusive => AttemptOutcome::Assumed,
                    Verification::Refuted => {
                        debug!(unit = %unit, strategy = %id, "Start accepted but launch not observed");
                        AttemptOutcome::Unverified
                    }
                },
                Err(e) => {
                    debug!(unit = %unit, strategy = %id, "Strategy failed: {e}");
                    AttemptOutcome::Failed(e.to_string())
                }
            };
            let launched = matches!(outcome, AttemptOutcome::Verified | AttemptOutcome::Assumed);
            let verified = outcome == AttemptOutcome::Verified;
            attempts.push(LaunchAttempt {
                strategy: id,
                outcome,
                at: Utc::now(),
            });
            if launched {
                info!(
                    unit = %unit,
                    strategy = %id,
                    verified,
                    attempts = attempts.len(),
                    "Launched unit"
                );
                return LaunchResult::succeeded(id, verified);
            }
        }

        warn!(unit = %unit, attempts = attempts.len(), "Every launch strategy failed");
        for attempt in &attempts {
            debug!(
                unit = %unit,
                strategy = %attempt.strategy,
                at = %attempt.at,
                outcome = ?attempt.outcome,
                "Launch attempt"
            );
        }
        let info = self.launch_info(unit).await;
        warn!(
            unit = %unit,
            installed = info.installed,
            hidden = info.hidden,
            can_launch = info.can_launch,
            entry_points = info.entry_points.len(),
            launch_component = ?info.launch_component,
            "Launch diagnostics"
        );
        LaunchResult::failed()
    }

    /// Installed, enabled, and neither OS-hidden nor in the ledger.
    async fn precheck(&self, unit: &UnitId) -> Option<RegistryEntry> {
        let entry = match self.registry.get_entry(unit).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                info!(unit = %unit, "Cannot launch: not installed");
                return None;
            }
            Err(e) => {
                warn!(unit = %unit, "Cannot launch: registry lookup failed: {e}");
                return None;
            }
        };

        match self.registry.is_enabled(unit).await {
            Ok(true) => {}
            Ok(false) => {
                info!(unit = %unit, "Cannot launch: disabled");
                return None;
            }
            Err(e) => {
                warn!(unit = %unit, "Cannot launch: enabled check failed: {e}");
                return None;
            }
        }

        if entry.hidden || self.manager.is_suspended(unit) {
            info!(unit = %unit, "Cannot launch: suspended");
            return None;
        }
        Some(entry)
    }

    pub async fn launch_info(&self, unit: &UnitId) -> LaunchInfo {
        let entry = match self.registry.get_entry(unit).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return LaunchInfo::default(),
            Err(e) => {
                return LaunchInfo {
                    error: Some(e.to_string()),
                    ..LaunchInfo::default()
                };
            }
        };

        let mut info = LaunchInfo {
            installed: true,
            enabled: entry.enabled,
            hidden: entry.hidden,
            suspended: self.manager.is_suspended(unit),
            launch_component: entry.launch_entry.clone(),
            ..LaunchInfo::default()
        };

        let mut has_launcher_entry = false;
        match self.registry.entry_points(unit).await {
            Ok(points) => {
                has_launcher_entry = launcher_entries(&points).next().is_some();
                info.entry_points = points.into_iter().map(|ep| ep.class_name).collect();
            }
            Err(e) => info.error = Some(e.to_string()),
        }

        info.can_launch = info.enabled
            && !info.hidden
            && !info.suspended
            && (info.launch_component.is_some() || has_launcher_entry);
        info
    }

    /// Carry out a remediation that maps to a host action.
    ///
    /// Returns `false` for manual remediations and when every start request
    /// was rejected.
    pub async fn attempt_remediation(&self, unit: &UnitId, remediation: &Remediation) -> bool {
        let intents = match &remediation.action {
            RemediationAction::OpenStoreListing => vec![
                LaunchIntent::uri(format!("{MARKET_DETAILS_URI}{unit}"), None),
                LaunchIntent::uri(format!("{WEB_STORE_URI}{unit}"), None),
            ],
            RemediationAction::OpenUri(uri) => vec![LaunchIntent::uri(uri.as_str(), None)],
            RemediationAction::OpenAppSettings => vec![
                LaunchIntent::uri(format!("package:{unit}"), None)
                    .with_action(ACTION_APPLICATION_DETAILS_SETTINGS),
            ],
            RemediationAction::DialCode(code) => vec![
                LaunchIntent::uri(format!("tel:{}", encode_dial_code(code)), None)
                    .with_action(ACTION_CALL),
            ],
            RemediationAction::LaunchAlternative(alternative) => {
                info!(unit = %unit, alternative = %alternative, "Launching alternative unit");
                return self.launch(alternative).await;
            }
            action => {
                debug!(unit = %unit, ?action, "Remediation needs the user");
                return false;
            }
        };

        for intent in intents {
            let intent = intent.with_flags(&[LaunchFlag::NewTask]);
            match self.host.start_activity(&intent).await {
                Ok(()) => {
                    info!(unit = %unit, remediation = %remediation.title, "Remediation started");
                    return true;
                }
                Err(e) => debug!(unit = %unit, intent = %intent, "Remediation start rejected: {e}"),
            }
        }
        warn!(unit = %unit, remediation = %remediation.title, "Remediation failed");
        false
    }
}

fn encode_dial_code(code: &str) -> String {
    code.replace('#', "%23")
}
