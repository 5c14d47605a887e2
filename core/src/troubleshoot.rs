//! Troubleshoot advisor.
//!
//! Classifies why a unit cannot be started and proposes remediations. It
//! only reads state; carrying out a remediation goes through the launcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use deepfreeze_config::TroubleshootConfig;
use deepfreeze_types::{Remediation, RemediationAction, TroubleshootResult, UnitId};
use tracing::{debug, info, warn};

use crate::launch::AppLauncher;

const JAZZCASH_UNIT: &str = "com.techlogix.mobilinkcustomer";
const ISLAM360_UNIT: &str = "com.islam360";
const EASYPAISA_UNIT: &str = "com.telenor.phoenix.pk";
const QURAN_UNIT: &str = "com.quran.labs.androidquran";

fn remediation(title: &str, detail: &str, action: RemediationAction) -> Remediation {
    Remediation::new(title, detail, action)
}

/// Fallback when no per-unit remediation list exists.
#[must_use]
pub fn generic_remediations() -> Vec<Remediation> {
    vec![
        remediation(
            "Clear app cache",
            "Settings > Apps > [App] > Storage > Clear Cache",
            RemediationAction::ClearCache,
        ),
        remediation(
            "Force stop app",
            "Settings > Apps > [App] > Force Stop",
            RemediationAction::ForceStop,
        ),
        remediation(
            "Check permissions",
            "Ensure all required permissions are granted",
            RemediationAction::CheckPermissions,
        ),
        remediation(
            "Reinstall app",
            "Uninstall and reinstall from Play Store",
            RemediationAction::Reinstall,
        ),
    ]
}

/// Fallback when no per-unit alternative list exists.
#[must_use]
pub fn generic_alternatives() -> Vec<Remediation> {
    vec![
        remediation(
            "Open via Play Store",
            "Open the store listing",
            RemediationAction::OpenStoreListing,
        ),
        remediation(
            "Check app info",
            "Open app info in settings",
            RemediationAction::OpenAppSettings,
        ),
        remediation(
            "Restart device",
            "Some apps require restart after installation",
            RemediationAction::RestartDevice,
        ),
    ]
}

/// Per-unit remediation and alternative lists.
#[derive(Debug, Clone, Default)]
pub struct RemediationTable {
    remediations: BTreeMap<UnitId, Vec<Remediation>>,
    alternatives: BTreeMap<UnitId, Vec<Remediation>>,
}

impl RemediationTable {
    #[must_use]
    pub fn builtin() -> Self {
        let mut remediations = BTreeMap::new();
        remediations.insert(
            UnitId::from_static(JAZZCASH_UNIT),
            vec![
                remediation(
                    "Clear app cache",
                    "Go to Settings > Apps > JazzCash > Storage > Clear Cache",
                    RemediationAction::ClearCache,
                ),
                remediation(
                    "Reset app preferences",
                    "Settings > Apps > Reset app preferences",
                    RemediationAction::Manual,
                ),
                remediation(
                    "Check app permissions",
                    "Ensure all permissions are granted",
                    RemediationAction::CheckPermissions,
                ),
                remediation(
                    "Update the app",
                    "Check Play Store for updates",
                    RemediationAction::UpdateApp,
                ),
                remediation(
                    "Reinstall app",
                    "Uninstall and reinstall from Play Store",
                    RemediationAction::Reinstall,
                ),
            ],
        );
        remediations.insert(
            UnitId::from_static(ISLAM360_UNIT),
            vec![
                remediation(
                    "Force stop and restart",
                    "Settings > Apps > Islam360 > Force Stop, then try again",
                    RemediationAction::ForceStop,
                ),
                remediation(
                    "Check storage space",
                    "Ensure device has enough storage",
                    RemediationAction::Manual,
                ),
                remediation(
                    "Clear app data",
                    "Settings > Apps > Islam360 > Storage > Clear Data",
                    RemediationAction::ClearData,
                ),
                remediation(
                    "Disable battery optimization",
                    "Settings > Battery > App optimization",
                    RemediationAction::Manual,
                ),
            ],
        );

        let mut alternatives = BTreeMap::new();
        alternatives.insert(
            UnitId::from_static(JAZZCASH_UNIT),
            vec![
                remediation(
                    "Try opening via web",
                    "https://jazzcash.com.pk",
                    RemediationAction::OpenUri("https://jazzcash.com.pk".to_string()),
                ),
                remediation(
                    "Check if JazzCash is updated",
                    "Update from Play Store",
                    RemediationAction::OpenStoreListing,
                ),
                remediation(
                    "Use USSD code",
                    "*786#",
                    RemediationAction::DialCode("*786#".to_string()),
                ),
            ],
        );
        alternatives.insert(
            UnitId::from_static(ISLAM360_UNIT),
            vec![
                remediation(
                    "Try web version",
                    "https://islam360.com",
                    RemediationAction::OpenUri("https://islam360.com".to_string()),
                ),
                remediation(
                    "Alternative Quran app",
                    QURAN_UNIT,
                    RemediationAction::LaunchAlternative(UnitId::from_static(QURAN_UNIT)),
                ),
                remediation(
                    "Check app permissions",
                    "Enable all required permissions",
                    RemediationAction::CheckPermissions,
                ),
            ],
        );
        alternatives.insert(
            UnitId::from_static(EASYPAISA_UNIT),
            vec![
                remediation(
                    "Try Easypaisa web",
                    "https://easypaisa.com.pk",
                    RemediationAction::OpenUri("https://easypaisa.com.pk".to_string()),
                ),
                remediation(
                    "Use USSD code",
                    "*786*1#",
                    RemediationAction::DialCode("*786*1#".to_string()),
                ),
            ],
        );

        Self {
            remediations,
            alternatives,
        }
    }

    /// Config lists replace built-in lists for the same unit.
    #[must_use]
    pub fn with_config(mut self, config: &TroubleshootConfig) -> Self {
        for (unit, list) in &config.remediations {
            self.remediations.insert(unit.clone(), list.clone());
        }
        for (unit, list) in &config.alternatives {
            self.alternatives.insert(unit.clone(), list.clone());
        }
        self
    }

    #[must_use]
    pub fn remediations(&self, unit: &UnitId) -> Vec<Remediation> {
        self.remediations
            .get(unit)
            .cloned()
            .unwrap_or_else(generic_remediations)
    }

    #[must_use]
    pub fn alternatives(&self, unit: &UnitId) -> Vec<Remediation> {
        self.alternatives
            .get(unit)
            .cloned()
            .unwrap_or_else(generic_alternatives)
    }
}

pub struct Troubleshooter {
    launcher: Arc<AppLauncher>,
    table: RemediationTable,
}

impl Troubleshooter {
    pub fn new(launcher: Arc<AppLauncher>, table: RemediationTable) -> Self {
        Self { launcher, table }
    }

    pub async fn classify(&self, unit: &UnitId) -> TroubleshootResult {
        let info = self.launcher.launch_info(unit).await;
        if let Some(error) = &info.error {
            warn!(unit = %unit, "Troubleshooting with incomplete registry data: {error}");
        }

        let result = if !info.installed || !info.enabled {
            TroubleshootResult::NotInstalled
        } else if info.hidden || info.suspended {
            TroubleshootResult::Suspended
        } else if !info.can_launch {
            TroubleshootResult::NoResolvableEntryPoint {
                alternatives: self.table.alternatives(unit),
            }
        } else {
            TroubleshootResult::LaunchFailedWithCandidates {
                remediations: self.table.remediations(unit),
            }
        };
        debug!(unit = %unit, ?result, "Classified launch failure");
        result
    }

    /// Try the unit's host-executable alternatives, store listing first.
    pub async fn attempt_alternative_launch(&self, unit: &UnitId) -> bool {
        let store = remediation(
            "Open via Play Store",
            "",
            RemediationAction::OpenStoreListing,
        );
        let mut plan = vec![store];
        plan.extend(self.table.alternatives(unit).into_iter().filter(|alt| {
            alt.action.is_host_action() && alt.action != RemediationAction::OpenStoreListing
        }));

        for alternative in &plan {
            if self.launcher.attempt_remediation(unit, alternative).await {
                info!(unit = %unit, alternative = %alternative.title, "Alternative launch succeeded");
                return true;
            }
        }
        warn!(unit = %unit, tried = plan.len(), "No alternative launch worked");
        false
    }
}
