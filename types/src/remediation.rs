//! Troubleshooting verdicts and the remediations they propose.

use serde::{Deserialize, Serialize};

use crate::UnitId;

/// What a remediation does when executed.
///
/// Host actions can be carried out by the launcher; the rest are manual steps
/// for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    ClearCache,
    ClearData,
    ForceStop,
    CheckPermissions,
    Reinstall,
    UpdateApp,
    RestartDevice,
    /// Free-form instructions in the remediation's detail text.
    Manual,
    OpenStoreListing,
    OpenAppSettings,
    OpenUri(String),
    /// Dial a USSD/service code, e.g. `*786#`.
    DialCode(String),
    LaunchAlternative(UnitId),
}

impl RemediationAction {
    /// Whether the launcher can execute this action itself.
    #[must_use]
    pub const fn is_host_action(&self) -> bool {
        matches!(
            self,
            Self::OpenStoreListing
                | Self::OpenAppSettings
                | Self::OpenUri(_)
                | Self::DialCode(_)
                | Self::LaunchAlternative(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    pub title: String,
    #[serde(default)]
    pub detail: String,
    pub action: RemediationAction,
}

impl Remediation {
    pub fn new(title: impl Into<String>, detail: impl Into<String>, action: RemediationAction) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            action,
        }
    }
}

/// Classification of why a unit cannot be started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TroubleshootResult {
    NotInstalled,
    Suspended,
    NoResolvableEntryPoint { alternatives: Vec<Remediation> },
    LaunchFailedWithCandidates { remediations: Vec<Remediation> },
}

impl TroubleshootResult {
    #[must_use]
    pub fn remediations(&self) -> &[Remediation] {
        match self {
            Self::NotInstalled | Self::Suspended => &[],
            Self::NoResolvableEntryPoint { alternatives } => alternatives,
            Self::LaunchFailedWithCandidates { remediations } => remediations,
        }
    }
}
