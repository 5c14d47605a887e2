//! Launch requests handed to the activity host.
//!
//! A [`LaunchIntent`] is the platform-neutral description of "start this
//! unit": which component (or package-scoped action, or URI) to address and
//! which task flags to apply. Strategies build intents; the host executes them.

use std::fmt;

use crate::UnitId;

pub const ACTION_MAIN: &str = "android.intent.action.MAIN";
pub const ACTION_VIEW: &str = "android.intent.action.VIEW";
pub const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";
pub const CATEGORY_HOME: &str = "android.intent.category.HOME";
pub const EXTRA_REFERRER: &str = "android.intent.extra.REFERRER";

/// Task flags a launch request may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LaunchFlag {
    NewTask,
    ClearTask,
    ClearTop,
    ResetTaskIfNeeded,
    SingleTop,
    ReorderToFront,
    MultipleTask,
}

impl LaunchFlag {
    /// Flags the OS rejects while the device is confined to lock-task mode.
    #[must_use]
    pub const fn rejected_in_restricted_context(self) -> bool {
        matches!(self, Self::ClearTask | Self::ClearTop)
    }

    /// Platform bit value, as accepted by `am start -f`.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::NewTask => 0x1000_0000,
            Self::ClearTask => 0x0000_8000,
            Self::ClearTop => 0x0400_0000,
            Self::ResetTaskIfNeeded => 0x0020_0000,
            Self::SingleTop => 0x2000_0000,
            Self::ReorderToFront => 0x0002_0000,
            Self::MultipleTask => 0x0800_0000,
        }
    }
}

/// What a launch request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentTarget {
    /// An explicit component: `unit/class`.
    Component { unit: UnitId, class_name: String },
    /// Any component of `unit` that handles the intent's action/categories.
    Package(UnitId),
    /// A URI, optionally pinned to one unit.
    Uri { uri: String, unit: Option<UnitId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraValue {
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchIntent {
    pub target: IntentTarget,
    pub action: Option<String>,
    pub categories: Vec<String>,
    pub mime_type: Option<String>,
    pub data: Option<String>,
    pub flags: Vec<LaunchFlag>,
    pub extras: Vec<(String, ExtraValue)>,
}

impl LaunchIntent {
    #[must_use]
    pub fn component(unit: &UnitId, class_name: impl Into<String>) -> Self {
        Self::new(IntentTarget::Component {
            unit: unit.clone(),
            class_name: class_name.into(),
        })
    }

    #[must_use]
    pub fn package(unit: &UnitId) -> Self {
        Self::new(IntentTarget::Package(unit.clone()))
    }

    #[must_use]
    pub fn uri(uri: impl Into<String>, unit: Option<&UnitId>) -> Self {
        Self::new(IntentTarget::Uri {
            uri: uri.into(),
            unit: unit.cloned(),
        })
        .with_action(ACTION_VIEW)
    }

    fn new(target: IntentTarget) -> Self {
        Self {
            target,
            action: None,
            categories: Vec::new(),
            mime_type: None,
            data: None,
            flags: Vec::new(),
            extras: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// `ACTION_MAIN` + `CATEGORY_LAUNCHER`, what a home screen sends on tap.
    pub fn as_launcher_tap(self) -> Self {
        self.with_action(ACTION_MAIN).with_category(CATEGORY_LAUNCHER)
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_flags(mut self, flags: &[LaunchFlag]) -> Self {
        for flag in flags {
            if !self.flags.contains(flag) {
                self.flags.push(*flag);
            }
        }
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: ExtraValue) -> Self {
        self.extras.push((key.into(), value));
        self
    }

    /// Drop flags that would make a lock-task launch fail outright.
    pub fn strip_restricted_flags(mut self) -> Self {
        self.flags.retain(|flag| !flag.rejected_in_restricted_context());
        self
    }

    #[must_use]
    pub fn has_flag(&self, flag: LaunchFlag) -> bool {
        self.flags.contains(&flag)
    }

    #[must_use]
    pub fn flag_bits(&self) -> u32 {
        self.flags.iter().fold(0, |acc, flag| acc | flag.bits())
    }
}

impl fmt::Display for LaunchIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            IntentTarget::Component { unit, class_name } => write!(f, "{unit}/{class_name}")?,
            IntentTarget::Package(unit) => write!(f, "{unit}")?,
            IntentTarget::Uri { uri, .. } => write!(f, "{uri}")?,
        }
        if let Some(action) = &self.action {
            write!(f, " act={action}")?;
        }
        if !self.flags.is_empty() {
            write!(f, " flg=0x{:x}", self.flag_bits())?;
        }
        Ok(())
    }
}
