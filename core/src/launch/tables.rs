//! Per-unit launch hints: deep-link schemes and OS default actions.

use std::collections::BTreeMap;

use deepfreeze_config::LaunchConfig;
use deepfreeze_types::UnitId;

pub const ACTION_INSERT: &str = "android.intent.action.INSERT";
pub const ACTION_CAMERA_BUTTON: &str = "android.intent.action.CAMERA_BUTTON";
pub const ACTION_IMAGE_CAPTURE: &str = "android.media.action.IMAGE_CAPTURE";
pub const ACTION_CALL_BUTTON: &str = "android.intent.action.CALL_BUTTON";
pub const ACTION_CALCULATOR: &str = "android.intent.action.CALCULATOR";
pub const ACTION_SETTINGS: &str = "android.settings.SETTINGS";
const EVENT_MIME_TYPE: &str = "vnd.android.cursor.dir/event";

const DEEP_LINKS: &[(&str, &[&str])] = &[
    ("com.techlogix.mobilinkcustomer", &["jazzcash://", "mobilink://"]),
    ("com.telenor.phoenix.pk", &["easypaisa://", "telenor://"]),
    ("pk.com.ubl.omni", &["ublomni://", "ubl://"]),
    ("com.habibbank.hbl", &["hbl://"]),
    ("com.islam360", &["islam360://", "quran://"]),
    ("com.islamicfinder.prayertimes", &["islamicfinder://"]),
    ("com.instagram.android", &["instagram://"]),
    ("com.facebook.katana", &["fb://", "facebook://"]),
    ("com.twitter.android", &["twitter://"]),
    ("com.snapchat.android", &["snapchat://"]),
    ("com.whatsapp", &["whatsapp://"]),
    ("com.tiktok", &["tiktok://", "musically://"]),
    ("com.spotify.music", &["spotify://"]),
    ("com.netflix.mediaclient", &["nflx://"]),
];

// Lock-task mode needs links that land on a concrete screen.
const RESTRICTED_DEEP_LINKS: &[(&str, &[&str])] = &[
    ("com.techlogix.mobilinkcustomer", &["jazzcash://main", "mobilink://app"]),
    ("com.islam360", &["islam360://main", "quran://home"]),
    ("com.openai.chatgpt", &["chatgpt://chat", "openai://app"]),
    ("com.deepseek.chat", &["deepseek://chat"]),
    ("com.instagram.android", &["instagram://camera"]),
    ("com.whatsapp", &["whatsapp://send"]),
    ("com.facebook.katana", &["fb://feed"]),
    ("com.twitter.android", &["twitter://timeline"]),
];

/// An OS default action that opens a unit without naming a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAction {
    pub action: String,
    pub data: Option<String>,
    pub mime_type: Option<String>,
}

impl SystemAction {
    fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            data: None,
            mime_type: None,
        }
    }

    fn with_data(mut self, data: &str) -> Self {
        self.data = Some(data.to_string());
        self
    }

    fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LaunchTables {
    deep_links: BTreeMap<UnitId, Vec<String>>,
    restricted_deep_links: BTreeMap<UnitId, Vec<String>>,
    system_actions: BTreeMap<UnitId, SystemAction>,
}

impl LaunchTables {
    #[must_use]
    pub fn builtin() -> Self {
        let view = deepfreeze_types::intent::ACTION_VIEW;
        let system_actions = [
            ("com.android.camera2", SystemAction::new(ACTION_CAMERA_BUTTON)),
            ("com.android.calculator2", SystemAction::new(ACTION_CALCULATOR)),
            (
                "com.android.calendar",
                SystemAction::new(ACTION_INSERT).with_mime_type(EVENT_MIME_TYPE),
            ),
            ("com.android.contacts", SystemAction::new(view)),
            ("com.android.settings", SystemAction::new(ACTION_SETTINGS)),
            (
                "com.android.chrome",
                SystemAction::new(view).with_data("https://www.google.com"),
            ),
            ("com.sec.android.app.camera", SystemAction::new(ACTION_IMAGE_CAPTURE)),
            (
                "com.samsung.android.calendar",
                SystemAction::new(ACTION_INSERT).with_mime_type(EVENT_MIME_TYPE),
            ),
            ("com.samsung.android.dialer", SystemAction::new(ACTION_CALL_BUTTON)),
            (
                "com.techlogix.mobilinkcustomer",
                SystemAction::new(view).with_data("https://jazzcash.com.pk"),
            ),
            ("com.telenor.phoenix.pk", SystemAction::new(view)),
        ]
        .into_iter()
        .map(|(unit, action)| (UnitId::from_static(unit), action))
        .collect();

        Self {
            deep_links: link_table(DEEP_LINKS),
            restricted_deep_links: link_table(RESTRICTED_DEEP_LINKS),
            system_actions,
        }
    }

    /// Built-in tables extended by config; config entries replace built-ins
    /// for the same unit.
    #[must_use]
    pub fn with_config(mut self, config: &LaunchConfig) -> Self {
        for (unit, links) in &config.deep_links {
            self.deep_links.insert(unit.clone(), links.clone());
        }
        for (unit, action) in &config.system_actions {
            self.system_actions.insert(
                unit.clone(),
                SystemAction {
                    action: action.action.clone(),
                    data: action.data.clone(),
                    mime_type: action.mime_type.clone(),
                },
            );
        }
        self
    }

    #[must_use]
    pub fn deep_links(&self, unit: &UnitId) -> &[String] {
        self.deep_links
            .get(unit)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Links for lock-task mode; falls back to the general table.
    #[must_use]
    pub fn restricted_deep_links(&self, unit: &UnitId) -> &[String] {
        self.restricted_deep_links
            .get(unit)
            .map_or_else(|| self.deep_links(unit), Vec::as_slice)
    }

    #[must_use]
    pub fn system_action(&self, unit: &UnitId) -> Option<&SystemAction> {
        self.system_actions.get(unit)
    }
}

fn link_table(entries: &[(&'static str, &[&str])]) -> BTreeMap<UnitId, Vec<String>> {
    entries
        .iter()
        .map(|(unit, links)| {
            (
                UnitId::from_static(*unit),
                links.iter().map(|l| (*l).to_string()).collect(),
            )
        })
        .collect()
}
