//! Shell command lines for the device backend.

use deepfreeze_types::{ExtraValue, IntentTarget, LaunchIntent, UnitId};

use crate::runner::shell_quote;

pub const ACTION_MAIN: &str = deepfreeze_types::intent::ACTION_MAIN;
pub const CATEGORY_LAUNCHER: &str = deepfreeze_types::intent::CATEGORY_LAUNCHER;
pub const CATEGORY_HOME: &str = deepfreeze_types::intent::CATEGORY_HOME;

/// `am` intent arguments: `-a`, `-c`, `-d`, `-t`, `-n`/`-p`, `-f`, extras.
#[must_use]
pub fn intent_args(intent: &LaunchIntent) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut push = |flag: &str, value: &str| {
        args.push(flag.to_string());
        args.push(value.to_string());
    };

    if let Some(action) = &intent.action {
        push("-a", action);
    }
    for category in &intent.categories {
        push("-c", category);
    }
    match &intent.target {
        IntentTarget::Uri { uri, unit } => {
            push("-d", uri);
            if let Some(unit) = unit {
                push("-p", unit.as_str());
            }
        }
        IntentTarget::Component { unit, class_name } => {
            if let Some(data) = &intent.data {
                push("-d", data);
            }
            push("-n", &format!("{unit}/{class_name}"));
        }
        IntentTarget::Package(unit) => {
            if let Some(data) = &intent.data {
                push("-d", data);
            }
            push("-p", unit.as_str());
        }
    }
    if let Some(mime_type) = &intent.mime_type {
        push("-t", mime_type);
    }
    if !intent.flags.is_empty() {
        push("-f", &format!("0x{:x}", intent.flag_bits()));
    }
    for (key, value) in &intent.extras {
        match value {
            ExtraValue::Str(s) => {
                args.push("--es".to_string());
                args.push(key.clone());
                args.push(s.clone());
            }
            ExtraValue::Bool(b) => {
                args.push("--ez".to_string());
                args.push(key.clone());
                args.push(b.to_string());
            }
        }
    }
    args
}

fn join(words: impl IntoIterator<Item = String>) -> String {
    words
        .into_iter()
        .map(|w| shell_quote(&w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn am_start(intent: &LaunchIntent) -> String {
    format!("am start -W {}", join(intent_args(intent)))
}

#[must_use]
pub fn am_broadcast(intent: &LaunchIntent) -> String {
    format!("am broadcast {}", join(intent_args(intent)))
}

#[must_use]
pub fn pm_set_suspended(unit: &UnitId, suspended: bool) -> String {
    let verb = if suspended { "suspend" } else { "unsuspend" };
    format!("pm {verb} {}", shell_quote(unit.as_str()))
}

#[must_use]
pub fn force_stop(unit: &UnitId) -> String {
    format!("am force-stop {}", shell_quote(unit.as_str()))
}

#[must_use]
pub fn dump_package(unit: &UnitId) -> String {
    format!("dumpsys package {}", shell_quote(unit.as_str()))
}

#[must_use]
pub fn query_launcher_activities(unit: &UnitId) -> String {
    format!(
        "cmd package query-activities --brief -a {ACTION_MAIN} -c {CATEGORY_LAUNCHER} {}",
        shell_quote(unit.as_str())
    )
}

#[must_use]
pub fn resolve_launcher_activity(unit: &UnitId) -> String {
    format!(
        "cmd package resolve-activity --brief -a {ACTION_MAIN} -c {CATEGORY_LAUNCHER} {}",
        shell_quote(unit.as_str())
    )
}

#[must_use]
pub fn resolve_home_activity() -> String {
    format!("cmd package resolve-activity --brief -a {ACTION_MAIN} -c {CATEGORY_HOME}")
}

pub const LIST_PACKAGES: &str = "pm list packages";
pub const LIST_DISABLED_PACKAGES: &str = "pm list packages -d";
pub const LIST_SYSTEM_PACKAGES: &str = "pm list packages -s";
pub const CURRENT_UID: &str = "id -u";
pub const LIST_PROCESSES: &str = "ps -A -o NAME";
/// Older toolboxes lack `-A`; this only lists the caller's own processes.
pub const LIST_PROCESSES_FALLBACK: &str = "ps -o NAME";
pub const DUMP_RECENTS: &str = "dumpsys activity recents";
pub const DUMP_ACTIVITIES: &str = "dumpsys activity activities";
