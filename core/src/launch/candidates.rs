//! Entry-point heuristics.
//!
//! Pure functions over registry metadata. Each returns candidates in the order
//! the corresponding strategy should try them.

use deepfreeze_types::{EntryPoint, UnitId};

/// Name fragments that usually mark the first screen of an app, best first.
pub const PRIORITY_PATTERNS: &[&str] = &[
    "SplashActivity",
    "LauncherActivity",
    "MainActivity",
    "HomeActivity",
    "WelcomeActivity",
    "StartActivity",
];

/// Component names apps commonly use, relative to the unit id.
pub const CONVENTIONAL_SUFFIXES: &[&str] = &[
    ".MainActivity",
    ".ui.MainActivity",
    ".activities.MainActivity",
    ".LauncherActivity",
    ".SplashActivity",
    ".HomeActivity",
    ".activity.MainActivity",
    ".main.MainActivity",
];

const BRUTE_FORCE_HINTS: &[&str] = &["main", "launch", "splash"];

const RESTRICTED_HINTS: &[&str] = &["mainactivity", "launcheractivity", "splashactivity"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub class_name: String,
    /// The priority pattern this candidate matched, if any.
    pub pattern: Option<&'static str>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

/// Priority-pattern matches first (one per pattern, first match wins), then
/// every remaining entry point in declaration order.
#[must_use]
pub fn priority_candidates(entry_points: &[EntryPoint]) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();
    for &pattern in PRIORITY_PATTERNS {
        if let Some(ep) = entry_points
            .iter()
            .find(|ep| contains_ignore_case(&ep.class_name, pattern))
            && !out.iter().any(|c| c.class_name == ep.class_name)
        {
            out.push(Candidate {
                class_name: ep.class_name.clone(),
                pattern: Some(pattern),
            });
        }
    }
    for ep in entry_points {
        if !out.iter().any(|c| c.class_name == ep.class_name) {
            out.push(Candidate {
                class_name: ep.class_name.clone(),
                pattern: None,
            });
        }
    }
    out
}

/// `unit + suffix` for every conventional suffix.
#[must_use]
pub fn conventional_components(unit: &UnitId) -> Vec<String> {
    CONVENTIONAL_SUFFIXES
        .iter()
        .map(|suffix| format!("{unit}{suffix}"))
        .collect()
}

/// Launcher-category entry points in declaration order.
pub fn launcher_entries(entry_points: &[EntryPoint]) -> impl Iterator<Item = &EntryPoint> {
    entry_points.iter().filter(|ep| ep.launcher)
}

/// The launcher entry point with the highest resolver priority; ties go to
/// the one declared first.
#[must_use]
pub fn highest_priority_launcher(entry_points: &[EntryPoint]) -> Option<&EntryPoint> {
    launcher_entries(entry_points).fold(None, |best: Option<&EntryPoint>, ep| match best {
        Some(b) if b.priority >= ep.priority => Some(b),
        _ => Some(ep),
    })
}

/// Exported or name-matching entry points not already tried in this launch.
#[must_use]
pub fn brute_force_candidates<'a>(
    entry_points: &'a [EntryPoint],
    already_tried: impl Fn(&str) -> bool,
) -> Vec<&'a EntryPoint> {
    entry_points
        .iter()
        .filter(|ep| {
            ep.exported
                || BRUTE_FORCE_HINTS
                    .iter()
                    .any(|hint| contains_ignore_case(&ep.class_name, hint))
        })
        .filter(|ep| !already_tried(&ep.class_name))
        .collect()
}

/// Exported entry points whose names look like a first screen. Used when the
/// device is in lock-task mode and only well-known screens are worth a try.
#[must_use]
pub fn restricted_candidates(entry_points: &[EntryPoint]) -> Vec<&EntryPoint> {
    entry_points
        .iter()
        .filter(|ep| ep.exported)
        .filter(|ep| {
            RESTRICTED_HINTS
                .iter()
                .any(|hint| contains_ignore_case(&ep.class_name, hint))
        })
        .collect()
}
