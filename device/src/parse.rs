//! Parsers for `pm`, `cmd package`, `ps`, `am` and `dumpsys` output.
//!
//! All functions are pure so they can be tested against captured output.

use deepfreeze_types::{EntryPoint, ExecutionContext, RunningSet, TaskInfo, UnitId};

/// `pm list packages` lines look like `package:com.example.app`.
#[must_use]
pub fn parse_package_list(output: &str) -> Vec<UnitId> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .filter_map(|unit| UnitId::new(unit).ok())
        .collect()
}

/// The parts of `dumpsys package <unit>` we care about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageDump {
    pub installed: bool,
    pub enabled: bool,
    pub hidden: bool,
    pub suspended: bool,
    pub system: bool,
    /// Activities with at least one intent filter, in resolver-table order.
    pub activities: Vec<String>,
}

/// Parse `dumpsys package <unit>`.
///
/// Returns `None` when the dump has no `Package [<unit>]` section.
#[must_use]
pub fn parse_package_dump(unit: &UnitId, output: &str) -> Option<PackageDump> {
    let header = format!("Package [{unit}]");
    let package_section = output.find(&header)?;

    let mut dump = PackageDump {
        installed: true,
        enabled: true,
        ..PackageDump::default()
    };

    for line in output[package_section..].lines() {
        let line = line.trim();
        if line.starts_with("pkgFlags=") && line.contains(" SYSTEM ") {
            dump.system = true;
        }
        // Only the first user's state line counts.
        if line.starts_with("User 0:") {
            for field in line.split_whitespace() {
                match field.split_once('=') {
                    Some(("installed", v)) => dump.installed = v == "true",
                    Some(("hidden", v)) => dump.hidden = v == "true",
                    Some(("suspended", v)) => dump.suspended = v == "true",
                    // 2, 3 and 4 are the disabled states.
                    Some(("enabled", v)) => dump.enabled = !matches!(v, "2" | "3" | "4"),
                    _ => {}
                }
            }
            break;
        }
    }

    let prefix = format!("{unit}/");
    for line in output[..package_section].lines() {
        let mut parts = line.split_whitespace();
        let (Some(_hash), Some(component), Some("filter")) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if let Some(class_name) = component.strip_prefix(&prefix) {
            let class_name = EntryPoint::qualify(unit, class_name);
            if !dump.activities.contains(&class_name) {
                dump.activities.push(class_name);
            }
        }
    }

    Some(dump)
}

/// `cmd package query-activities --brief` output: a `priority=` line followed
/// by a `unit/class` line per activity.
#[must_use]
pub fn parse_launcher_activities(unit: &UnitId, output: &str) -> Vec<EntryPoint> {
    let mut out = Vec::new();
    let mut priority = 0;
    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("priority=") {
            priority = rest
                .split_whitespace()
                .next()
                .and_then(|p| p.parse().ok())
                .unwrap_or(0);
        } else if let Some((owner, class_name)) = parse_component(line)
            && owner == *unit
        {
            out.push(EntryPoint::new(class_name).launcher(priority));
            priority = 0;
        }
    }
    out
}

/// Merge launcher activities with every filtered activity from the package
/// dump. Launcher entries keep their priority and come first.
#[must_use]
pub fn merge_entry_points(launchers: Vec<EntryPoint>, activities: &[String]) -> Vec<EntryPoint> {
    let mut out = launchers;
    for class_name in activities {
        if !out.iter().any(|ep| ep.class_name == *class_name) {
            // Intent filters imply export unless the manifest says otherwise.
            out.push(EntryPoint::new(class_name.as_str()).exported());
        }
    }
    out
}

/// Split `com.example/.Main` into `(com.example, com.example.Main)`.
#[must_use]
pub fn parse_component(text: &str) -> Option<(UnitId, String)> {
    let text = text.trim().trim_start_matches('{').trim_end_matches('}');
    let (unit, class_name) = text.split_once('/')?;
    if unit.is_empty() || class_name.is_empty() || unit.contains(char::is_whitespace) {
        return None;
    }
    let class_name = class_name.split_whitespace().next()?;
    let unit = UnitId::new(unit).ok()?;
    let class_name = EntryPoint::qualify(&unit, class_name);
    Some((unit, class_name))
}

/// `cmd package resolve-activity --brief` prints a priority line then the
/// component, or `No activity found`.
#[must_use]
pub fn parse_resolved_activity(output: &str) -> Option<(UnitId, String)> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(parse_component)
}

/// `ps -A -o NAME`. Kernel threads and bare binaries are skipped.
#[must_use]
pub fn parse_process_names(output: &str) -> RunningSet {
    let names = output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| !name.starts_with('[') && !name.starts_with('/'))
        .filter(|name| name.contains('.'));
    RunningSet::from_process_names(names)
}

/// `id -u`; root and shell may call `pm suspend`.
#[must_use]
pub fn parse_uid_is_privileged(output: &str) -> bool {
    matches!(output.trim().parse::<u32>(), Ok(0 | 2000))
}

/// `pm suspend` prints `Package <unit> new suspended state: <bool>`.
#[must_use]
pub fn parse_suspend_state(output: &str) -> Option<bool> {
    output
        .lines()
        .find_map(|line| line.split_once("new suspended state:"))
        .and_then(|(_, state)| state.trim().parse().ok())
}

/// `am start` reports failures in its output with exit status zero.
#[must_use]
pub fn am_start_failure(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| {
            line.starts_with("Error:")
                || line.starts_with("Error type")
                || line.contains("Exception")
                || line.starts_with("Warning: Activity not started")
        })
        .map(str::to_string)
}

/// `dumpsys activity recents`, most recent first.
#[must_use]
pub fn parse_recent_tasks(output: &str, limit: usize) -> Vec<TaskInfo> {
    let mut tasks: Vec<TaskInfo> = Vec::new();
    for line in output.lines().map(str::trim) {
        if line.starts_with("* Recent #") {
            if tasks.len() == limit {
                break;
            }
            let task_id = line
                .split_once("Task{")
                .and_then(|(_, rest)| rest.split_once('#'))
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .and_then(|id| id.parse().ok());
            if let Some(task_id) = task_id {
                tasks.push(TaskInfo {
                    task_id,
                    base_unit: None,
                    top_unit: None,
                });
            }
        } else if let Some(task) = tasks.last_mut() {
            if let Some(rest) = line.strip_prefix("realActivity=") {
                task.base_unit = parse_component(rest).map(|(unit, _)| unit);
            } else if let Some(rest) = line.strip_prefix("topActivity=") {
                task.top_unit = parse_component(rest).map(|(unit, _)| unit);
            }
        }
    }
    tasks
}

/// `ActivityRecord{8f1c2d u0 com.example/.Main t42}` → `com.example`.
fn activity_record_unit(text: &str) -> Option<UnitId> {
    let (_, record) = text.split_once("ActivityRecord{")?;
    record
        .split_whitespace()
        .find(|token| token.contains('/'))
        .and_then(parse_component)
        .map(|(unit, _)| unit)
}

/// Resumed activity's unit from `dumpsys activity activities`.
#[must_use]
pub fn parse_foreground_unit(output: &str) -> Option<UnitId> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with("mResumedActivity")
                || line.starts_with("topResumedActivity")
                || line.starts_with("ResumedActivity")
        })
        .find_map(activity_record_unit)
}

/// `mLockTaskModeState=LOCKED|PINNED|NONE` from `dumpsys activity activities`.
#[must_use]
pub fn parse_lock_task_state(output: &str) -> ExecutionContext {
    let state = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("mLockTaskModeState="))
        .map(str::trim);
    match state {
        Some("LOCKED" | "PINNED") => ExecutionContext::Restricted,
        _ => ExecutionContext::Normal,
    }
}
