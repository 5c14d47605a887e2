//! Launch strategies.
//!
//! Each strategy turns registry metadata and lookup tables into one or more
//! start requests. `Ok(true)` means the host accepted a start and the
//! resolver should verify; `Ok(false)` means the strategy had nothing to try.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use deepfreeze_types::intent::{ACTION_MAIN, CATEGORY_LAUNCHER, EXTRA_REFERRER};
use deepfreeze_types::{
    EntryPoint, ExecutionContext, ExtraValue, HostError, IntentTarget, LaunchFlag, LaunchIntent,
    RegistryEntry, StrategyId, UnitId,
};
use tracing::debug;

use super::candidates::{
    brute_force_candidates, conventional_components, highest_priority_launcher, launcher_entries,
    priority_candidates, restricted_candidates,
};
use super::tables::LaunchTables;
use crate::StrategyError;
use crate::platform::{ActivityHost, PlatformFut, Registry};

pub type StrategyFut<'a> = PlatformFut<'a, Result<bool, StrategyError>>;

pub const ACTION_PACKAGE_REPLACED: &str = "android.intent.action.PACKAGE_REPLACED";
pub const EXTRA_FROM_LAUNCHER: &str = "from_launcher";
pub const EXTRA_LAUNCHED_FROM_LOCKSCREEN: &str = "launched_from_lockscreen";

// Lock-task task lookup looks a little further back than verification does.
const TASK_RESUME_SCAN_LIMIT: usize = 10;

pub trait LaunchStrategy: Send + Sync {
    fn id(&self) -> StrategyId;
    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a>;
}

/// Per-invocation state shared by the strategies of one `launch` call.
pub struct LaunchCtx {
    pub registry: Arc<dyn Registry>,
    pub host: Arc<dyn ActivityHost>,
    pub tables: Arc<LaunchTables>,
    pub context: ExecutionContext,
    /// Registry entry fetched by the resolver's pre-checks.
    pub entry: RegistryEntry,
    pub self_unit: UnitId,
    pub wake_delay: Duration,
    entry_points: Option<Vec<EntryPoint>>,
    tried_components: HashSet<String>,
}

impl LaunchCtx {
    pub fn new(
        registry: Arc<dyn Registry>,
        host: Arc<dyn ActivityHost>,
        tables: Arc<LaunchTables>,
        context: ExecutionContext,
        entry: RegistryEntry,
        self_unit: UnitId,
        wake_delay: Duration,
    ) -> Self {
        Self {
            registry,
            host,
            tables,
            context,
            entry,
            self_unit,
            wake_delay,
            entry_points: None,
            tried_components: HashSet::new(),
        }
    }

    /// Declared entry points, fetched once per launch.
    pub async fn entry_points(&mut self, unit: &UnitId) -> Result<Vec<EntryPoint>, StrategyError> {
        if let Some(points) = &self.entry_points {
            return Ok(points.clone());
        }
        let points = self.registry.entry_points(unit).await?;
        self.entry_points = Some(points.clone());
        Ok(points)
    }

    #[must_use]
    pub fn was_tried(&self, class_name: &str) -> bool {
        self.tried_components.contains(class_name)
    }

    fn referrer(&self) -> String {
        format!("android-app://{}", self.self_unit)
    }

    /// Hand one intent to the host, stripping lock-task-incompatible flags
    /// when the device is restricted.
    pub async fn start(&mut self, intent: LaunchIntent) -> Result<(), HostError> {
        let intent = if self.context.is_restricted() {
            intent.strip_restricted_flags()
        } else {
            intent
        };
        if let IntentTarget::Component { class_name, .. } = &intent.target {
            self.tried_components.insert(class_name.clone());
        }
        debug!(intent = %intent, "Starting activity");
        self.host.start_activity(&intent).await
    }

    /// Try intents in order until the host accepts one.
    pub async fn start_first(
        &mut self,
        unit: &UnitId,
        intents: impl IntoIterator<Item = LaunchIntent> + Send,
    ) -> Result<bool, StrategyError> {
        let mut last = None;
        for intent in intents {
            match self.start(intent).await {
                Ok(()) => return Ok(true),
                Err(e) => {
                    debug!(unit = %unit, "Start rejected: {e}");
                    last = Some(e);
                }
            }
        }
        match last {
            Some(last) => Err(StrategyError::Exhausted {
                unit: unit.clone(),
                last,
            }),
            None => Ok(false),
        }
    }
}

fn component_intent(unit: &UnitId, class_name: &str, flags: &[LaunchFlag]) -> LaunchIntent {
    LaunchIntent::component(unit, EntryPoint::qualify(unit, class_name)).with_flags(flags)
}

/// The registered launch entry point, as a home screen would start it.
pub struct DirectEntryPoint;

impl LaunchStrategy for DirectEntryPoint {
    fn id(&self) -> StrategyId {
        StrategyId::DirectEntryPoint
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let Some(class_name) = ctx.entry.launch_entry.clone() else {
                return Ok(false);
            };
            let intent =
                component_intent(unit, &class_name, &[LaunchFlag::NewTask]).as_launcher_tap();
            ctx.start_first(unit, [intent]).await
        })
    }
}

pub struct DeepLink;

impl LaunchStrategy for DeepLink {
    fn id(&self) -> StrategyId {
        StrategyId::DeepLink
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let intents: Vec<LaunchIntent> = ctx
                .tables
                .deep_links(unit)
                .iter()
                .map(|link| {
                    LaunchIntent::uri(link.as_str(), Some(unit))
                        .with_flags(&[LaunchFlag::NewTask, LaunchFlag::ClearTop])
                })
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

/// Every entry point answering `MAIN`/`LAUNCHER`, in resolver order.
pub struct LauncherQuery;

impl LaunchStrategy for LauncherQuery {
    fn id(&self) -> StrategyId {
        StrategyId::LauncherQuery
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let points = ctx.entry_points(unit).await?;
            let intents: Vec<LaunchIntent> = launcher_entries(&points)
                .map(|ep| {
                    component_intent(
                        unit,
                        &ep.class_name,
                        &[LaunchFlag::NewTask, LaunchFlag::ResetTaskIfNeeded],
                    )
                    .as_launcher_tap()
                })
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

pub struct PriorityName;

impl LaunchStrategy for PriorityName {
    fn id(&self) -> StrategyId {
        StrategyId::PriorityName
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let points = ctx.entry_points(unit).await?;
            let intents: Vec<LaunchIntent> = priority_candidates(&points)
                .into_iter()
                .map(|candidate| {
                    let flags: &[LaunchFlag] = if candidate.pattern.is_some() {
                        &[LaunchFlag::NewTask, LaunchFlag::ClearTask]
                    } else {
                        &[LaunchFlag::NewTask]
                    };
                    component_intent(unit, &candidate.class_name, flags)
                })
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

/// Guessed component names for apps whose metadata lists nothing useful.
pub struct ConventionalComponent;

impl LaunchStrategy for ConventionalComponent {
    fn id(&self) -> StrategyId {
        StrategyId::ConventionalComponent
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let intents: Vec<LaunchIntent> = conventional_components(unit)
                .iter()
                .map(|name| component_intent(unit, name, &[LaunchFlag::NewTask]))
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

pub struct SystemAction;

impl LaunchStrategy for SystemAction {
    fn id(&self) -> StrategyId {
        StrategyId::SystemAction
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let Some(action) = ctx.tables.system_action(unit).cloned() else {
                return Ok(false);
            };
            let mut intent = LaunchIntent::package(unit)
                .with_action(action.action)
                .with_flags(&[LaunchFlag::NewTask]);
            if let Some(data) = action.data {
                intent = intent.with_data(data);
            }
            if let Some(mime_type) = action.mime_type {
                intent = intent.with_mime_type(mime_type);
            }
            ctx.start_first(unit, [intent]).await
        })
    }
}

/// Nudge the unit with a package-replaced broadcast, wait, then start it.
pub struct WakeThenRetry;

impl LaunchStrategy for WakeThenRetry {
    fn id(&self) -> StrategyId {
        StrategyId::WakeThenRetry
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let hint = LaunchIntent::package(unit)
                .with_action(ACTION_PACKAGE_REPLACED)
                .with_data(format!("package:{unit}"));
            ctx.host.send_broadcast(&hint).await?;

            tokio::time::sleep(ctx.wake_delay).await;

            let intent = LaunchIntent::package(unit)
                .as_launcher_tap()
                .with_flags(&[LaunchFlag::NewTask, LaunchFlag::ResetTaskIfNeeded]);
            ctx.start_first(unit, [intent]).await
        })
    }
}

pub struct HighestPriorityHandler;

impl LaunchStrategy for HighestPriorityHandler {
    fn id(&self) -> StrategyId {
        StrategyId::HighestPriorityHandler
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let points = ctx.entry_points(unit).await?;
            let Some(best) = highest_priority_launcher(&points) else {
                return Ok(false);
            };
            let intent = component_intent(
                unit,
                &best.class_name,
                &[LaunchFlag::NewTask, LaunchFlag::ResetTaskIfNeeded],
            )
            .as_launcher_tap();
            ctx.start_first(unit, [intent]).await
        })
    }
}

/// Every exported or name-matching entry point not already tried.
pub struct BruteForce;

impl LaunchStrategy for BruteForce {
    fn id(&self) -> StrategyId {
        StrategyId::BruteForce
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let points = ctx.entry_points(unit).await?;
            let intents: Vec<LaunchIntent> =
                brute_force_candidates(&points, |name| {
                    ctx.was_tried(&EntryPoint::qualify(unit, name))
                })
                .into_iter()
                .map(|ep| {
                    component_intent(
                        unit,
                        &ep.class_name,
                        &[LaunchFlag::NewTask, LaunchFlag::ClearTop],
                    )
                    .with_extra(EXTRA_FROM_LAUNCHER, ExtraValue::Bool(true))
                })
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

/// Registered entry point with flags lock-task mode accepts.
pub struct LockTaskEntryPoint;

impl LaunchStrategy for LockTaskEntryPoint {
    fn id(&self) -> StrategyId {
        StrategyId::LockTaskEntryPoint
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let Some(class_name) = ctx.entry.launch_entry.clone() else {
                return Ok(false);
            };
            let intent = component_intent(
                unit,
                &class_name,
                &[
                    LaunchFlag::NewTask,
                    LaunchFlag::SingleTop,
                    LaunchFlag::ReorderToFront,
                ],
            )
            .as_launcher_tap();
            ctx.start_first(unit, [intent]).await
        })
    }
}

/// Exported first-screen components, tagged with our referrer.
pub struct ExportedComponent;

impl LaunchStrategy for ExportedComponent {
    fn id(&self) -> StrategyId {
        StrategyId::ExportedComponent
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let points = ctx.entry_points(unit).await?;
            let referrer = ctx.referrer();
            let intents: Vec<LaunchIntent> = restricted_candidates(&points)
                .into_iter()
                .map(|ep| {
                    component_intent(
                        unit,
                        &ep.class_name,
                        &[LaunchFlag::NewTask, LaunchFlag::SingleTop],
                    )
                    .with_extra(EXTRA_REFERRER, ExtraValue::Str(referrer.clone()))
                })
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

/// Bring an existing task to the front, else start a fresh one.
pub struct TaskResume;

impl LaunchStrategy for TaskResume {
    fn id(&self) -> StrategyId {
        StrategyId::TaskResume
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let tasks = match ctx.host.recent_tasks(TASK_RESUME_SCAN_LIMIT).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    debug!(unit = %unit, "Recent tasks unavailable: {e}");
                    Vec::new()
                }
            };
            if let Some(task) = tasks.iter().find(|task| task.involves(unit)) {
                match ctx.host.move_task_to_front(task.task_id).await {
                    Ok(()) => {
                        debug!(unit = %unit, task_id = task.task_id, "Moved existing task to front");
                        return Ok(true);
                    }
                    Err(e) => debug!(unit = %unit, "Could not move task to front: {e}"),
                }
            }

            let Some(class_name) = ctx.entry.launch_entry.clone() else {
                return Ok(false);
            };
            let intent = component_intent(
                unit,
                &class_name,
                &[
                    LaunchFlag::NewTask,
                    LaunchFlag::MultipleTask,
                    LaunchFlag::ResetTaskIfNeeded,
                ],
            )
            .as_launcher_tap();
            ctx.start_first(unit, [intent]).await
        })
    }
}

/// First resolved launcher activity, marked as started from the lock screen.
pub struct ResolvedLauncher;

impl LaunchStrategy for ResolvedLauncher {
    fn id(&self) -> StrategyId {
        StrategyId::ResolvedLauncher
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let points = ctx.entry_points(unit).await?;
            let Some(first) = launcher_entries(&points).next() else {
                return Ok(false);
            };
            let intent = component_intent(unit, &first.class_name, &[LaunchFlag::NewTask])
                .with_action(ACTION_MAIN)
                .with_category(CATEGORY_LAUNCHER)
                .with_extra(EXTRA_LAUNCHED_FROM_LOCKSCREEN, ExtraValue::Bool(true))
                .with_extra(EXTRA_REFERRER, ExtraValue::Str(ctx.referrer()));
            ctx.start_first(unit, [intent]).await
        })
    }
}

pub struct LockTaskDeepLink;

impl LaunchStrategy for LockTaskDeepLink {
    fn id(&self) -> StrategyId {
        StrategyId::LockTaskDeepLink
    }

    fn attempt<'a>(&'a self, unit: &'a UnitId, ctx: &'a mut LaunchCtx) -> StrategyFut<'a> {
        Box::pin(async move {
            let intents: Vec<LaunchIntent> = ctx
                .tables
                .restricted_deep_links(unit)
                .iter()
                .map(|link| {
                    LaunchIntent::uri(link.as_str(), Some(unit))
                        .with_flags(&[LaunchFlag::NewTask, LaunchFlag::SingleTop])
                })
                .collect();
            ctx.start_first(unit, intents).await
        })
    }
}

/// The full chain, in the order strategies are tried.
#[must_use]
pub fn default_chain() -> Vec<Box<dyn LaunchStrategy>> {
    vec![
        Box::new(DirectEntryPoint),
        Box::new(DeepLink),
        Box::new(LauncherQuery),
        Box::new(PriorityName),
        Box::new(ConventionalComponent),
        Box::new(SystemAction),
        Box::new(WakeThenRetry),
        Box::new(HighestPriorityHandler),
        Box::new(BruteForce),
    ]
}

/// Sub-chain for lock-task mode.
#[must_use]
pub fn restricted_chain() -> Vec<Box<dyn LaunchStrategy>> {
    vec![
        Box::new(LockTaskEntryPoint),
        Box::new(ExportedComponent),
        Box::new(TaskResume),
        Box::new(ResolvedLauncher),
        Box::new(LockTaskDeepLink),
    ]
}
