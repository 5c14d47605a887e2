//! Reconciliation loop.
//!
//! Every tick reads the ledger and the OS running set and terminates units
//! that are suspended yet running. A failing tick lengthens the next wait to
//! the backoff interval; a clean tick restores the baseline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deepfreeze_types::{CapabilityError, UnitId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::MonitorError;
use crate::freeze::FreezeManager;
use crate::platform::PrivilegedCapability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub backoff: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(deepfreeze_config::DEFAULT_MONITOR_INTERVAL_MS),
            backoff: Duration::from_millis(deepfreeze_config::DEFAULT_MONITOR_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Idle,
    Polling,
    Enforcing,
    Stopped,
}

/// Published to observers after every phase change and every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStatus {
    pub phase: MonitorPhase,
    pub suspended_count: usize,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_terminated: Vec<UnitId>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub suspended_count: usize,
    pub terminated: Vec<UnitId>,
    pub failed: Vec<(UnitId, CapabilityError)>,
    /// Capability not held; nothing was enforced.
    pub enforcement_skipped: bool,
    /// The OS only reported part of the running set.
    pub partial_view: bool,
}

pub struct FreezeMonitor {
    manager: Arc<FreezeManager>,
    capability: Arc<dyn PrivilegedCapability>,
    settings: MonitorSettings,
}

impl FreezeMonitor {
    pub fn new(
        manager: Arc<FreezeManager>,
        capability: Arc<dyn PrivilegedCapability>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            manager,
            capability,
            settings,
        }
    }

    /// One `Polling -> Enforcing -> Idle` pass.
    pub async fn run_cycle(
        &self,
        status: &watch::Sender<MonitorStatus>,
    ) -> Result<CycleReport, MonitorError> {
        set_phase(status, MonitorPhase::Polling);
        let suspended = self.manager.list_suspended();
        let mut report = CycleReport {
            suspended_count: suspended.len(),
            ..CycleReport::default()
        };

        if !self.capability.is_held().await {
            debug!("Privileged capability not held, skipping enforcement");
            report.enforcement_skipped = true;
            publish(status, &report, true);
            return Ok(report);
        }

        let running = match self.capability.list_processes().await {
            Ok(running) => running,
            Err(e) => {
                publish(status, &report, false);
                return Err(MonitorError::RunningSet(e));
            }
        };
        report.partial_view = running.is_partial();

        set_phase(status, MonitorPhase::Enforcing);
        for unit in suspended.iter().filter(|unit| running.contains(unit)) {
            match self.capability.terminate(unit).await {
                Ok(()) => {
                    info!(unit = %unit, "Stopped suspended unit");
                    report.terminated.push(unit.clone());
                }
                Err(e) => {
                    warn!(unit = %unit, "Cannot stop suspended unit: {e}");
                    report.failed.push((unit.clone(), e));
                }
            }
        }

        publish(status, &report, true);
        Ok(report)
    }

    /// Spawn the loop onto the current runtime.
    pub fn start(self) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(MonitorStatus {
            suspended_count: self.manager.suspended_count(),
            ..MonitorStatus::default()
        });
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            self.run(loop_cancel, status_tx).await;
        });
        MonitorHandle {
            cancel,
            status: status_rx,
            task,
        }
    }

    async fn run(self, cancel: CancellationToken, status: watch::Sender<MonitorStatus>) {
        info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            "Freeze monitor started"
        );
        while !cancel.is_cancelled() {
            let result = self.run_cycle(&status).await;
            if let Err(e) = &result {
                warn!("Error in monitoring cycle: {e}");
            }
            let delay = next_delay(&self.settings, result.is_ok());

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        set_phase(&status, MonitorPhase::Stopped);
        info!("Freeze monitor stopped");
    }
}

fn next_delay(settings: &MonitorSettings, clean: bool) -> Duration {
    if clean {
        settings.interval
    } else {
        settings.backoff
    }
}

fn set_phase(status: &watch::Sender<MonitorStatus>, phase: MonitorPhase) {
    status.send_modify(|s| s.phase = phase);
}

fn publish(status: &watch::Sender<MonitorStatus>, report: &CycleReport, clean: bool) {
    status.send_modify(|s| {
        s.phase = MonitorPhase::Idle;
        s.suspended_count = report.suspended_count;
        s.cycles += 1;
        s.last_terminated.clone_from(&report.terminated);
        s.last_cycle_at = Some(Utc::now());
        if clean {
            s.consecutive_failures = 0;
        } else {
            s.consecutive_failures += 1;
        }
    });
}

/// Owner-side handle of a running monitor.
pub struct MonitorHandle {
    cancel: CancellationToken,
    status: watch::Receiver<MonitorStatus>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    /// Request cancellation and wait for the in-flight cycle to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Freeze monitor task ended abnormally: {e}");
        }
    }
}
