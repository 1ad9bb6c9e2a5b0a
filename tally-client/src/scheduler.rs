//! Background drain scheduler.
//!
//! Runs the sync processor on a timer and whenever the app signals that a
//! drain is worth trying (connectivity came back, app returned to the
//! foreground, user asked). Explicit triggers drain immediately. After a
//! cycle that leaves failing actions behind, the timer waits with
//! exponential backoff instead of the plain interval.

use crate::config::SchedulerConfig;
use crate::error::ClientError;
use crate::processor::SyncProcessor;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{backoff_delay, DrainReport};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Why a drain should run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// The device went back online.
    ConnectivityRestored,
    /// The app came back to the foreground.
    AppForeground,
    /// Explicit user or caller request.
    Manual,
}

/// What woke the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Timer,
    Trigger(DrainTrigger),
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    triggers: mpsc::Sender<DrainTrigger>,
    shutdown: watch::Sender<bool>,
    reports: broadcast::Sender<DrainReport>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask for a drain. Fails once the scheduler has stopped.
    pub async fn trigger(&self, trigger: DrainTrigger) -> Result<(), ClientError> {
        self.triggers
            .send(trigger)
            .await
            .map_err(|_| ClientError::SchedulerStopped)
    }

    /// Receive the report of every cycle from now on.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<DrainReport> {
        self.reports.subscribe()
    }

    /// Stop the task and wait for it. A cycle in progress is finished first.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::error!("Drain scheduler task failed: {}", e);
        }
    }
}

/// Timer settings, in the units the loop uses.
#[derive(Debug, Clone, Copy)]
struct Timing {
    interval: Duration,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl From<&SchedulerConfig> for Timing {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            backoff_base: Duration::from_secs(config.backoff_base_secs),
            backoff_max: Duration::from_secs(config.backoff_max_secs),
        }
    }
}

/// Spawn the scheduler task.
pub fn spawn_drain_scheduler(
    processor: Arc<SyncProcessor>,
    config: &SchedulerConfig,
) -> SchedulerHandle {
    spawn_with_timing(processor, Timing::from(config))
}

fn spawn_with_timing(processor: Arc<SyncProcessor>, timing: Timing) -> SchedulerHandle {
    let (triggers, trigger_rx) = mpsc::channel(16);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (reports, _) = broadcast::channel(16);

    let task = tokio::spawn(run(
        processor,
        timing,
        trigger_rx,
        shutdown_rx,
        reports.clone(),
    ));

    SchedulerHandle {
        triggers,
        shutdown,
        reports,
        task,
    }
}

async fn run(
    processor: Arc<SyncProcessor>,
    timing: Timing,
    mut triggers: mpsc::Receiver<DrainTrigger>,
    mut shutdown: watch::Receiver<bool>,
    reports: broadcast::Sender<DrainReport>,
) {
    tracing::info!(
        "Drain scheduler started (interval: {}s)",
        timing.interval.as_secs()
    );

    let mut failing_cycles: u32 = 0;
    let mut wait = timing.interval;

    loop {
        let wake = tokio::select! {
            _ = shutdown.changed() => break,
            trigger = triggers.recv() => match trigger {
                Some(trigger) => Wake::Trigger(trigger),
                None => break,
            },
            _ = tokio::time::sleep(wait) => Wake::Timer,
        };
        tracing::debug!("Drain scheduler woke: {:?}", wake);

        loop {
            let report = match processor.drain().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("Drain cycle failed: {}", e);
                    failing_cycles = failing_cycles.saturating_add(1);
                    break;
                }
            };
            let _ = reports.send(report.clone());

            if report.already_running {
                break;
            }
            if !report.is_clean() && report.remaining > 0 {
                failing_cycles = failing_cycles.saturating_add(1);
                break;
            }
            failing_cycles = 0;
            // Clean cycle with work left: those actions arrived mid-drain.
            if report.remaining == 0 {
                break;
            }
        }

        wait = if failing_cycles == 0 {
            timing.interval
        } else {
            let delay = backoff_delay(failing_cycles, timing.backoff_base, timing.backoff_max);
            tracing::info!(
                "Backing off {}ms after {} failing cycles",
                delay.as_millis(),
                failing_cycles
            );
            delay
        };
    }

    tracing::info!("Drain scheduler stopped");
}
