//! Keep draining in the background until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tally_client::{spawn_drain_scheduler, DrainTrigger};
use tokio::sync::broadcast::error::RecvError;

use crate::session::Session;

/// Run the watch command.
pub async fn run(session: &Session) -> Result<()> {
    let processor = Arc::new(session.processor());
    let mut failures = processor.subscribe_failures();
    let scheduler = spawn_drain_scheduler(processor, &session.config.scheduler);
    let mut reports = scheduler.subscribe_reports();

    println!(
        "Watching queue (every {}s). Press Ctrl-C to stop.",
        session.config.scheduler.interval_secs
    );
    scheduler
        .trigger(DrainTrigger::Manual)
        .await
        .context("Scheduler stopped before first drain")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping...");
                break;
            }
            report = reports.recv() => match report {
                Ok(report) if report.processed > 0 || report.remaining > 0 => {
                    println!(
                        "Sent {}, failed {}, {} still queued",
                        report.succeeded, report.failed, report.remaining
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} drain reports", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            failure = failures.recv() => match failure {
                Ok(failure) => eprintln!(
                    "Dropped {} {} after {} attempts: {}",
                    failure.action.kind(),
                    failure.action_id,
                    failure.retry_count,
                    failure.error
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} dropped-action notices", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
