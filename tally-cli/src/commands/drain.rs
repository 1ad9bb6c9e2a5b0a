//! Send queued actions once.

use anyhow::{Context, Result};
use tally_client::DrainReport;

use crate::session::Session;

/// Run the drain command.
pub async fn run(session: &Session) -> Result<DrainReport> {
    let pending = session.store.len().await;
    if pending == 0 {
        println!("Nothing to send.");
        return Ok(DrainReport::default());
    }

    println!("Sending {} queued actions...", pending);
    let report = session
        .processor()
        .drain()
        .await
        .context("Drain aborted")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to format report")?
    );
    for failure in &report.terminal_failures {
        eprintln!(
            "Dropped {} after {} attempts: {}",
            failure.action.kind(),
            failure.retry_count,
            failure.error
        );
    }
    Ok(report)
}
