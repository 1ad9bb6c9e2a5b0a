//! Sync processor.
//!
//! Drains the action queue toward empty. One drain cycle:
//!
//! 1. Snapshot the queued ids (actions added during the cycle wait for the
//!    next one).
//! 2. For each id, oldest first, send the action to the remote.
//! 3. Applied or already applied: remove it.
//! 4. Failed: bump its retry count; evict it once the retry policy says so.
//!
//! A failure never blocks the actions behind it. Only one cycle runs at a
//! time per processor; a concurrent call returns straight away.

use crate::config::Config;
use crate::error::ClientError;
use crate::remote::{ApplyOutcome, RemoteApi, RpcError};
use crate::store::ActionQueueStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{DrainReport, FailureDisposition, RetryPolicy, TerminalFailure};
use tally_types::{Action, QueuedAction};
use tokio::sync::broadcast;

/// Capacity of the terminal failure channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// When to give up on an action.
    pub retry: RetryPolicy,
    /// Timeout for each remote call.
    pub call_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(20),
        }
    }
}

impl From<&Config> for ProcessorConfig {
    fn from(config: &Config) -> Self {
        Self {
            retry: config.queue.retry_policy(),
            call_timeout: config.remote.call_timeout(),
        }
    }
}

/// Sends queued actions to the remote.
pub struct SyncProcessor {
    store: Arc<ActionQueueStore>,
    remote: Arc<dyn RemoteApi>,
    config: ProcessorConfig,
    draining: AtomicBool,
    failures: broadcast::Sender<TerminalFailure>,
}

/// Clears the draining flag when the cycle ends, including on cancellation.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncProcessor {
    /// Create a processor over a shared store.
    pub fn new(
        store: Arc<ActionQueueStore>,
        remote: Arc<dyn RemoteApi>,
        config: ProcessorConfig,
    ) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            store,
            remote,
            config,
            draining: AtomicBool::new(false),
            failures,
        }
    }

    /// The store this processor drains.
    pub fn store(&self) -> &Arc<ActionQueueStore> {
        &self.store
    }

    /// Whether a cycle is in progress.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Receive every action evicted from now on.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<TerminalFailure> {
        self.failures.subscribe()
    }

    /// Run one drain cycle.
    ///
    /// Returns `already_running` without touching the remote if another
    /// cycle holds the processor. A storage error aborts the cycle; the
    /// queue keeps its last persisted state.
    pub async fn drain(&self) -> Result<DrainReport, ClientError> {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("Drain already running, skipping");
            return Ok(DrainReport::already_running(self.store.len().await));
        };

        let ids = self.store.ids().await;
        let mut report = DrainReport::default();
        if !ids.is_empty() {
            tracing::debug!("Drain started with {} actions", ids.len());
        }

        for id in ids {
            // Removed since the snapshot, e.g. by clear().
            let Some(queued) = self.store.get(&id).await else {
                tracing::debug!("Action {} left the queue mid-drain, skipping", id);
                continue;
            };

            tracing::debug!(
                "Sending {} action {} (attempt {})",
                queued.kind(),
                id,
                queued.retry_count + 1
            );

            match self.attempt(&queued.action).await {
                Ok(outcome) => {
                    if outcome == ApplyOutcome::AlreadyApplied {
                        tracing::debug!("Action {} was already applied", id);
                    }
                    self.store.remove(&id).await?;
                    report.record_success();
                }
                Err(error) => {
                    report.record_failure();
                    self.handle_failure(queued, error, &mut report).await?;
                }
            }
        }

        report.remaining = self.store.len().await;
        if report.processed > 0 {
            tracing::info!(
                "Drain finished: {} processed, {} succeeded, {} failed, {} remaining",
                report.processed,
                report.succeeded,
                report.failed,
                report.remaining
            );
        }
        Ok(report)
    }

    async fn attempt(&self, action: &Action) -> Result<ApplyOutcome, RpcError> {
        let call = async {
            match action {
                Action::LogActivity(payload) => self.remote.log_activity(payload).await,
                Action::RespondToInvite(payload) => self.remote.respond_to_invite(payload).await,
                Action::SendFriendRequest(payload) => {
                    self.remote.send_friend_request(payload).await
                }
            }
        };

        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout),
        }
    }

    async fn handle_failure(
        &self,
        queued: QueuedAction,
        error: RpcError,
        report: &mut DrainReport,
    ) -> Result<(), ClientError> {
        let id = queued.id;
        let Some(retry_count) = self.store.increment_retry(&id).await? else {
            return Ok(());
        };

        match self
            .config
            .retry
            .after_failure(retry_count, error.is_permanent())
        {
            FailureDisposition::Retry => {
                tracing::warn!(
                    "Action {} failed (attempt {}/{}): {}",
                    id,
                    retry_count,
                    self.config.retry.max_retries,
                    error
                );
            }
            FailureDisposition::Evict(reason) => {
                self.store.remove(&id).await?;
                tracing::error!(
                    "Dropping {} action {} after {} attempts: {}",
                    queued.kind(),
                    id,
                    retry_count,
                    error
                );

                let failure = TerminalFailure {
                    action_id: id,
                    action: queued.action,
                    retry_count,
                    error: error.to_string(),
                    reason,
                };
                // No subscribers is fine; the report still carries it.
                let _ = self.failures.send(failure.clone());
                report.record_eviction(failure);
            }
        }
        Ok(())
    }
}
