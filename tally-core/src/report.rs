//! Outcome of one drain cycle.

use crate::retry::EvictReason;
use serde::Serialize;
use tally_types::{Action, ActionId};

/// An action that was evicted without reaching the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalFailure {
    /// Local id the action had in the queue.
    pub action_id: ActionId,
    /// The action itself, so callers can tell the user what was lost.
    pub action: Action,
    /// Failed attempts at eviction time.
    pub retry_count: u32,
    /// Last error seen.
    pub error: String,
    /// Why it was evicted.
    pub reason: EvictReason,
}

/// Counters for one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Actions attempted.
    pub processed: usize,
    /// Actions confirmed applied (including already-applied replays).
    pub succeeded: usize,
    /// Attempts that failed, whether or not the action was evicted.
    pub failed: usize,
    /// Queue length when the cycle finished.
    pub remaining: usize,
    /// Another drain was in progress; this call did nothing.
    pub already_running: bool,
    /// Actions evicted during this cycle.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terminal_failures: Vec<TerminalFailure>,
}

impl DrainReport {
    /// Report for a call that found a drain already running.
    pub fn already_running(remaining: usize) -> Self {
        Self {
            remaining,
            already_running: true,
            ..Self::default()
        }
    }

    /// Count an applied action.
    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// Count a failed attempt.
    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    /// Keep an evicted action for the caller.
    pub fn record_eviction(&mut self, failure: TerminalFailure) {
        self.terminal_failures.push(failure);
    }

    /// Whether every attempt in this cycle succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::SendFriendRequestPayload;

    #[test]
    fn counters_add_up() {
        let mut report = DrainReport::default();
        report.record_success();
        report.record_failure();
        report.record_success();

        assert_eq!(report.processed, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn already_running_reports_nothing_processed() {
        let report = DrainReport::already_running(4);
        assert!(report.already_running);
        assert_eq!(report.processed, 0);
        assert_eq!(report.remaining, 4);
        assert!(report.is_clean());
    }

    #[test]
    fn serializes_without_empty_failures() {
        let json = serde_json::to_value(DrainReport::default()).unwrap();
        assert!(json.get("terminal_failures").is_none());
        assert_eq!(json["processed"], 0);
    }

    #[test]
    fn eviction_is_recorded() {
        let mut report = DrainReport::default();
        report.record_failure();
        report.record_eviction(TerminalFailure {
            action_id: ActionId::new(),
            action: SendFriendRequestPayload::new("u1").into(),
            retry_count: 5,
            error: "transport error".into(),
            reason: EvictReason::RetriesExhausted,
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["terminal_failures"][0]["reason"], "retries_exhausted");
        assert_eq!(json["terminal_failures"][0]["retry_count"], 5);
    }
}
