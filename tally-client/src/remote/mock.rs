//! Mock remote for testing.
//!
//! Behaves like the real server: it keeps a ledger of applied idempotency
//! keys and answers a repeated key with `AlreadyApplied`. On top of that,
//! outcomes can be scripted per key, calls can be held behind a gate, and
//! every call is recorded for verification.

use super::{ApplyOutcome, RemoteApi, RpcError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tally_core::page::select_page;
use tally_types::{
    Action, ActionKind, ActivityRecord, EventId, LogActivityPayload, PageRequest, RecordId,
    RecordTimestamp, RespondToInvitePayload, SendFriendRequestPayload,
};
use tokio::sync::watch;

/// User id the mock attributes logged activity to.
pub const MOCK_USER_ID: &str = "mock-user";

/// A scripted outcome for one call with a given idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Fail with a transport error; nothing is applied.
    Fail(String),
    /// Refuse permanently; nothing is applied.
    Reject {
        /// Error code to report.
        code: String,
        /// Error message to report.
        message: String,
    },
    /// Apply the action, then lose the response.
    ApplyThenDropResponse,
    /// Never answer.
    Hang,
}

/// One recorded mutation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Which procedure was called.
    pub kind: ActionKind,
    /// Idempotency key sent.
    pub event_id: EventId,
}

/// In-process server double.
#[derive(Debug)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
    gate: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    applied_keys: HashSet<EventId>,
    effects: Vec<Action>,
    calls: Vec<RemoteCall>,
    scripts: HashMap<EventId, VecDeque<Scripted>>,
    always_fail: HashMap<EventId, String>,
    history: Vec<ActivityRecord>,
    raw_pages: VecDeque<Vec<ActivityRecord>>,
    fetches: Vec<PageRequest>,
    fail_next_fetch: Option<String>,
}

impl Default for MockRemote {
    fn default() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: Arc::default(),
            gate: Arc::new(gate),
        }
    }
}

impl Clone for MockRemote {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl MockRemote {
    /// Create a mock with no history and nothing applied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock seeded with a small activity history.
    ///
    /// Several rows share one second to exercise the cursor tie-breaker.
    pub fn demo() -> Self {
        let remote = Self::new();
        let base = RecordTimestamp::now().as_datetime().timestamp() - 3600;
        let rows = [
            (0, 0, "run", 5),
            (0, 250_000, "run", 3),
            (0, 250_000, "swim", 2),
            (1, 0, "run", 8),
            (60, 123_456, "swim", 1),
            (120, 0, "run", 4),
        ];
        let records = rows
            .iter()
            .enumerate()
            .filter_map(|(i, (offset, micros, challenge, value))| {
                Some(ActivityRecord {
                    id: RecordId::from_u128(i as u128 + 1),
                    challenge_id: (*challenge).to_string(),
                    user_id: MOCK_USER_ID.to_string(),
                    value: *value,
                    note: None,
                    created_at: RecordTimestamp::from_unix(base + offset, micros * 1_000)?,
                })
            })
            .collect();
        remote.insert_history(records);
        remote
    }

    /// Queue an outcome for the next call carrying `event_id`.
    pub fn script(&self, event_id: &EventId, outcome: Scripted) {
        self.lock()
            .scripts
            .entry(event_id.clone())
            .or_default()
            .push_back(outcome);
    }

    /// Fail every call carrying `event_id` until [`Self::stop_failing`].
    pub fn fail_always(&self, event_id: &EventId, error: &str) {
        self.lock()
            .always_fail
            .insert(event_id.clone(), error.to_string());
    }

    /// Undo [`Self::fail_always`].
    pub fn stop_failing(&self, event_id: &EventId) {
        self.lock().always_fail.remove(event_id);
    }

    /// Hold every mutation call until [`Self::resume`].
    pub fn pause(&self) {
        self.gate.send_replace(true);
    }

    /// Release held calls.
    pub fn resume(&self) {
        self.gate.send_replace(false);
    }

    /// Get all mutation calls that were made, including failed ones.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of mutation calls made.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls made with one idempotency key.
    pub fn calls_for(&self, event_id: &EventId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| &c.event_id == event_id)
            .count()
    }

    /// Actions the server actually applied, in order.
    pub fn effects(&self) -> Vec<Action> {
        self.lock().effects.clone()
    }

    /// How many times an idempotency key took effect. Never more than one.
    pub fn effect_count(&self, event_id: &EventId) -> usize {
        self.lock()
            .effects
            .iter()
            .filter(|a| a.client_event_id() == event_id)
            .count()
    }

    /// Add rows to the history table.
    pub fn insert_history(&self, records: Vec<ActivityRecord>) {
        self.lock().history.extend(records);
    }

    /// Return `rows` verbatim from the next history fetch.
    pub fn queue_raw_page(&self, rows: Vec<ActivityRecord>) {
        self.lock().raw_pages.push_back(rows);
    }

    /// Cause the next history fetch to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        self.lock().fail_next_fetch = Some(error.to_string());
    }

    /// History requests received, in order.
    pub fn fetch_requests(&self) -> Vec<PageRequest> {
        self.lock().fetches.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn apply(&self, action: Action) -> Result<ApplyOutcome, RpcError> {
        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this only returns once open.
        let _ = gate.wait_for(|paused| !*paused).await;

        // `None` means hang.
        let answer = {
            let mut inner = self.lock();
            let key = action.client_event_id().clone();
            inner.calls.push(RemoteCall {
                kind: action.kind(),
                event_id: key.clone(),
            });

            let scripted = inner.scripts.get_mut(&key).and_then(VecDeque::pop_front);
            match scripted {
                Some(Scripted::Fail(error)) => Some(Err(RpcError::Transport(error))),
                Some(Scripted::Reject { code, message }) => {
                    Some(Err(RpcError::Rejected { code, message }))
                }
                Some(Scripted::ApplyThenDropResponse) => {
                    inner.record(action);
                    Some(Err(RpcError::Transport("connection reset".to_string())))
                }
                Some(Scripted::Hang) => None,
                None => {
                    if let Some(error) = inner.always_fail.get(&key) {
                        Some(Err(RpcError::Transport(error.clone())))
                    } else {
                        Some(Ok(inner.record(action)))
                    }
                }
            }
        };

        match answer {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

impl MockRemoteInner {
    /// Apply unless the key was seen before.
    fn record(&mut self, action: Action) -> ApplyOutcome {
        if !self.applied_keys.insert(action.client_event_id().clone()) {
            return ApplyOutcome::AlreadyApplied;
        }
        if let Action::LogActivity(payload) = &action {
            self.history.push(ActivityRecord {
                id: RecordId::new(),
                challenge_id: payload.challenge_id.clone(),
                user_id: MOCK_USER_ID.to_string(),
                value: payload.value,
                note: payload.note.clone(),
                created_at: RecordTimestamp::now(),
            });
        }
        self.effects.push(action);
        ApplyOutcome::Applied
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn log_activity(&self, payload: &LogActivityPayload) -> Result<ApplyOutcome, RpcError> {
        self.apply(Action::LogActivity(payload.clone())).await
    }

    async fn respond_to_invite(
        &self,
        payload: &RespondToInvitePayload,
    ) -> Result<ApplyOutcome, RpcError> {
        self.apply(Action::RespondToInvite(payload.clone())).await
    }

    async fn send_friend_request(
        &self,
        payload: &SendFriendRequestPayload,
    ) -> Result<ApplyOutcome, RpcError> {
        self.apply(Action::SendFriendRequest(payload.clone())).await
    }

    async fn fetch_activity_page(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<ActivityRecord>, RpcError> {
        let mut inner = self.lock();
        inner.fetches.push(request.clone());

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(RpcError::Transport(error));
        }
        if let Some(rows) = inner.raw_pages.pop_front() {
            return Ok(rows);
        }
        Ok(select_page(&inner.history, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn repeated_key_is_already_applied() {
        let remote = MockRemote::new();
        let payload = SendFriendRequestPayload::new("u1");

        assert_eq!(
            remote.send_friend_request(&payload).await,
            Ok(ApplyOutcome::Applied)
        );
        assert_eq!(
            remote.send_friend_request(&payload).await,
            Ok(ApplyOutcome::AlreadyApplied)
        );
        assert_eq!(remote.effect_count(&payload.client_event_id), 1);
        assert_eq!(remote.call_count(), 2);
    }

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let remote = MockRemote::new();
        let payload = RespondToInvitePayload::accept("i1");
        let key = payload.client_event_id.clone();
        remote.script(&key, Scripted::Fail("offline".into()));
        remote.script(
            &key,
            Scripted::Reject {
                code: "P0001".into(),
                message: "invite expired".into(),
            },
        );

        assert!(matches!(
            remote.respond_to_invite(&payload).await,
            Err(RpcError::Transport(_))
        ));
        assert!(matches!(
            remote.respond_to_invite(&payload).await,
            Err(RpcError::Rejected { .. })
        ));
        assert_eq!(
            remote.respond_to_invite(&payload).await,
            Ok(ApplyOutcome::Applied)
        );
    }

    #[tokio::test]
    async fn dropped_response_still_takes_effect() {
        let remote = MockRemote::new();
        let payload = LogActivityPayload::new("c1", 10);
        remote.script(&payload.client_event_id, Scripted::ApplyThenDropResponse);

        assert!(remote.log_activity(&payload).await.is_err());
        assert_eq!(remote.effect_count(&payload.client_event_id), 1);
        assert_eq!(
            remote.log_activity(&payload).await,
            Ok(ApplyOutcome::AlreadyApplied)
        );
        assert_eq!(remote.effect_count(&payload.client_event_id), 1);
    }

    #[tokio::test]
    async fn fail_always_until_stopped() {
        let remote = MockRemote::new();
        let payload = LogActivityPayload::new("c1", 1);
        remote.fail_always(&payload.client_event_id, "503");

        for _ in 0..3 {
            assert!(remote.log_activity(&payload).await.is_err());
        }
        remote.stop_failing(&payload.client_event_id);
        assert_eq!(
            remote.log_activity(&payload).await,
            Ok(ApplyOutcome::Applied)
        );
    }

    #[tokio::test]
    async fn hang_never_answers() {
        let remote = MockRemote::new();
        let payload = LogActivityPayload::new("c1", 1);
        remote.script(&payload.client_event_id, Scripted::Hang);

        let result = tokio::time::timeout(Duration::from_millis(50), remote.log_activity(&payload)).await;
        assert!(result.is_err());
        assert_eq!(remote.effect_count(&payload.client_event_id), 0);
    }

    #[tokio::test]
    async fn pause_holds_calls_until_resume() {
        let remote = MockRemote::new();
        remote.pause();

        let payload = SendFriendRequestPayload::new("u1");
        let call = {
            let remote = remote.clone();
            let payload = payload.clone();
            tokio::spawn(async move { remote.send_friend_request(&payload).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(remote.call_count(), 0);

        remote.resume();
        assert_eq!(call.await.unwrap(), Ok(ApplyOutcome::Applied));
        assert_eq!(remote.call_count(), 1);
    }

    #[tokio::test]
    async fn logged_activity_shows_up_in_history() {
        let remote = MockRemote::new();
        remote
            .log_activity(&LogActivityPayload::new("c1", 42))
            .await
            .unwrap();

        let page = remote
            .fetch_activity_page(&PageRequest {
                limit: 10,
                cursor: None,
                challenge_id: None,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].value, 42);
    }

    #[tokio::test]
    async fn demo_history_has_same_second_rows() {
        let remote = MockRemote::demo();
        let page = remote
            .fetch_activity_page(&PageRequest {
                limit: 100,
                cursor: None,
                challenge_id: None,
            })
            .await
            .unwrap();

        assert_eq!(page.len(), 6);
        assert_eq!(page[4].created_at, page[3].created_at);
        assert!(page[4].id < page[3].id);
    }

    #[tokio::test]
    async fn fetch_failure_is_one_shot() {
        let remote = MockRemote::demo();
        remote.fail_next_fetch("offline");
        let request = PageRequest {
            limit: 2,
            cursor: None,
            challenge_id: None,
        };

        assert!(remote.fetch_activity_page(&request).await.is_err());
        assert_eq!(remote.fetch_activity_page(&request).await.unwrap().len(), 2);
        assert_eq!(remote.fetch_requests().len(), 2);
    }
}
