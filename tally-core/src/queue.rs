//! In-memory action queue.
//!
//! Holds pending actions oldest first. Actions stay in place until they are
//! removed explicitly; a failed attempt only bumps `retry_count`, so the
//! queue position of an action never changes while it waits.
//!
//! Persistence is layered on top by `tally-client`'s store, which writes
//! [`ActionQueue::as_slice`] after every mutation.

use chrono::{DateTime, Utc};
use tally_types::{Action, ActionId, QueuedAction};

/// FIFO list of queued actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionQueue {
    actions: Vec<QueuedAction>,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted actions.
    ///
    /// Sorted by `created_at`; the sort is stable so actions queued in the
    /// same instant keep their stored order.
    pub fn from_actions(mut actions: Vec<QueuedAction>) -> Self {
        actions.sort_by_key(|a| a.created_at);
        Self { actions }
    }

    /// Append an action and return its new id.
    ///
    /// `created_at` is clamped to the newest queued action so a wall clock
    /// stepping backwards cannot place a new action ahead of older ones.
    pub fn enqueue(&mut self, action: Action, now: DateTime<Utc>) -> ActionId {
        let created_at = match self.actions.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        let queued = QueuedAction::new(action, created_at);
        let id = queued.id;
        self.actions.push(queued);
        id
    }

    /// The oldest action, without removing it.
    pub fn peek(&self) -> Option<&QueuedAction> {
        self.actions.first()
    }

    /// Look up an action by id.
    pub fn get(&self, id: &ActionId) -> Option<&QueuedAction> {
        self.actions.iter().find(|a| a.id == *id)
    }

    /// Remove an action. Unknown ids are ignored.
    pub fn remove(&mut self, id: &ActionId) -> Option<QueuedAction> {
        let index = self.actions.iter().position(|a| a.id == *id)?;
        Some(self.actions.remove(index))
    }

    /// Bump the retry counter and return the new value.
    ///
    /// Returns `None` for an unknown id.
    pub fn increment_retry(&mut self, id: &ActionId) -> Option<u32> {
        let action = self.actions.iter_mut().find(|a| a.id == *id)?;
        action.retry_count = action.retry_count.saturating_add(1);
        Some(action.retry_count)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Ids in drain order.
    pub fn ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|a| a.id).collect()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedAction> {
        self.actions.iter()
    }

    /// The whole queue, oldest first. This is what gets persisted.
    pub fn as_slice(&self) -> &[QueuedAction] {
        &self.actions
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
