//! Durable action queue store.
//!
//! Wraps a [`tally_core::ActionQueue`] with persistence. Every mutation is
//! applied to a copy, the copy is saved, and only then does it replace the
//! in-memory queue. If the save fails the caller gets the error and the
//! in-memory queue still equals what is on disk.

use crate::error::StorageError;
use crate::storage::QueueStorage;
use chrono::Utc;
use std::sync::Arc;
use tally_core::ActionQueue;
use tally_types::{Action, ActionId, QueuedAction};
use tokio::sync::{watch, Mutex};

/// Persistent FIFO of actions waiting to reach the server.
///
/// One store per signed-in session, shared by `Arc` between the UI and the
/// sync processor. Mutations are serialized on an async mutex held across
/// the save, so concurrent callers never interleave partial writes.
pub struct ActionQueueStore {
    queue: Mutex<ActionQueue>,
    storage: Arc<dyn QueueStorage>,
    updates: watch::Sender<Vec<QueuedAction>>,
}

impl ActionQueueStore {
    /// Load the persisted queue from `storage`.
    pub async fn open(storage: Arc<dyn QueueStorage>) -> Result<Self, StorageError> {
        let actions = storage.load().await?;
        let queue = ActionQueue::from_actions(actions);
        tracing::debug!("Opened action queue with {} pending actions", queue.len());

        let (updates, _) = watch::channel(queue.as_slice().to_vec());
        Ok(Self {
            queue: Mutex::new(queue),
            storage,
            updates,
        })
    }

    /// Append an action and return its id.
    ///
    /// No business validation happens here; whatever is enqueued is sent.
    pub async fn enqueue(&self, action: impl Into<Action>) -> Result<ActionId, StorageError> {
        let action = action.into();
        let kind = action.kind();

        let mut queue = self.queue.lock().await;
        let mut next = queue.clone();
        let id = next.enqueue(action, Utc::now());
        self.commit(&mut queue, next).await?;

        tracing::debug!("Enqueued {} action {}", kind, id);
        Ok(id)
    }

    /// The oldest action, without removing it.
    pub async fn dequeue_one(&self) -> Option<QueuedAction> {
        self.queue.lock().await.peek().cloned()
    }

    /// Remove an action. An unknown id is a no-op and writes nothing.
    pub async fn remove(&self, id: &ActionId) -> Result<Option<QueuedAction>, StorageError> {
        let mut queue = self.queue.lock().await;
        let mut next = queue.clone();
        let Some(removed) = next.remove(id) else {
            return Ok(None);
        };
        self.commit(&mut queue, next).await?;
        Ok(Some(removed))
    }

    /// Bump an action's retry counter and return the new value.
    ///
    /// Returns `None` without writing if the id is unknown.
    pub async fn increment_retry(&self, id: &ActionId) -> Result<Option<u32>, StorageError> {
        let mut queue = self.queue.lock().await;
        let mut next = queue.clone();
        let Some(count) = next.increment_retry(id) else {
            return Ok(None);
        };
        self.commit(&mut queue, next).await?;
        Ok(Some(count))
    }

    /// Drop every pending action (logout, account deletion).
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut queue = self.queue.lock().await;
        let dropped = queue.len();
        self.commit(&mut queue, ActionQueue::new()).await?;
        tracing::info!("Cleared action queue ({} actions dropped)", dropped);
        Ok(())
    }

    /// Look up an action by id.
    pub async fn get(&self, id: &ActionId) -> Option<QueuedAction> {
        self.queue.lock().await.get(id).cloned()
    }

    /// Number of pending actions.
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    /// Copy of the queue, oldest first.
    pub async fn snapshot(&self) -> Vec<QueuedAction> {
        self.queue.lock().await.as_slice().to_vec()
    }

    /// Ids in drain order.
    pub async fn ids(&self) -> Vec<ActionId> {
        self.queue.lock().await.ids()
    }

    /// Watch the queue contents.
    ///
    /// The receiver holds the latest committed snapshot and is notified
    /// after every successful mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<QueuedAction>> {
        self.updates.subscribe()
    }

    async fn commit(&self, current: &mut ActionQueue, next: ActionQueue) -> Result<(), StorageError> {
        if let Err(e) = self.storage.save(next.as_slice()).await {
            tracing::error!("Failed to persist action queue: {}", e);
            return Err(e);
        }
        *current = next;
        self.updates.send_replace(current.as_slice().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use tally_types::{LogActivityPayload, RespondToInvitePayload, SendFriendRequestPayload};

    async fn open_store() -> (ActionQueueStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = ActionQueueStore::open(Arc::new(storage.clone()))
            .await
            .unwrap();
        (store, storage)
    }

    #[tokio::test]
    async fn enqueue_persists_before_returning() {
        let (store, storage) = open_store().await;

        let id = store.enqueue(LogActivityPayload::new("c1", 10)).await.unwrap();

        let stored = storage.stored().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].retry_count, 0);
    }

    #[tokio::test]
    async fn dequeue_one_peeks_oldest() {
        let (store, _) = open_store().await;
        let first = store.enqueue(LogActivityPayload::new("c1", 1)).await.unwrap();
        store.enqueue(SendFriendRequestPayload::new("u1")).await.unwrap();

        assert_eq!(store.dequeue_one().await.unwrap().id, first);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn dequeue_one_on_empty_is_none() {
        let (store, _) = open_store().await;
        assert!(store.dequeue_one().await.is_none());
    }

    #[tokio::test]
    async fn remove_unknown_id_writes_nothing() {
        let (store, storage) = open_store().await;
        store.enqueue(LogActivityPayload::new("c1", 1)).await.unwrap();
        let saves = storage.save_count();

        assert!(store.remove(&ActionId::new()).await.unwrap().is_none());

        assert_eq!(storage.save_count(), saves);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn increment_retry_is_persisted() {
        let (store, storage) = open_store().await;
        let id = store.enqueue(RespondToInvitePayload::accept("i1")).await.unwrap();

        assert_eq!(store.increment_retry(&id).await.unwrap(), Some(1));
        assert_eq!(store.increment_retry(&id).await.unwrap(), Some(2));

        assert_eq!(storage.stored().unwrap()[0].retry_count, 2);
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_unchanged() {
        let (store, storage) = open_store().await;
        let id = store.enqueue(LogActivityPayload::new("c1", 1)).await.unwrap();

        storage.fail_next_save("disk full");
        let result = store.enqueue(LogActivityPayload::new("c1", 2)).await;
        assert!(result.is_err());
        assert_eq!(store.ids().await, vec![id]);

        storage.fail_next_save("disk full");
        assert!(store.increment_retry(&id).await.is_err());
        assert_eq!(store.get(&id).await.unwrap().retry_count, 0);

        storage.fail_next_save("disk full");
        assert!(store.remove(&id).await.is_err());
        assert!(store.get(&id).await.is_some());

        assert_eq!(store.snapshot().await, storage.stored().unwrap());
    }

    #[tokio::test]
    async fn clear_empties_memory_and_storage() {
        let (store, storage) = open_store().await;
        store.enqueue(LogActivityPayload::new("c1", 1)).await.unwrap();
        store.enqueue(LogActivityPayload::new("c1", 2)).await.unwrap();

        store.clear().await.unwrap();

        assert!(store.is_empty().await);
        assert!(storage.stored().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_restores_order_and_counts() {
        let (store, storage) = open_store().await;
        let a = store.enqueue(LogActivityPayload::new("c1", 1)).await.unwrap();
        let b = store.enqueue(LogActivityPayload::new("c1", 2)).await.unwrap();
        store.increment_retry(&b).await.unwrap();
        drop(store);

        let reopened = ActionQueueStore::open(Arc::new(storage)).await.unwrap();

        assert_eq!(reopened.ids().await, vec![a, b]);
        assert_eq!(reopened.get(&b).await.unwrap().retry_count, 1);
    }

    #[tokio::test]
    async fn subscribers_see_committed_state() {
        let (store, storage) = open_store().await;
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        store.enqueue(LogActivityPayload::new("c1", 1)).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        storage.fail_next_save("disk full");
        let _ = store.enqueue(LogActivityPayload::new("c1", 2)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_all_kept() {
        let (store, storage) = open_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for value in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.enqueue(LogActivityPayload::new("c1", value)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await, 20);
        assert_eq!(storage.stored().unwrap().len(), 20);
    }
}
