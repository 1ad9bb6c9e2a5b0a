//! Durable storage for the offline queue.
//!
//! The whole queue is stored as one JSON document under
//! [`QUEUE_KEY`]. Every backend replaces that document atomically, so a
//! crash mid-write leaves either the old list or the new one.

mod file;
mod memory;
mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use tally_types::QueuedAction;

/// Key the queue document is stored under.
pub const QUEUE_KEY: &str = "offline_action_queue";

/// Trait for queue persistence backends.
#[async_trait]
pub trait QueueStorage: Send + Sync {
    /// Load the persisted queue.
    ///
    /// Returns an empty list if nothing has been stored yet.
    async fn load(&self) -> Result<Vec<QueuedAction>, StorageError>;

    /// Replace the persisted queue with `actions`.
    async fn save(&self, actions: &[QueuedAction]) -> Result<(), StorageError>;
}

fn encode(actions: &[QueuedAction]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(actions)?)
}

fn decode(document: &str) -> Result<Vec<QueuedAction>, StorageError> {
    Ok(serde_json::from_str(document)?)
}
