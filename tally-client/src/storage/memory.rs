//! In-memory storage for tests.

use super::{decode, encode, QueueStorage};
use crate::error::StorageError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tally_types::QueuedAction;

/// Storage that keeps the encoded document in memory.
///
/// Clones share state, so a test can hold one handle while the store owns
/// another, and can make writes fail on demand.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
    document: Option<String>,
    saves: usize,
    fail_next_save: Option<String>,
    fail_all_saves: Option<String>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with `actions`, as if saved by an earlier run.
    pub fn with_actions(actions: &[QueuedAction]) -> Result<Self, StorageError> {
        let storage = Self::new();
        storage.lock().document = Some(encode(actions)?);
        Ok(storage)
    }

    /// Cause the next save() to fail with the given error.
    pub fn fail_next_save(&self, error: &str) {
        self.lock().fail_next_save = Some(error.to_string());
    }

    /// Make every save() fail until cleared with `None`.
    pub fn fail_all_saves(&self, error: Option<&str>) {
        self.lock().fail_all_saves = error.map(str::to_string);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Decode what is currently stored.
    pub fn stored(&self) -> Result<Vec<QueuedAction>, StorageError> {
        match &self.lock().document {
            Some(document) => decode(document),
            None => Ok(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStorageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl QueueStorage for MemoryStorage {
    async fn load(&self) -> Result<Vec<QueuedAction>, StorageError> {
        self.stored()
    }

    async fn save(&self, actions: &[QueuedAction]) -> Result<(), StorageError> {
        let document = encode(actions)?;
        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_save.take() {
            return Err(StorageError::Injected(error));
        }
        if let Some(error) = &inner.fail_all_saves {
            return Err(StorageError::Injected(error.clone()));
        }

        inner.document = Some(document);
        inner.saves += 1;
        Ok(())
    }
}
