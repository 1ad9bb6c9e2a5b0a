//! JSON file storage.

use super::{decode, encode, QueueStorage, QUEUE_KEY};
use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tally_types::QueuedAction;

/// Stores the queue as `<dir>/offline_action_queue.json`.
///
/// Writes go to a temporary sibling first, are flushed to disk, and are then
/// renamed over the old file, so neither readers nor a restart after power
/// loss see a half-written document.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` for the queue document. The directory is created on first
    /// save if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the queue document.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", QUEUE_KEY))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", QUEUE_KEY))
    }
}

#[async_trait]
impl QueueStorage for FileStorage {
    async fn load(&self) -> Result<Vec<QueuedAction>, StorageError> {
        let path = self.path();
        match tokio::fs::read_to_string(&path).await {
            Ok(document) => decode(&document),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn save(&self, actions: &[QueuedAction]) -> Result<(), StorageError> {
        let document = encode(actions)?;
        let temp = self.temp_path();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        write_synced(&temp, document.as_bytes()).await?;
        set_file_permissions_0600(&temp).await?;

        let path = self.path();
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        sync_dir(&self.dir).await
    }
}

/// Write `contents` to `path` and wait until it reaches the disk.
async fn write_synced(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_all().await.map_err(|e| StorageError::io(path, e))
}

/// Persist the rename itself. Directories cannot be opened for syncing
/// outside Unix, so this is a no-op there.
async fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        let handle = tokio::fs::File::open(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;
        handle.sync_all().await.map_err(|e| StorageError::io(dir, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| StorageError::io(path, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
