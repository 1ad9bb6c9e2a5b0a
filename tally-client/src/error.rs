//! Error types for tally-client.

use std::path::PathBuf;

/// Failure to read or write the persisted queue.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File system error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored document could not be encoded or decoded.
    #[error("corrupt queue document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure injected by a test double.
    #[error("injected storage failure: {0}")]
    Injected(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors returned by the store and the sync processor.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The queue could not be persisted or loaded.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The drain scheduler is no longer running.
    #[error("drain scheduler stopped")]
    SchedulerStopped,
}
