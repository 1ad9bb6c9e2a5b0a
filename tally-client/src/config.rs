//! Configuration loading for tally-client.
//!
//! Configuration is loaded from a TOML file (default: `tally.toml` in the
//! data directory). Every field has a default, so an empty file is valid.

use crate::error::StorageError;
use crate::storage::{FileStorage, QueueStorage, SqliteStorage};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{RetryPolicy, DEFAULT_MAX_RETRIES};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server connection.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Retry behavior.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Where the queue is persisted.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Background drain scheduling.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL (default: http://localhost:54321).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Public API key sent as `apikey`.
    #[serde(default)]
    pub api_key: String,
    /// Signed-in user's token. Falls back to the API key when absent.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Per-call timeout in seconds (default: 20).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

/// Queue retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Failed attempts before an action is dropped (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Drop permanently rejected actions right away (default: true).
    #[serde(default = "default_evict_rejected")]
    pub evict_rejected: bool,
}

/// Persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON document on disk.
    File,
    /// SQLite key-value table.
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend to use (default: file).
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Directory (file) or database path (sqlite). Relative paths are
    /// resolved against the data directory.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// Drain scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between timer drains (default: 60).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// First backoff delay after a failing cycle (default: 2).
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Backoff ceiling (default: 300).
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_call_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_evict_rejected() -> bool {
    true
}

fn default_backend() -> StorageBackend {
    StorageBackend::File
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("queue")
}

fn default_interval_secs() -> u64 {
    60
}

fn default_backoff_base_secs() -> u64 {
    2
}

fn default_backoff_max_secs() -> u64 {
    300 // 5 minutes
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            access_token: None,
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            evict_rejected: default_evict_rejected(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// fails [`Config::validate`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot work.
    ///
    /// A zero call timeout fails every call that is not ready on its first
    /// poll; a zero interval or backoff base makes the scheduler spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.call_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "remote.call_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.queue.max_retries == 0 {
            return Err(ConfigError::invalid(
                "queue.max_retries",
                "must be greater than 0",
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.interval_secs",
                "must be greater than 0",
            ));
        }
        if self.scheduler.backoff_base_secs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.backoff_base_secs",
                "must be greater than 0",
            ));
        }
        if self.scheduler.backoff_max_secs < self.scheduler.backoff_base_secs {
            return Err(ConfigError::invalid(
                "scheduler.backoff_max_secs",
                "must not be less than backoff_base_secs",
            ));
        }
        Ok(())
    }
}

impl RemoteConfig {
    /// Per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl QueueConfig {
    /// Retry policy for the sync processor.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            evict_rejected: self.evict_rejected,
        }
    }
}

impl StorageConfig {
    /// Resolve the storage path against `data_dir`.
    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            data_dir.join(&self.path)
        }
    }

    /// Open the configured backend.
    pub async fn open(&self, data_dir: &Path) -> Result<Arc<dyn QueueStorage>, StorageError> {
        let path = self.resolve_path(data_dir);
        match self.backend {
            StorageBackend::File => Ok(Arc::new(FileStorage::new(path))),
            StorageBackend::Sqlite => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StorageError::io(parent, e))?;
                }
                Ok(Arc::new(SqliteStorage::new(&path).await?))
            }
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value parsed but is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
