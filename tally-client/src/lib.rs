//! # tally-client
//!
//! Offline-first plumbing for the Tally app.
//!
//! User mutations are queued locally and replayed against the server when
//! it can be reached. History is read with a keyset cursor that never skips
//! or repeats rows.
//!
//! ## Features
//!
//! - **Durable queue**: [`ActionQueueStore`] persists every mutation before
//!   it returns ([`FileStorage`], [`SqliteStorage`], [`MemoryStorage`])
//! - **Idempotent replay**: [`SyncProcessor`] resends the stored payload with
//!   its idempotency key, so a lost response never applies twice
//! - **Bounded retries**: failing actions are dropped after a configurable
//!   number of attempts and reported as [`TerminalFailure`]s
//! - **Cursor paging**: [`CursorPager`] over `(created_at, id)`
//! - **Scheduling**: [`spawn_drain_scheduler`] for timer and event driven drains
//!
//! ## Example
//!
//! ```ignore
//! use tally_client::{ActionQueueStore, FileStorage, HttpRemote, SyncProcessor};
//!
//! let store = Arc::new(ActionQueueStore::open(Arc::new(FileStorage::new(dir))).await?);
//! store.enqueue(LogActivityPayload::new("challenge-1", 5)).await?;
//!
//! let processor = SyncProcessor::new(store, Arc::new(HttpRemote::new(&config.remote)?), Default::default());
//! let report = processor.drain().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod pager;
pub mod processor;
pub mod remote;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use config::{Config, ConfigError, StorageBackend};
pub use error::{ClientError, StorageError};
pub use pager::{CursorPager, Page, PagerError};
pub use processor::{ProcessorConfig, SyncProcessor};
pub use remote::{ApplyOutcome, HttpRemote, MockRemote, RemoteApi, RpcError, Scripted};
pub use scheduler::{spawn_drain_scheduler, DrainTrigger, SchedulerHandle};
pub use storage::{FileStorage, MemoryStorage, QueueStorage, SqliteStorage, QUEUE_KEY};
pub use store::ActionQueueStore;
pub use tally_core::{DrainReport, EvictReason, TerminalFailure};
