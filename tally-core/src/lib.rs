//! # tally-core
//!
//! Pure logic for Tally (no I/O, instant tests).
//!
//! This crate holds the rules of the offline queue and the history pager
//! without any network or disk access:
//! - [`ActionQueue`]: the ordered list of pending actions
//! - [`RetryPolicy`]: what happens to an action after each attempt
//! - [`DrainReport`]: counts for one drain cycle
//! - [`page`]: the `(timestamp, id)` cursor ordering and page checks
//!
//! The actual I/O (persistence, RPC calls) is performed by `tally-client`,
//! which drives these types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod page;
pub mod queue;
pub mod report;
pub mod retry;

pub use page::{extract_cursor, is_before, select_page, validate_page, PageViolation};
pub use queue::ActionQueue;
pub use report::{DrainReport, TerminalFailure};
pub use retry::{backoff_delay, EvictReason, FailureDisposition, RetryPolicy, DEFAULT_MAX_RETRIES};
