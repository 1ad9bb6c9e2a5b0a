//! Error types for tally-types.

use thiserror::Error;

/// Errors raised while parsing identifiers and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Not a valid UUID.
    #[error("invalid id {value:?}: {reason}")]
    InvalidId {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Idempotency key is empty, too long, or has forbidden characters.
    #[error("invalid client event id {value:?}: {reason}")]
    InvalidEventId {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Timestamp is not RFC 3339.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Parser message.
        reason: String,
    },
}
