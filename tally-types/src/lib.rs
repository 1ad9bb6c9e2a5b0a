//! # tally-types
//!
//! Data types shared by every Tally crate.
//!
//! This crate provides:
//! - [`ActionId`], [`EventId`], [`RecordId`] - identity types
//! - [`RecordTimestamp`] - server timestamps kept at full precision
//! - [`Action`], [`QueuedAction`] - the closed set of offline mutations
//! - [`ActivityRecord`], [`Cursor`], [`PageRequest`] - paginated history
//! - [`TypesError`] - parse errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod actions;
mod error;
mod ids;
mod records;
mod timestamp;

pub use actions::{
    Action, ActionKind, InviteResponse, LogActivityPayload, QueuedAction,
    RespondToInvitePayload, SendFriendRequestPayload,
};
pub use error::TypesError;
pub use ids::{ActionId, EventId, RecordId};
pub use records::{ActivityRecord, Cursor, PageRequest};
pub use timestamp::RecordTimestamp;
