//! Remote API abstraction.
//!
//! The sync processor and the pager only see [`RemoteApi`]. Two
//! implementations ship with the crate:
//! - [`HttpRemote`]: PostgREST-style RPC over HTTPS
//! - [`MockRemote`]: an in-process server double for tests and demos
//!
//! # Error taxonomy
//!
//! A duplicate submission is not an error: the server answers it with
//! [`ApplyOutcome::AlreadyApplied`] and the action is treated as done.
//! Everything else is an [`RpcError`], which is either transient (retried on
//! a later cycle) or a permanent rejection ([`RpcError::is_permanent`]).

mod http;
mod mock;

pub use http::HttpRemote;
pub use mock::{MockRemote, RemoteCall, Scripted};

use async_trait::async_trait;
use tally_types::{
    ActivityRecord, LogActivityPayload, PageRequest, RespondToInvitePayload,
    SendFriendRequestPayload,
};
use thiserror::Error;

/// Successful answer to a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The server applied the action now.
    Applied,
    /// The server had already applied an action with this idempotency key.
    AlreadyApplied,
}

/// Remote call errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Network failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the call timeout.
    #[error("call timed out")]
    Timeout,

    /// The server refused the action and will keep refusing it.
    #[error("rejected ({code}): {message}")]
    Rejected {
        /// Server error code (SQLSTATE or HTTP status).
        code: String,
        /// Server message.
        message: String,
    },

    /// Server-side failure that may clear up on retry.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Server message.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Whether retrying can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, RpcError::Rejected { .. })
    }
}

/// The server operations the client needs.
///
/// Mutations receive the stored payload unchanged, including its
/// `client_event_id`, so a retry is byte-for-byte the original request.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Record progress against a challenge.
    async fn log_activity(&self, payload: &LogActivityPayload) -> Result<ApplyOutcome, RpcError>;

    /// Accept or decline a challenge invite.
    async fn respond_to_invite(
        &self,
        payload: &RespondToInvitePayload,
    ) -> Result<ApplyOutcome, RpcError>;

    /// Send a friend request.
    async fn send_friend_request(
        &self,
        payload: &SendFriendRequestPayload,
    ) -> Result<ApplyOutcome, RpcError>;

    /// One page of activity history, newest first.
    async fn fetch_activity_page(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<ActivityRecord>, RpcError>;
}
