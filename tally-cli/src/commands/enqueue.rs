//! Queue actions.
//!
//! Nothing is sent here; `tally drain` or `tally watch` does that.

use anyhow::{Context, Result};
use tally_types::{
    Action, ActionId, LogActivityPayload, RespondToInvitePayload, SendFriendRequestPayload,
};

use crate::session::Session;

/// Queue an activity log entry.
pub async fn log(
    session: &Session,
    challenge_id: &str,
    value: i64,
    note: Option<String>,
) -> Result<ActionId> {
    let mut payload = LogActivityPayload::new(challenge_id, value);
    if let Some(note) = note {
        payload = payload.with_note(note);
    }
    queue(session, payload.into()).await
}

/// Queue an invite answer.
pub async fn respond_invite(session: &Session, invite_id: &str, accept: bool) -> Result<ActionId> {
    let payload = if accept {
        RespondToInvitePayload::accept(invite_id)
    } else {
        RespondToInvitePayload::decline(invite_id)
    };
    queue(session, payload.into()).await
}

/// Queue a friend request.
pub async fn friend_request(session: &Session, recipient_id: &str) -> Result<ActionId> {
    queue(session, SendFriendRequestPayload::new(recipient_id).into()).await
}

async fn queue(session: &Session, action: Action) -> Result<ActionId> {
    let kind = action.kind();
    let event_id = action.client_event_id().clone();
    let id = session
        .store
        .enqueue(action)
        .await
        .context("Failed to queue action")?;

    println!("Queued {} ({})", kind, id);
    println!("  Event: {}", event_id);
    println!("  Pending: {}", session.store.len().await);
    Ok(id)
}
