//! Show queued actions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tally_types::{Action, QueuedAction};

use crate::session::Session;

/// Run the status command.
pub async fn run(session: &Session) -> Result<()> {
    let pending = session.store.snapshot().await;

    println!("=== tally status ===");
    println!();
    println!("Server: {}", session.config.remote.base_url);
    println!(
        "Retries: up to {} attempts per action",
        session.config.queue.max_retries
    );
    println!();

    if pending.is_empty() {
        println!("Queue: empty");
        return Ok(());
    }

    println!("Queue: {} pending", pending.len());
    let now = Utc::now();
    for (i, queued) in pending.iter().enumerate() {
        println!("  {}. {}", i + 1, describe(queued));
        println!(
            "     queued {}, {} failed attempts",
            format_age(queued.created_at, now),
            queued.retry_count
        );
    }

    Ok(())
}

/// One-line summary of an action.
fn describe(queued: &QueuedAction) -> String {
    match &queued.action {
        Action::LogActivity(p) => match &p.note {
            Some(note) => format!("log {} to {} ({})", p.value, p.challenge_id, note),
            None => format!("log {} to {}", p.value, p.challenge_id),
        },
        Action::RespondToInvite(p) => format!("{:?} invite {}", p.response, p.invite_id),
        Action::SendFriendRequest(p) => format!("friend request to {}", p.recipient_id),
    }
}

/// Format an age as a human-readable string.
fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - then).num_seconds().max(0);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
