//! Drop every queued action.

use anyhow::{Context, Result};

use crate::session::Session;

/// Run the clear command. Returns how many actions were dropped.
pub async fn run(session: &Session) -> Result<usize> {
    let dropped = session.store.len().await;
    session
        .store
        .clear()
        .await
        .context("Failed to clear queue")?;

    if dropped == 0 {
        println!("Queue already empty.");
    } else {
        println!("Dropped {} queued actions.", dropped);
    }
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::enqueue;
    use crate::session::tests::mock_session;
    use tempfile::tempdir;

    #[tokio::test]
    async fn clear_empties_queue_on_disk() {
        let dir = tempdir().unwrap();
        {
            let session = mock_session(dir.path()).await;
            enqueue::friend_request(&session, "u1").await.unwrap();
            enqueue::friend_request(&session, "u2").await.unwrap();
            assert_eq!(run(&session).await.unwrap(), 2);
        }

        let session = mock_session(dir.path()).await;
        assert!(session.store.is_empty().await);
        assert_eq!(run(&session).await.unwrap(), 0);
    }
}
