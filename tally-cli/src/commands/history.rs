//! Page through activity history.

use anyhow::{Context, Result};
use tally_types::{ActivityRecord, Cursor, RecordId, RecordTimestamp};

use crate::session::Session;

/// What to fetch.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub challenge: Option<String>,
    pub limit: u32,
    pub cursor: Option<Cursor>,
    pub all: bool,
}

/// Build a cursor from the `--before-ts` and `--before-id` values.
pub fn parse_cursor(timestamp: &str, id: &str) -> Result<Cursor> {
    let before_timestamp = RecordTimestamp::parse(timestamp).context("Invalid --before-ts")?;
    let before_id: RecordId = id.parse().context("Invalid --before-id")?;
    Ok(Cursor::new(before_timestamp, before_id))
}

/// Run the history command.
pub async fn run(session: &Session, query: &HistoryQuery) -> Result<Vec<ActivityRecord>> {
    let mut pager = session.pager();
    if let Some(challenge) = &query.challenge {
        pager = pager.for_challenge(challenge.clone());
    }

    if query.all {
        let records = pager
            .fetch_all(query.limit)
            .await
            .context("Failed to fetch history")?;
        print_records(&records);
        println!("{} rows", records.len());
        return Ok(records);
    }

    let page = pager
        .fetch_page(query.limit, query.cursor.as_ref())
        .await
        .context("Failed to fetch history")?;
    print_records(&page.records);

    match page.next_cursor() {
        Some(next) => {
            println!();
            println!("Next page:");
            println!("  {}", next_page_command(query, &next));
        }
        None => println!("No more history."),
    }

    Ok(page.records)
}

/// Command line that continues `query` after `next`.
fn next_page_command(query: &HistoryQuery, next: &Cursor) -> String {
    let mut command = String::from("tally history");
    if let Some(challenge) = &query.challenge {
        command.push_str(&format!(" --challenge {}", challenge));
    }
    command.push_str(&format!(
        " --limit {} --before-ts {} --before-id {}",
        query.limit, next.before_timestamp, next.before_id
    ));
    command
}

fn print_records(records: &[ActivityRecord]) {
    for record in records {
        print!(
            "{}  {}  {:>6}  {}",
            record.created_at, record.id, record.value, record.challenge_id
        );
        match &record.note {
            Some(note) => println!("  {}", note),
            None => println!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{drain, enqueue};
    use crate::session::tests::mock_session;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn query(limit: u32) -> HistoryQuery {
        HistoryQuery {
            challenge: None,
            limit,
            cursor: None,
            all: false,
        }
    }

    #[test]
    fn parse_cursor_keeps_sub_second_precision() {
        let cursor = parse_cursor(
            "2024-05-01T10:00:00.123456Z",
            "00000000-0000-0000-0000-000000000007",
        )
        .unwrap();

        assert_eq!(cursor.before_id, RecordId::from_u128(7));
        assert_eq!(
            cursor.before_timestamp,
            RecordTimestamp::parse("2024-05-01T10:00:00.123456Z").unwrap()
        );
    }

    #[test]
    fn parse_cursor_rejects_garbage() {
        assert!(parse_cursor("yesterday", "00000000-0000-0000-0000-000000000007").is_err());
        assert!(parse_cursor("2024-05-01T10:00:00Z", "not-a-uuid").is_err());
    }

    #[test]
    fn next_page_command_keeps_challenge_scope() {
        let next = parse_cursor(
            "2024-05-01T10:00:00.25Z",
            "00000000-0000-0000-0000-000000000003",
        )
        .unwrap();
        let scoped = HistoryQuery {
            challenge: Some("swim".into()),
            ..query(2)
        };

        assert_eq!(
            next_page_command(&scoped, &next),
            format!(
                "tally history --challenge swim --limit 2 --before-ts {} --before-id {}",
                next.before_timestamp, next.before_id
            )
        );
        assert!(!next_page_command(&query(2), &next).contains("--challenge"));
    }

    #[tokio::test]
    async fn following_printed_cursors_visits_every_row_once() {
        let dir = tempdir().unwrap();
        let session = mock_session(dir.path()).await;

        let mut seen = HashSet::new();
        let mut q = query(2);
        loop {
            let rows = run(&session, &q).await.unwrap();
            let Some(last) = rows.last() else {
                break;
            };
            for row in &rows {
                assert!(seen.insert(row.id), "row {} returned twice", row.id);
            }
            q.cursor = Some(Cursor::new(last.created_at, last.id));
        }

        assert_eq!(seen.len(), 6);
    }

    #[tokio::test]
    async fn all_with_challenge_filter() {
        let dir = tempdir().unwrap();
        let session = mock_session(dir.path()).await;

        let rows = run(
            &session,
            &HistoryQuery {
                challenge: Some("swim".into()),
                limit: 1,
                cursor: None,
                all: true,
            },
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.challenge_id == "swim"));
    }

    #[tokio::test]
    async fn zero_limit_is_an_error() {
        let dir = tempdir().unwrap();
        let session = mock_session(dir.path()).await;
        assert!(run(&session, &query(0)).await.is_err());
    }

    #[tokio::test]
    async fn drained_activity_shows_up_first() {
        let dir = tempdir().unwrap();
        let session = mock_session(dir.path()).await;
        enqueue::log(&session, "run", 42, Some("evening".into()))
            .await
            .unwrap();
        drain::run(&session).await.unwrap();

        let rows = run(&session, &query(1)).await.unwrap();

        assert_eq!(rows[0].value, 42);
        assert_eq!(rows[0].note.as_deref(), Some("evening"));
    }
}
