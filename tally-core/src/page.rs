//! Keyset pagination over activity history.
//!
//! History is ordered by `(created_at DESC, id DESC)`. A page continues
//! strictly after the last row of the previous one: a row belongs to the
//! next page iff
//!
//! ```text
//! created_at < cursor.ts  OR  (created_at == cursor.ts AND id < cursor.id)
//! ```
//!
//! The id tie-breaker is what keeps rows that share a timestamp from being
//! skipped or repeated across a page boundary.

use tally_types::{ActivityRecord, Cursor, PageRequest};
use thiserror::Error;

/// Whether `record` sorts strictly after `cursor` in descending order.
pub fn is_before(record: &ActivityRecord, cursor: &Cursor) -> bool {
    record.sort_key() < cursor.key()
}

/// Cursor pointing just past `record`.
pub fn extract_cursor(record: &ActivityRecord) -> Cursor {
    Cursor::new(record.created_at, record.id)
}

/// Select one page from a full set of rows.
///
/// This is the server-side query expressed over a slice: filter by
/// challenge and cursor, order descending, take `limit`. Used by the mock
/// remote and by tests as the reference behavior.
pub fn select_page(rows: &[ActivityRecord], request: &PageRequest) -> Vec<ActivityRecord> {
    let mut selected: Vec<ActivityRecord> = rows
        .iter()
        .filter(|r| match &request.challenge_id {
            Some(challenge) => &r.challenge_id == challenge,
            None => true,
        })
        .filter(|r| match &request.cursor {
            Some(cursor) => is_before(r, cursor),
            None => true,
        })
        .cloned()
        .collect();

    selected.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
    selected.truncate(request.limit as usize);
    selected
}

/// A page that breaks the ordering contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageViolation {
    /// More rows than requested.
    #[error("page has {returned} rows but limit is {limit}")]
    TooManyRows { returned: usize, limit: u32 },

    /// Row at `index` is not strictly after the row before it.
    #[error("row {index} is not in (created_at DESC, id DESC) order")]
    NotDescending { index: usize },

    /// Row at `index` is not strictly after the request cursor.
    #[error("row {index} is not after the request cursor")]
    NotBeforeCursor { index: usize },
}

/// Check a page returned by the server.
///
/// Rows must be strictly descending, strictly after `cursor` and no more
/// than `limit`. Strictness also rules out a row repeated inside a page.
pub fn validate_page(
    rows: &[ActivityRecord],
    limit: u32,
    cursor: Option<&Cursor>,
) -> Result<(), PageViolation> {
    if rows.len() > limit as usize {
        return Err(PageViolation::TooManyRows {
            returned: rows.len(),
            limit,
        });
    }

    for (index, row) in rows.iter().enumerate() {
        if let Some(cursor) = cursor {
            if !is_before(row, cursor) {
                return Err(PageViolation::NotBeforeCursor { index });
            }
        }
        if index > 0 && row.sort_key() >= rows[index - 1].sort_key() {
            return Err(PageViolation::NotDescending { index });
        }
    }

    Ok(())
}
