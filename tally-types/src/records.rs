//! Activity history rows and the composite pagination cursor.

use crate::{RecordId, RecordTimestamp};
use serde::{Deserialize, Serialize};

/// One row of activity history as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Row id; tie-breaker for equal timestamps.
    pub id: RecordId,
    /// Challenge the activity was logged against.
    pub challenge_id: String,
    /// Who logged it.
    pub user_id: String,
    /// Amount logged.
    pub value: i64,
    /// Optional note.
    #[serde(default)]
    pub note: Option<String>,
    /// Server-assigned insertion time, full precision.
    pub created_at: RecordTimestamp,
}

impl ActivityRecord {
    /// The `(timestamp, id)` pair history is ordered by.
    pub fn sort_key(&self) -> (RecordTimestamp, RecordId) {
        (self.created_at, self.id)
    }
}

/// Position after which the next page starts.
///
/// Holds the timestamp and id of the last row of the previous page. Rows
/// are requested strictly before `(before_timestamp, before_id)` in
/// `(timestamp DESC, id DESC)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Timestamp of the last row seen.
    pub before_timestamp: RecordTimestamp,
    /// Id of the last row seen.
    pub before_id: RecordId,
}

impl Cursor {
    /// Create a cursor from its two parts.
    pub fn new(before_timestamp: RecordTimestamp, before_id: RecordId) -> Self {
        Self {
            before_timestamp,
            before_id,
        }
    }

    /// The cursor as an ordering key.
    pub fn key(&self) -> (RecordTimestamp, RecordId) {
        (self.before_timestamp, self.before_id)
    }
}

/// Parameters of one history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum rows to return.
    pub limit: u32,
    /// Continue after this row; `None` for the first page.
    pub cursor: Option<Cursor>,
    /// Restrict to one challenge.
    pub challenge_id: Option<String>,
}
