//! Cursor pager for activity history.
//!
//! Stateless: the caller keeps the cursor between calls. Each page is
//! checked against the ordering contract before it is returned, so a
//! misbehaving server shows up as an error rather than as skipped or
//! repeated rows.

use crate::remote::{RemoteApi, RpcError};
use std::sync::Arc;
use tally_core::page::{extract_cursor, validate_page, PageViolation};
use tally_types::{ActivityRecord, Cursor, PageRequest};
use thiserror::Error;

/// Pager errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagerError {
    /// A page size of zero can never make progress.
    #[error("page limit must be at least 1")]
    InvalidLimit,

    /// The remote call failed.
    #[error("history request failed: {0}")]
    Rpc(#[from] RpcError),

    /// The server returned rows out of order.
    #[error("server broke the paging contract: {0}")]
    ContractViolation(#[from] PageViolation),
}

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Rows in `(created_at DESC, id DESC)` order.
    pub records: Vec<ActivityRecord>,
}

impl Page {
    /// Cursor for the following page, or `None` once history is exhausted.
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.records.last().map(extract_cursor)
    }

    /// An empty page marks the end of history.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Fetches history pages through a [`RemoteApi`].
#[derive(Clone)]
pub struct CursorPager {
    remote: Arc<dyn RemoteApi>,
    challenge_id: Option<String>,
}

impl CursorPager {
    /// Pager over all of the user's history.
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            remote,
            challenge_id: None,
        }
    }

    /// Restrict to one challenge.
    pub fn for_challenge(mut self, challenge_id: impl Into<String>) -> Self {
        self.challenge_id = Some(challenge_id.into());
        self
    }

    /// Fetch up to `limit` rows strictly after `cursor`.
    ///
    /// Pass `None` for the first page. No retries; errors propagate.
    pub async fn fetch_page(
        &self,
        limit: u32,
        cursor: Option<&Cursor>,
    ) -> Result<Page, PagerError> {
        if limit == 0 {
            return Err(PagerError::InvalidLimit);
        }

        let request = PageRequest {
            limit,
            cursor: cursor.copied(),
            challenge_id: self.challenge_id.clone(),
        };
        let records = self.remote.fetch_activity_page(&request).await?;

        if let Err(violation) = validate_page(&records, limit, cursor) {
            tracing::warn!("Rejected history page: {}", violation);
            return Err(violation.into());
        }

        tracing::debug!("Fetched history page with {} rows", records.len());
        Ok(Page { records })
    }

    /// Walk every page and return the whole history.
    pub async fn fetch_all(&self, limit: u32) -> Result<Vec<ActivityRecord>, PagerError> {
        let mut all = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.fetch_page(limit, cursor.as_ref()).await?;
            let Some(next) = page.next_cursor() else {
                break;
            };
            cursor = Some(next);
            all.extend(page.records);
        }
        Ok(all)
    }
}
