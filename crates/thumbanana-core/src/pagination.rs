// ABOUTME: Cursor-based pagination for generation history listings
// ABOUTME: Encodes (created_at_millis, id) positions into opaque URL-safe cursors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{self, Display, Formatter};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::history::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Opaque pagination cursor pointing just past the last item of a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Cursor(String);

/// Decoded cursor position: the sort key of the last item returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    /// Creation time in epoch milliseconds
    pub created_at_millis: i64,
    /// Item ID used as tie-breaker for identical timestamps
    pub id: String,
}

impl Cursor {
    /// Create a new cursor from the last item's timestamp and ID
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, id: &str) -> Self {
        let cursor_data = format!("{}:{id}", timestamp.timestamp_millis());
        Self(URL_SAFE_NO_PAD.encode(cursor_data.as_bytes()))
    }

    /// Decode the cursor into its position
    ///
    /// Returns `None` if the cursor is not one this module produced
    #[must_use]
    pub fn decode(&self) -> Option<CursorPosition> {
        let decoded = URL_SAFE_NO_PAD.decode(&self.0).ok()?;
        let decoded_str = String::from_utf8(decoded).ok()?;

        let (millis, id) = decoded_str.split_once(':')?;
        if id.is_empty() {
            return None;
        }

        Some(CursorPosition {
            created_at_millis: millis.parse().ok()?,
            id: id.to_owned(),
        })
    }

    /// Get the raw cursor string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a raw cursor string received from a client
    #[must_use]
    pub const fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of results plus the cursor to fetch the next one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage<T> {
    /// The items in this page
    pub items: Vec<T>,
    /// Cursor pointing to the next page (if available)
    pub next_cursor: Option<Cursor>,
    /// Whether there are more items after this page
    pub has_more: bool,
    /// Number of items in this page
    pub count: usize,
}

impl<T> CursorPage<T> {
    /// Create a new cursor page
    #[must_use]
    pub const fn new(items: Vec<T>, next_cursor: Option<Cursor>, has_more: bool) -> Self {
        let count = items.len();
        Self {
            items,
            next_cursor,
            has_more,
            count,
        }
    }

    /// Create an empty page
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
            count: 0,
        }
    }
}

/// Pagination parameters for newest-first history queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Cursor to continue from (exclusive)
    pub cursor: Option<Cursor>,
    /// Maximum number of items to return, always within `1..=MAX_PAGE_SIZE`
    pub limit: usize,
}

impl PaginationParams {
    /// Build parameters, clamping the limit into the accepted range
    #[must_use]
    pub fn new(cursor: Option<Cursor>, limit: Option<usize>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self { cursor, limit }
    }

    /// First page with the default page size
    #[must_use]
    pub fn first_page() -> Self {
        Self::new(None, None)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::first_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_decodes_to_position() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let cursor = Cursor::new(ts, "abc:def");

        let position = cursor.decode().unwrap();
        assert_eq!(position.created_at_millis, 1_700_000_000_123);
        assert_eq!(position.id, "abc:def");
    }

    #[test]
    fn test_garbage_cursor_is_rejected() {
        assert!(Cursor::from_string("not base64!".to_owned()).decode().is_none());
        let no_id = URL_SAFE_NO_PAD.encode(b"12345:");
        assert!(Cursor::from_string(no_id).decode().is_none());
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PaginationParams::new(None, None).limit, DEFAULT_PAGE_SIZE);
        assert_eq!(PaginationParams::new(None, Some(0)).limit, 1);
        assert_eq!(PaginationParams::new(None, Some(500)).limit, MAX_PAGE_SIZE);
    }
}
