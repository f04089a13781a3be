//! Cursor-based pagination for the admin `list` operation.

use serde::{Deserialize, Serialize};

/// A request for a page of queue items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorRequest {
    /// Opaque cursor from a previous response; `None` starts from the head.
    pub cursor: Option<String>,
    /// Items to return, clamped to `[1, MAX_LIMIT]`.
    pub limit: usize,
}

impl CursorRequest {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    #[must_use]
    pub fn new(cursor: Option<String>, limit: usize) -> Self {
        Self {
            cursor,
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for CursorRequest {
    fn default() -> Self {
        Self::new(None, Self::DEFAULT_LIMIT)
    }
}

/// A page of results addressed by an opaque offset-encoded cursor.
///
/// The cursor is the starting index for the next page, base10-encoded; it
/// is opaque to callers by contract even though the encoding is simple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Encodes a plain list-offset into the opaque cursor format.
#[must_use]
pub fn encode_offset_cursor(offset: usize) -> String {
    offset.to_string()
}

/// Decodes an offset cursor; an invalid cursor is treated as offset zero.
#[must_use]
pub fn decode_offset_cursor(cursor: Option<&str>) -> usize {
    cursor.and_then(|c| c.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_request_clamps_limit() {
        let req = CursorRequest::new(None, 5000);
        assert_eq!(req.limit, CursorRequest::MAX_LIMIT);
        let req = CursorRequest::new(None, 0);
        assert_eq!(req.limit, 1);
    }

    #[test]
    fn cursor_request_default() {
        let req = CursorRequest::default();
        assert_eq!(req.limit, CursorRequest::DEFAULT_LIMIT);
        assert!(req.cursor.is_none());
    }

    #[test]
    fn offset_cursor_round_trips() {
        let encoded = encode_offset_cursor(42);
        assert_eq!(decode_offset_cursor(Some(&encoded)), 42);
    }

    #[test]
    fn invalid_cursor_decodes_to_zero() {
        assert_eq!(decode_offset_cursor(Some("not-a-number")), 0);
        assert_eq!(decode_offset_cursor(None), 0);
    }

    #[test]
    fn empty_page_has_no_next_cursor() {
        let page: CursorPage<i32> = CursorPage::empty();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
