//! Pagination extractor for queue/DLQ listing endpoints.

use arcana_core::CursorRequest;
use serde::Deserialize;

/// Query parameters for cursor-based pagination.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<PaginationQuery> for CursorRequest {
    fn from(query: PaginationQuery) -> Self {
        CursorRequest::new(query.cursor, query.limit.unwrap_or(CursorRequest::DEFAULT_LIMIT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_default_limit() {
        let query = PaginationQuery { cursor: None, limit: None };
        let page: CursorRequest = query.into();
        assert_eq!(page.limit, CursorRequest::DEFAULT_LIMIT);
    }

    #[test]
    fn limit_is_clamped_by_cursor_request() {
        let query = PaginationQuery { cursor: None, limit: Some(5_000) };
        let page: CursorRequest = query.into();
        assert_eq!(page.limit, CursorRequest::MAX_LIMIT);
    }
}
