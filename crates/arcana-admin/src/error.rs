//! Maps `ArcanaError` onto the admin surface's `{code, message, request_id}`
//! response envelope.

use arcana_core::{ArcanaError, ErrorResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Wraps `ArcanaError` so it can be returned directly from an Axum handler.
#[derive(Debug)]
pub struct AdminError {
    pub error: ArcanaError,
    pub request_id: String,
}

impl AdminError {
    #[must_use]
    pub fn new(error: ArcanaError, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from_error(&self.error, &self.request_id);
        (status, Json(body)).into_response()
    }
}

/// Result type for admin handlers.
pub type AdminResult<T> = Result<T, AdminError>;

/// Reads the request id tower-http's `SetRequestIdLayer` attached to this
/// request, for stamping onto an error response.
#[must_use]
pub fn request_id_string(id: &tower_http::request_id::RequestId) -> String {
    id.header_value().to_str().unwrap_or("unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AdminError::new(ArcanaError::not_found("job", "abc"), "req-1");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AdminError::new(ArcanaError::conflict("confirmation_mismatch"), "req-2");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
