//! Unified error taxonomy shared by every queue-runtime crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the queue runtime.
///
/// Each variant maps onto one kind of the error taxonomy: store errors are
/// split into transient (retry with backoff) and fatal (process gives up and
/// drops out of readiness); everything else is a terminal classification
/// surfaced to callers or turned into a job-state transition.
#[derive(Error, Debug)]
pub enum ArcanaError {
    /// A store command failed in a way that is expected to be transient
    /// (connection reset, timeout, `-LOADING`). Callers retry with backoff.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// The store has failed repeatedly past the configured threshold; the
    /// owning component should drop out of `/readyz`.
    #[error("fatal store error: {0}")]
    FatalStore(String),

    /// Resource not found.
    #[error("not found: {resource_type} {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Request failed validation at an API boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Not an error condition: an idempotency-key dedup hit.
    #[error("duplicate request")]
    Duplicate,

    /// A job handler returned an error or panicked.
    #[error("handler failure: {0}")]
    HandlerFailure(String),

    /// A job handler exceeded its configured timeout.
    #[error("handler timed out after {0:?}")]
    HandlerTimeout(std::time::Duration),

    /// The circuit breaker for a queue is open.
    #[error("circuit breaker open for queue {0}")]
    BreakerOpen(String),

    /// The rate limiter denied the reservation.
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// State conflict (e.g. confirmation-phrase mismatch).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No credentials, or credentials that don't parse as a bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Valid credentials, insufficient scope for the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Generic error wrapper for boundary code (CLI, startup).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArcanaError {
    /// Returns the HTTP status code appropriate for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::Duplicate => 200,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::RateLimited { .. } => 429,
            Self::BreakerOpen(_) | Self::TransientStore(_) | Self::HandlerTimeout(_) => 503,
            Self::FatalStore(_) | Self::HandlerFailure(_) | Self::Configuration(_) | Self::Internal(_) | Self::Other(_) => 500,
        }
    }

    /// Returns the machine-readable error code used on the admin surface.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Duplicate => "duplicate",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
            Self::BreakerOpen(_) => "breaker_open",
            Self::TransientStore(_) | Self::FatalStore(_) => "internal_error",
            Self::HandlerFailure(_) => "handler_failure",
            Self::HandlerTimeout(_) => "handler_timeout",
            Self::Configuration(_) | Self::Internal(_) | Self::Other(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn unauthorized<T: Into<String>>(message: T) -> Self {
        Self::Unauthorized(message.into())
    }

    #[must_use]
    pub fn forbidden<T: Into<String>>(message: T) -> Self {
        Self::Forbidden(message.into())
    }

    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error should be retried with backoff rather than
    /// surfaced as a terminal failure.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}

impl From<redis::RedisError> for ArcanaError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::TransientStore(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ArcanaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("json error: {err}"))
    }
}

/// Serializable error body returned by the admin HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (see `ArcanaError::error_code`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Request id echoed back so operators can correlate logs.
    pub request_id: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn from_error(error: &ArcanaError, request_id: impl Into<String>) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            request_id: request_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ArcanaError::not_found("job", "abc").status_code(), 404);
        assert_eq!(ArcanaError::validation("bad").status_code(), 400);
        assert_eq!(ArcanaError::RateLimited { retry_after_ms: 10 }.status_code(), 429);
        assert_eq!(ArcanaError::BreakerOpen("q".into()).status_code(), 503);
        assert_eq!(ArcanaError::unauthorized("no token").status_code(), 401);
        assert_eq!(ArcanaError::forbidden("missing scope").status_code(), 403);
    }

    #[test]
    fn error_codes() {
        assert_eq!(ArcanaError::conflict("mismatch").error_code(), "conflict");
        assert_eq!(ArcanaError::Duplicate.error_code(), "duplicate");
        assert_eq!(
            ArcanaError::HandlerTimeout(std::time::Duration::from_secs(1)).error_code(),
            "handler_timeout"
        );
    }

    #[test]
    fn retriable_only_transient_store() {
        assert!(ArcanaError::TransientStore("x".into()).is_retriable());
        assert!(!ArcanaError::FatalStore("x".into()).is_retriable());
        assert!(!ArcanaError::validation("x").is_retriable());
    }

    #[test]
    fn error_response_carries_request_id() {
        let err = ArcanaError::not_found("job", "abc");
        let resp = ErrorResponse::from_error(&err, "req-1");
        assert_eq!(resp.code, "not_found");
        assert_eq!(resp.request_id, "req-1");
    }
}
