//! Job error types, mapped onto the queue runtime's error taxonomy.

use thiserror::Error;

pub type JobResult<T> = Result<T, JobError>;

/// Job-related errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    HandlerFailed(String),

    /// The handler exceeded its configured timeout.
    #[error("handler timed out after {0:?}")]
    HandlerTimeout(std::time::Duration),

    /// Serialization error (codec boundary).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store command failed transiently; caller should retry with backoff.
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Pool exhausted or connection could not be established.
    #[error("store pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Referenced job does not exist (already acked, or never existed).
    #[error("job not found: {0}")]
    NotFound(String),

    /// Rejected at the producer API boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Queue name not present in this deployment's configuration.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// The circuit breaker for a queue is open.
    #[error("circuit breaker open for queue {0}")]
    BreakerOpen(String),

    /// The rate limiter denied the reservation.
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Attempts reached `max_attempts`; job is being moved to the DLQ.
    #[error("max attempts exceeded for job {job_id}: {attempts} attempts, last error: {last_error}")]
    MaxAttemptsExceeded {
        job_id: String,
        attempts: u32,
        last_error: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Whether this error should be retried with backoff rather than
    /// immediately surfaced.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Pool(_))
    }

    /// The taxonomy kind name used in structured logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Store(_) | Self::Pool(_) => "transient_store",
            Self::HandlerFailed(_) => "handler_failure",
            Self::HandlerTimeout(_) => "handler_timeout",
            Self::Validation(_) | Self::UnknownQueue(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::BreakerOpen(_) => "breaker_open",
            Self::RateLimited { .. } => "rate_limited",
            Self::MaxAttemptsExceeded { .. } => "dead_letter",
            Self::Serialization(_) | Self::Configuration(_) | Self::Internal(_) => "internal",
        }
    }
}

impl From<arcana_core::ArcanaError> for JobError {
    fn from(err: arcana_core::ArcanaError) -> Self {
        match err {
            arcana_core::ArcanaError::TransientStore(msg) => {
                Self::Internal(format!("transient store: {msg}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Maps a `JobError` back onto the shared taxonomy for the admin surface,
/// which speaks `ArcanaError` rather than this crate's internal error type.
impl From<JobError> for arcana_core::ArcanaError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => Self::not_found("job", id),
            JobError::Validation(msg) | JobError::UnknownQueue(msg) => Self::validation(msg),
            JobError::BreakerOpen(queue) => Self::BreakerOpen(queue),
            JobError::RateLimited { retry_after_ms } => Self::RateLimited { retry_after_ms },
            JobError::Store(e) => Self::TransientStore(e.to_string()),
            JobError::Pool(e) => Self::TransientStore(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retried() {
        assert!(JobError::Pool(deadpool_redis::PoolError::Closed).is_transient());
        assert!(!JobError::Validation("bad".into()).is_transient());
    }

    #[test]
    fn converts_to_arcana_error_for_the_admin_surface() {
        let err: arcana_core::ArcanaError = JobError::NotFound("abc".into()).into();
        assert_eq!(err.error_code(), "not_found");
        let err: arcana_core::ArcanaError = JobError::RateLimited { retry_after_ms: 10 }.into();
        assert_eq!(err.error_code(), "rate_limited");
    }

    #[test]
    fn kinds_match_taxonomy() {
        assert_eq!(JobError::HandlerFailed("x".into()).kind(), "handler_failure");
        assert_eq!(JobError::BreakerOpen("q".into()).kind(), "breaker_open");
        assert_eq!(
            JobError::RateLimited { retry_after_ms: 5 }.kind(),
            "rate_limited"
        );
    }
}
