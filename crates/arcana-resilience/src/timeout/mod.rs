//! Timeout wrapper for async operations, used to bound handler execution.

use arcana_core::ArcanaError;
use std::time::Duration;

/// Wraps an async operation with a timeout; a deadline miss counts as a
/// handler failure per the queue's retry/DLQ policy.
pub async fn with_timeout<F, Fut, T>(duration: Duration, f: F) -> Result<T, ArcanaError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ArcanaError>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| ArcanaError::HandlerTimeout(duration))?
}

/// Per-queue handler timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout applied when a queue has no specific override.
    pub default_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_deadline() {
        let result = with_timeout(Duration::from_secs(1), || async { Ok::<_, ArcanaError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn exceeding_deadline_is_a_handler_timeout() {
        let result = with_timeout(Duration::from_millis(10), || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ArcanaError>(42)
        })
        .await;

        assert!(matches!(result, Err(ArcanaError::HandlerTimeout(_))));
    }
}
