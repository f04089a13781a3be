//! Exponential backoff with full jitter, used both for job retry scheduling
//! and for wrapping transient store calls.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Retry policy: `delay = min(cap, base * 2^attempts) * uniform(0.5, 1.5)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Full-jitter backoff for the given zero-based attempt count.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempts: u32) -> Duration {
        self.backoff_for_attempt_with_rng(attempts, &mut rand::rng())
    }

    /// Same as `backoff_for_attempt` but with an injectable RNG for tests.
    pub fn backoff_for_attempt_with_rng<R: Rng + ?Sized>(
        &self,
        attempts: u32,
        rng: &mut R,
    ) -> Duration {
        let exp = 2f64.powi(attempts.min(32) as i32);
        let bounded_ms = (self.base.as_millis() as f64 * exp).min(self.cap.as_millis() as f64);
        let jitter: f64 = rng.random_range(0.5..=1.5);
        Duration::from_millis((bounded_ms * jitter) as u64)
    }

    /// Whether the job should be moved to the dead-letter sink instead of
    /// being retried, given the attempt count that is about to be recorded.
    #[must_use]
    pub const fn is_exhausted(&self, next_attempts: u32) -> bool {
        next_attempts >= self.max_attempts
    }

    /// Executes `f`, retrying transient failures up to `max_attempts` with
    /// full-jitter backoff between tries. Used for store calls, not jobs.
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff_for_attempt(attempt);
                debug!(attempt, ?delay, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }

            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!(attempt = attempt + 1, error = %e, "attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.expect("at least one attempt should have been made"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retry_succeeds_immediately() {
        let policy = RetryPolicy::with_max_attempts(3);
        let result: Result<i32, &str> = policy.execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_eventually_succeeds() {
        let policy = RetryPolicy {
            base: Duration::from_millis(1),
            ..RetryPolicy::with_max_attempts(3)
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, &str> = policy
            .execute(|| {
                let attempts = attempts_clone.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhausts_all_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base: Duration::from_millis(1),
            ..Default::default()
        };
        let result: Result<i32, &str> = policy.execute(|| async { Err("always fails") }).await;
        assert!(result.is_err());
    }

    #[test]
    fn backoff_is_bounded_by_cap() {
        let policy = RetryPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(500),
            ..Default::default()
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let delay = policy.backoff_for_attempt_with_rng(10, &mut rng);
        // cap(500) * max jitter(1.5) = 750ms ceiling
        assert!(delay.as_millis() <= 750);
    }

    #[test]
    fn backoff_grows_exponentially_before_cap() {
        let policy = RetryPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(60),
            ..Default::default()
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let d0 = policy.backoff_for_attempt_with_rng(0, &mut rng);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let d3 = policy.backoff_for_attempt_with_rng(3, &mut rng);
        assert!(d3 > d0);
    }

    #[test]
    fn exhaustion_threshold() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
