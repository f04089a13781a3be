//! Small capability traits shared across the queue runtime.
//!
//! Per the redesign notes: components take these as constructor arguments
//! instead of reaching into global state, so tests can swap in fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Abstracts wall-clock time so tests can control it deterministically.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, the unit used by delayed-set
    /// scores and lease TTLs.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The system clock, used everywhere outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Trait for components that report their own liveness for `/readyz`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Name shown in readiness diagnostics.
    fn name(&self) -> &str;

    /// Performs the health check.
    async fn check(&self) -> HealthStatus;
}

/// Health check outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    #[must_use]
    pub const fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now_millis();
        assert!(b >= a);
    }

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(HealthStatus::Unhealthy("down".into()).is_unhealthy());
        assert!(!HealthStatus::Degraded("slow".into()).is_healthy());
    }
}
