//! Per-queue circuit breaker: closed/open/half-open gating reservation
//! attempts ahead of the store, evaluated in the worker, advisory only.

use arcana_core::ArcanaError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Sliding window over which failure ratio is computed.
    pub window: Duration,
    /// Failure ratio at or above which the breaker trips.
    pub trip_ratio: f64,
    /// Minimum samples in the window before `trip_ratio` is evaluated.
    pub min_samples: u64,
    /// How long the breaker stays open before allowing a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            trip_ratio: 0.5,
            min_samples: 20,
            cooldown: Duration::from_secs(30),
        }
    }
}

struct Samples {
    window: Duration,
    entries: VecDeque<(Instant, bool)>,
}

impl Samples {
    fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    fn record(&mut self, success: bool) {
        let now = Instant::now();
        self.entries.push_back((now, success));
        self.trim(now);
    }

    fn trim(&mut self, now: Instant) {
        while let Some(&(ts, _)) = self.entries.front() {
            if now.duration_since(ts) > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn failure_ratio(&mut self) -> (f64, u64) {
        let now = Instant::now();
        self.trim(now);
        let total = self.entries.len() as u64;
        if total == 0 {
            return (0.0, 0);
        }
        let failures = self.entries.iter().filter(|(_, ok)| !ok).count() as u64;
        (failures as f64 / total as f64, total)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Circuit breaker gating reservations for a single queue.
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    opened_at: Mutex<Option<Instant>>,
    samples: Mutex<Samples>,
    probe_in_flight: AtomicBool,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let window = config.window;
        Self {
            name: name.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            opened_at: Mutex::new(None),
            samples: Mutex::new(Samples::new(window)),
            probe_in_flight: AtomicBool::new(false),
            config,
        }
    }

    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes `f` under breaker protection, recording the outcome.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow_request().await {
            return Err(CircuitBreakerError::Open(self.name.clone()));
        }

        match f().await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(e) => {
                self.record_failure().await;
                Err(CircuitBreakerError::Failure(e))
            }
        }
    }

    async fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = *self.opened_at.lock().await;
                if let Some(t) = opened_at {
                    if t.elapsed() >= self.config.cooldown {
                        self.state.store(CircuitState::HalfOpen as u8, Ordering::SeqCst);
                        self.probe_in_flight.store(false, Ordering::SeqCst);
                        debug!(breaker = %self.name, "transitioning to half-open");
                        return self.try_take_probe_slot();
                    }
                }
                false
            }
            CircuitState::HalfOpen => self.try_take_probe_slot(),
        }
    }

    /// Exactly one probe is admitted per half-open period.
    fn try_take_probe_slot(&self) -> bool {
        self.probe_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.samples.lock().await.record(true);
            }
            CircuitState::HalfOpen => {
                self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
                self.samples.lock().await.clear();
                self.probe_in_flight.store(false, Ordering::SeqCst);
                debug!(breaker = %self.name, "closed after successful probe");
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let (ratio, total) = {
                    let mut samples = self.samples.lock().await;
                    samples.record(false);
                    samples.failure_ratio()
                };
                if total >= self.config.min_samples && ratio >= self.config.trip_ratio {
                    self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
                    *self.opened_at.lock().await = Some(Instant::now());
                    warn!(breaker = %self.name, ratio, total, "opened on failure ratio");
                }
            }
            CircuitState::HalfOpen => {
                self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
                *self.opened_at.lock().await = Some(Instant::now());
                self.probe_in_flight.store(false, Ordering::SeqCst);
                warn!(breaker = %self.name, "reopened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Resets the breaker to closed state, clearing its sample window.
    pub async fn reset(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
        self.samples.lock().await.clear();
        *self.opened_at.lock().await = None;
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    /// Numeric state for the `circuit_breaker_state{queue}` gauge.
    #[must_use]
    pub fn state_gauge_value(&self) -> u8 {
        self.state() as u8
    }
}

/// Error type for circuit-breaker-wrapped operations.
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    Open(String),
    Failure(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(name) => write!(f, "circuit breaker '{name}' is open"),
            Self::Failure(e) => write!(f, "operation failed: {e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(_) => None,
            Self::Failure(e) => Some(e),
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for ArcanaError
where
    E: std::fmt::Display,
{
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::Open(name) => ArcanaError::BreakerOpen(name),
            CircuitBreakerError::Failure(e) => ArcanaError::HandlerFailure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_allows_calls() {
        let cb = CircuitBreaker::with_defaults("test");
        let result = cb.call(|| async { Ok::<i32, &str>(42) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_once_ratio_and_samples_exceeded() {
        let config = CircuitBreakerConfig {
            min_samples: 4,
            trip_ratio: 0.5,
            ..Default::default()
        };
        let cb = CircuitBreaker::new("test", config);

        for _ in 0..2 {
            let _ = cb.call(|| async { Ok::<i32, &str>(1) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<i32, &str>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn stays_closed_below_min_samples_even_if_all_fail() {
        let config = CircuitBreakerConfig {
            min_samples: 20,
            trip_ratio: 0.5,
            ..Default::default()
        };
        let cb = CircuitBreaker::new("test", config);
        for _ in 0..5 {
            let _ = cb.call(|| async { Err::<i32, &str>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_rejects_without_waiting_for_cooldown() {
        let config = CircuitBreakerConfig {
            min_samples: 1,
            trip_ratio: 0.5,
            cooldown: Duration::from_secs(30),
            ..Default::default()
        };
        let cb = CircuitBreaker::new("test", config);
        let _ = cb.call(|| async { Err::<i32, &str>("boom") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb.call(|| async { Ok::<i32, &str>(1) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }

    #[tokio::test]
    async fn half_open_probe_success_closes_breaker() {
        let config = CircuitBreakerConfig {
            min_samples: 1,
            trip_ratio: 0.5,
            cooldown: Duration::from_millis(1),
            ..Default::default()
        };
        let cb = CircuitBreaker::new("test", config);
        let _ = cb.call(|| async { Err::<i32, &str>("boom") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = cb.call(|| async { Ok::<i32, &str>(1) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens() {
        let config = CircuitBreakerConfig {
            min_samples: 1,
            trip_ratio: 0.5,
            cooldown: Duration::from_millis(1),
            ..Default::default()
        };
        let cb = CircuitBreaker::new("test", config);
        let _ = cb.call(|| async { Err::<i32, &str>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = cb.call(|| async { Err::<i32, &str>("boom again") }).await;
        assert!(result.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn state_from_u8_unknown_defaults_closed() {
        assert_eq!(CircuitState::from(0), CircuitState::Closed);
        assert_eq!(CircuitState::from(1), CircuitState::Open);
        assert_eq!(CircuitState::from(2), CircuitState::HalfOpen);
        assert_eq!(CircuitState::from(255), CircuitState::Closed);
    }
}
