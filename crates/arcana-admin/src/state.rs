//! Shared state for the admin HTTP surface.

use arcana_jobs::{AdminConfig, JobResult, Runtime};
use arcana_resilience::{LimiterConfig, RateLimiter};
use metrics_exporter_prometheus::PrometheusHandle;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A cached outcome of a destructive admin write, keyed by its
/// `Idempotency-Key`. A retried request with the same key returns this
/// instead of re-running the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Shared application state for admin handlers, built around one
/// `arcana_jobs::Runtime` rather than a set of DI-resolved services.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<Runtime>,
    pub config: AdminConfig,
    pub metrics_handle: PrometheusHandle,
    rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    #[must_use]
    pub fn new(runtime: Arc<Runtime>, metrics_handle: PrometheusHandle) -> Self {
        let config = runtime.config.admin.clone();
        let rate_limiter = Arc::new(RateLimiter::new(runtime.pool.clone(), runtime.config.store.key_prefix.clone()));
        Self {
            runtime,
            config,
            metrics_handle,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn queues(&self) -> Vec<String> {
        self.runtime.queues()
    }

    /// Applies the configured per-minute budget to `actor` for destructive
    /// admin writes. Read endpoints are not rate limited.
    pub async fn check_rate_limit(&self, actor: &str) -> JobResult<arcana_resilience::RateDecision> {
        let config = LimiterConfig {
            capacity: self.config.rate_limit_per_minute,
            refill_per_s: f64::from(self.config.rate_limit_per_minute) / 60.0,
        };
        let now_ms = self.runtime.clock.now_millis();
        Ok(self.rate_limiter.try_acquire("admin", actor, config, now_ms).await?)
    }

    fn idempotency_key(key: &str) -> String {
        format!("arcana:admin:idem:{key}")
    }

    /// Looks up a previously cached response for `key`, if any.
    pub async fn idempotency_lookup(&self, key: &str) -> JobResult<Option<CachedResponse>> {
        let mut conn = self.runtime.pool.get().await?;
        let raw: Option<String> = conn.get(Self::idempotency_key(key)).await?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Caches `response` under `key` for the idempotency window, so a
    /// retried request with the same `Idempotency-Key` header short-circuits
    /// to this result instead of repeating the operation.
    pub async fn idempotency_store(&self, key: &str, response: &CachedResponse) -> JobResult<()> {
        let mut conn = self.runtime.pool.get().await?;
        let body = serde_json::to_string(response)?;
        let ttl = self.runtime.config.idempotency.default_ttl();
        let _: () = conn.set_ex(Self::idempotency_key(key), body, ttl_secs(ttl)).await?;
        Ok(())
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
