//! # Arcana Admin
//!
//! Admin HTTP surface for the Arcana job queue: dashboard stats, queue and
//! dead-letter inspection, worker listing, health/readiness probes,
//! Prometheus metrics exposition, and the confirmation-gated destructive
//! operations (requeue, dead-letter purge, purge-all).

pub mod controllers;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::{AdminError, AdminResult};
pub use router::create_router;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CachedResponse;
    use arcana_jobs::{JobsConfig, Runtime};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::json;
    use std::sync::Arc;

    fn test_config() -> JobsConfig {
        let mut config = JobsConfig::default();
        config.store.addr = "redis://127.0.0.1:6390".to_string();
        config.admin.auth_token = Some("test-token".to_string());
        config
    }

    #[tokio::test]
    async fn router_builds_without_a_live_redis_connection() {
        // `Runtime::connect` pings Redis, so this test only exercises the
        // parts of construction that don't require a live server: the pool
        // itself connects lazily.
        let pool = deadpool_redis::Config::from_url("redis://127.0.0.1:6390")
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .unwrap();
        let config = test_config();
        let store = Arc::new(arcana_jobs::RedisStore::new(
            pool.clone(),
            config.store.key_prefix.clone(),
            config.idempotency.default_ttl(),
            config.worker.anti_starvation_n,
        ));
        let registry = Arc::new(arcana_jobs::WorkerRegistry::new(pool.clone(), config.store.key_prefix.clone()));
        let status = Arc::new(arcana_jobs::StatusReader::new(store.clone(), registry.clone()));
        let runtime = Arc::new(Runtime {
            config,
            clock: Arc::new(arcana_core::SystemClock),
            pool,
            store,
            registry,
            status,
        });

        let recorder = PrometheusBuilder::new().build_recorder();
        let metrics_handle = recorder.handle();
        let state = AppState::new(runtime, metrics_handle);
        let _router = create_router(state);
    }

    #[test]
    fn cached_response_round_trips_through_json() {
        let cached = CachedResponse {
            status: 200,
            body: json!({"purged": 3}),
        };
        let serialized = serde_json::to_string(&cached).unwrap();
        let restored: CachedResponse = serde_json::from_str(&serialized).unwrap();
        assert_eq!(restored.status, 200);
        assert_eq!(restored.body["purged"], 3);
    }
}
