//! Assembles the shared pool, configuration, and clock that every
//! long-running component is built from.
//!
//! Replaces a DI container: callers construct one `Runtime`, then ask it for
//! a `Scheduler`, `Reaper`, or `WorkerPool` wired against the same pool and
//! key prefix rather than resolving each component from a registered module.

use crate::config::JobsConfig;
use crate::error::JobResult;
use crate::reaper::{Reaper, ReaperConfig};
use crate::redis::{create_pool, RedisStore};
use crate::scheduler::Scheduler;
use crate::status::StatusReader;
use crate::worker::{WorkerPool, WorkerPoolConfig};
use crate::worker_registry::WorkerRegistry;
use arcana_core::Clock;
use std::sync::Arc;

/// Owns the Redis pool, the loaded configuration, and a clock, and hands out
/// the runtime components built against them.
pub struct Runtime {
    pub config: JobsConfig,
    pub clock: Arc<dyn Clock>,
    pub pool: deadpool_redis::Pool,
    pub store: Arc<RedisStore>,
    pub registry: Arc<WorkerRegistry>,
    pub status: Arc<StatusReader>,
}

impl Runtime {
    /// Connects to Redis and assembles the runtime using the system clock.
    pub async fn connect(config: JobsConfig) -> JobResult<Self> {
        Self::connect_with_clock(config, Arc::new(arcana_core::SystemClock)).await
    }

    /// Connects to Redis and assembles the runtime using the given clock,
    /// for tests that need to control time.
    pub async fn connect_with_clock(config: JobsConfig, clock: Arc<dyn Clock>) -> JobResult<Self> {
        let pool = create_pool(&config.store).await?;

        let store = Arc::new(RedisStore::new(
            pool.clone(),
            config.store.key_prefix.clone(),
            config.idempotency.default_ttl(),
            config.worker.anti_starvation_n,
        ));
        let registry = Arc::new(WorkerRegistry::new(pool.clone(), config.store.key_prefix.clone()));
        let status = Arc::new(StatusReader::new(store.clone(), registry.clone()));

        Ok(Self {
            config,
            clock,
            pool,
            store,
            registry,
            status,
        })
    }

    /// Queues serviced by this deployment, high tier first.
    #[must_use]
    pub fn queues(&self) -> Vec<String> {
        self.config.worker.queues.ordered()
    }

    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.pool.clone(),
            self.store.clone(),
            self.config.store.key_prefix.clone(),
            self.queues(),
            self.config.scheduler.clone(),
        )
    }

    #[must_use]
    pub fn reaper(&self) -> Reaper {
        Reaper::new(self.store.clone(), self.registry.clone(), self.reaper_config())
    }

    #[must_use]
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(
            self.store.clone(),
            self.registry.clone(),
            WorkerPoolConfig::from_config(&self.config.worker),
        )
    }

    fn reaper_config(&self) -> ReaperConfig {
        self.config.reaper.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_are_ordered_high_first() {
        let mut config = JobsConfig::default();
        config.worker.queues.high = vec!["urgent".to_string()];
        config.worker.queues.normal = vec!["default".to_string()];
        let runtime_queues = config.worker.queues.ordered();
        assert_eq!(runtime_queues, vec!["urgent".to_string(), "default".to_string()]);
    }
}
