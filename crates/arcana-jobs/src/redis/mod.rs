//! Connection pooling and the hash-tagged key schema.

pub mod queue;

use crate::config::RedisConfig;
use crate::error::JobResult;
use deadpool_redis::{Config, Runtime};

pub use queue::RedisStore;

/// Builds a pool and verifies connectivity with a single `PING`.
pub async fn create_pool(config: &RedisConfig) -> JobResult<deadpool_redis::Pool> {
    let pool = Config::from_url(&config.addr)
        .builder()
        .map_err(|e| crate::error::JobError::Configuration(e.to_string()))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| crate::error::JobError::Configuration(e.to_string()))?;

    let mut conn = pool.get().await?;
    let _: String = redis::cmd("PING").query_async(&mut *conn).await?;

    Ok(pool)
}

/// The hash-tagged key schema. `key_prefix` is always prepended outside the
/// `{...}` hash tag; putting it inside would fold every queue's keys onto
/// the same cluster slot and defeat sharding.
#[derive(Debug, Clone)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn ready(&self, queue: &str) -> String {
        format!("{}:{{q:{queue}}}:ready", self.prefix)
    }

    pub fn delayed(&self, queue: &str) -> String {
        format!("{}:{{q:{queue}}}:delayed", self.prefix)
    }

    pub fn processing(&self, worker_id: &str) -> String {
        format!("{}:{{w:{worker_id}}}:processing", self.prefix)
    }

    pub fn heartbeat(&self, worker_id: &str) -> String {
        format!("{}:{{w:{worker_id}}}:hb", self.prefix)
    }

    /// Plain SET, deliberately not hash-tagged: membership is enumerated
    /// with `SMEMBERS`, never scanned, so it doesn't need cluster locality
    /// with any per-worker key.
    pub fn workers(&self) -> String {
        format!("{}:workers", self.prefix)
    }

    pub fn dead_letter(&self) -> String {
        format!("{}:{{dlq}}:list", self.prefix)
    }

    pub fn rate_limit(&self, queue: &str, tenant: &str) -> String {
        format!("{}:{{q:{queue}}}:rl:{tenant}", self.prefix)
    }

    pub fn idempotency(&self, queue: &str, key: &str) -> String {
        format!("{}:{{q:{queue}}}:idem:{key}", self.prefix)
    }

    pub fn scheduler_lease(&self) -> String {
        format!("{}:{{s}}:lease", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sits_outside_the_hash_tag() {
        let keys = RedisKeys::new("arcana:jobs");
        assert_eq!(keys.ready("emails"), "arcana:jobs:{q:emails}:ready");
        assert_eq!(keys.processing("w-1"), "arcana:jobs:{w:w-1}:processing");
    }

    #[test]
    fn workers_set_carries_no_hash_tag() {
        let keys = RedisKeys::new("arcana:jobs");
        assert_eq!(keys.workers(), "arcana:jobs:workers");
        assert!(!keys.workers().contains('{'));
    }

    #[test]
    fn queue_scoped_keys_share_a_hash_tag() {
        let keys = RedisKeys::new("p");
        let ready = keys.ready("billing");
        let delayed = keys.delayed("billing");
        let tag = |s: &str| s[s.find('{').unwrap()..=s.find('}').unwrap()].to_string();
        assert_eq!(tag(&ready), tag(&delayed));
    }
}
