//! Redis-backed worker registry. Membership lives in the `workers` SET;
//! liveness is a separate per-worker heartbeat key. Enumeration is always
//! `SMEMBERS`, never a keyspace `SCAN`.

use crate::error::JobResult;
use crate::redis::RedisKeys;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

/// Tracks which workers are currently participating in the deployment.
pub struct WorkerRegistry {
    pool: Pool,
    keys: RedisKeys,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new(pool: Pool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            keys: RedisKeys::new(key_prefix),
        }
    }

    async fn conn(&self) -> JobResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Adds `worker_id` to the membership set and creates its heartbeat key
    /// if one doesn't already exist.
    pub async fn register(&self, worker_id: &str, heartbeat_ttl: Duration) -> JobResult<()> {
        let mut conn = self.conn().await?;
        conn.sadd::<_, _, ()>(self.keys.workers(), worker_id).await?;

        redis::cmd("SET")
            .arg(self.keys.heartbeat(worker_id))
            .arg(1i64)
            .arg("NX")
            .arg("PX")
            .arg(heartbeat_ttl.as_millis() as u64)
            .query_async::<()>(&mut conn)
            .await?;

        info!(worker_id, "worker registered");
        Ok(())
    }

    /// Renews `worker_id`'s heartbeat key, extending its TTL. Uses `XX` so a
    /// worker that was already reaped does not silently resurrect itself.
    pub async fn heartbeat(&self, worker_id: &str, heartbeat_ttl: Duration) -> JobResult<bool> {
        let mut conn = self.conn().await?;
        let renewed: Option<String> = redis::cmd("SET")
            .arg(self.keys.heartbeat(worker_id))
            .arg(1i64)
            .arg("XX")
            .arg("PX")
            .arg(heartbeat_ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(renewed.is_some())
    }

    /// Removes `worker_id` from the membership set and deletes its
    /// heartbeat key. Used on graceful shutdown and by the reaper once a
    /// dead worker has been drained.
    pub async fn unregister(&self, worker_id: &str) -> JobResult<()> {
        let mut conn = self.conn().await?;
        conn.srem::<_, _, ()>(self.keys.workers(), worker_id).await?;
        conn.del::<_, ()>(self.keys.heartbeat(worker_id)).await?;
        debug!(worker_id, "worker unregistered");
        Ok(())
    }

    /// Every registered worker id, via `SMEMBERS` of the `workers` set.
    pub async fn list(&self) -> JobResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(self.keys.workers()).await?)
    }

    /// Whether `worker_id` still has a live heartbeat key.
    pub async fn is_alive(&self, worker_id: &str) -> JobResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(self.keys.heartbeat(worker_id)).await?)
    }

    pub async fn active_count(&self) -> JobResult<usize> {
        let mut conn = self.conn().await?;
        let count: usize = conn.scard(self.keys.workers()).await?;
        Ok(count)
    }

    /// Milliseconds remaining on `worker_id`'s heartbeat key, or `None` if
    /// it has already expired (or never existed).
    pub async fn heartbeat_ttl_ms(&self, worker_id: &str) -> JobResult<Option<i64>> {
        let mut conn = self.conn().await?;
        let ttl: i64 = redis::cmd("PTTL")
            .arg(self.keys.heartbeat(worker_id))
            .query_async(&mut conn)
            .await?;
        Ok((ttl >= 0).then_some(ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_constructible_from_a_pool() {
        let pool_config = deadpool_redis::Config::from_url("redis://127.0.0.1:6390");
        let pool = pool_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)).unwrap();
        let _registry = WorkerRegistry::new(pool, "test");
    }
}
