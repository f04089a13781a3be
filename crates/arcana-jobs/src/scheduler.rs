//! Delayed-job promotion scheduler with distributed leader election.
//!
//! Exactly one instance across a deployment holds the lease at a time and
//! promotes due jobs from each queue's delayed set into its ready list;
//! every other instance idles, ready to take over if the leader stops
//! renewing.

use crate::config::SchedulerConfig;
use crate::error::{JobError, JobResult};
use crate::queue::Store;
use crate::redis::RedisKeys;
use deadpool_redis::Pool;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Runtime stats surfaced for admin/observability.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SchedulerStats {
    pub is_leader: bool,
    pub total_promoted: u64,
}

/// Promotes delayed jobs to their ready lists, one lease-holder at a time.
pub struct Scheduler {
    id: String,
    pool: Pool,
    store: Arc<dyn Store>,
    config: SchedulerConfig,
    keys: RedisKeys,
    queues: Vec<String>,
    shutdown_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    is_leader: Arc<AtomicBool>,
    total_promoted: Arc<AtomicU64>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        pool: Pool,
        store: Arc<dyn Store>,
        key_prefix: impl Into<String>,
        queues: Vec<String>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            id: format!("scheduler-{}", arcana_core::WorkerId::new("scheduler")),
            pool,
            store,
            config,
            keys: RedisKeys::new(key_prefix),
            queues,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            is_leader: Arc::new(AtomicBool::new(false)),
            total_promoted: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            is_leader: self.is_leader(),
            total_promoted: self.total_promoted.load(Ordering::Relaxed),
        }
    }

    /// Acquires the lease if unheld, or refreshes it if already ours.
    async fn try_acquire_leadership(&self) -> JobResult<bool> {
        let mut conn = self.pool.get().await?;
        let lease_key = self.keys.scheduler_lease();
        let ttl_secs = self.config.lease_ttl_secs as i64;

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&lease_key)
            .arg(&self.id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;

        if acquired.is_some() {
            self.is_leader.store(true, Ordering::SeqCst);
            info!(scheduler_id = %self.id, "acquired scheduler lease");
            return Ok(true);
        }

        let current_holder: Option<String> = redis::AsyncCommands::get(&mut conn, &lease_key).await?;
        if current_holder.as_deref() == Some(self.id.as_str()) {
            let _: () = redis::AsyncCommands::expire(&mut conn, &lease_key, ttl_secs).await?;
            return Ok(true);
        }

        self.is_leader.store(false, Ordering::SeqCst);
        Ok(false)
    }

    /// Releases the lease via a compare-and-delete; a no-op if it has
    /// already expired or been taken over.
    async fn release_leadership(&self) -> JobResult<()> {
        if !self.is_leader.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut conn = self.pool.get().await?;
        let lease_key = self.keys.scheduler_lease();

        let _: i32 = redis::Script::new(RELEASE_LEASE_SCRIPT)
            .key(&lease_key)
            .arg(&self.id)
            .invoke_async(&mut conn)
            .await?;

        self.is_leader.store(false, Ordering::SeqCst);
        info!(scheduler_id = %self.id, "released scheduler lease");
        Ok(())
    }

    /// Runs the tick loop until `stop` is called. Only the lease holder
    /// promotes; every instance attempts to acquire or refresh the lease on
    /// each tick so a failed leader is replaced within one tick interval of
    /// its lease expiring.
    pub async fn start(&self) -> JobResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JobError::Configuration("scheduler already running".to_string()));
        }

        info!(scheduler_id = %self.id, queues = ?self.queues, "starting scheduler");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick = interval(self.config.tick_interval());

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(scheduler_id = %self.id, "received shutdown signal");
                    break;
                }

                _ = tick.tick() => {
                    if let Err(e) = self.try_acquire_leadership().await {
                        error!(error = %e, "failed to check scheduler lease");
                        continue;
                    }

                    if self.is_leader.load(Ordering::SeqCst) {
                        if let Err(e) = self.promote_all_queues().await {
                            error!(error = %e, "failed to promote delayed jobs");
                        }
                    }
                }
            }
        }

        if let Err(e) = self.release_leadership().await {
            warn!(error = %e, "failed to release scheduler lease on shutdown");
        }

        self.running.store(false, Ordering::SeqCst);
        info!(scheduler_id = %self.id, "scheduler stopped");
        Ok(())
    }

    pub fn stop(&self) {
        info!(scheduler_id = %self.id, "stopping scheduler");
        let _ = self.shutdown_tx.send(());
    }

    async fn promote_all_queues(&self) -> JobResult<()> {
        for queue in &self.queues {
            let promoted = self.store.promote_due(queue, self.config.batch_cap).await?;
            if promoted > 0 {
                self.total_promoted.fetch_add(promoted, Ordering::Relaxed);
                debug!(queue, promoted, "promoted delayed jobs");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_default_to_not_leader() {
        let stats = SchedulerStats::default();
        assert!(!stats.is_leader);
        assert_eq!(stats.total_promoted, 0);
    }
}
