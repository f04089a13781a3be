//! Periodic sweep that reclaims jobs left behind by workers whose heartbeat
//! has expired, so a crashed worker's in-flight jobs don't sit stuck in its
//! processing list forever.

pub(crate) use crate::config::ReaperConfig;
use crate::error::JobResult;
use crate::queue::Store;
use crate::worker_registry::WorkerRegistry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{info, warn};

const DEAD_WORKER_REASON: &str = "worker heartbeat expired";

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReaperStats {
    pub sweeps: u64,
    pub jobs_reclaimed: u64,
    pub workers_reaped: u64,
}

/// Sweeps the `workers` set for entries whose heartbeat key has expired and
/// recovers whatever they were holding.
pub struct Reaper {
    store: Arc<dyn Store>,
    registry: Arc<WorkerRegistry>,
    config: ReaperConfig,
    shutdown_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    sweeps: Arc<AtomicU64>,
    jobs_reclaimed: Arc<AtomicU64>,
    workers_reaped: Arc<AtomicU64>,
}

impl Reaper {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, registry: Arc<WorkerRegistry>, config: ReaperConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            store,
            registry,
            config,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            sweeps: Arc::new(AtomicU64::new(0)),
            jobs_reclaimed: Arc::new(AtomicU64::new(0)),
            workers_reaped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn stats(&self) -> ReaperStats {
        ReaperStats {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            jobs_reclaimed: self.jobs_reclaimed.load(Ordering::Relaxed),
            workers_reaped: self.workers_reaped.load(Ordering::Relaxed),
        }
    }

    pub async fn start(&self) -> JobResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick = interval(self.config.interval());

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tick.tick() => {
                    match self.sweep().await {
                        Ok(reclaimed) if reclaimed > 0 => {
                            info!(reclaimed, "reaper reclaimed jobs from dead workers");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "reaper sweep failed"),
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// One sweep over every registered worker, bounded by `time_budget` so a
    /// large membership set can't starve the tick loop; workers not reached
    /// this round are picked up on the next tick.
    async fn sweep(&self) -> JobResult<u64> {
        let started = Instant::now();
        let mut reclaimed = 0u64;
        self.sweeps.fetch_add(1, Ordering::Relaxed);

        for worker_id in self.registry.list().await? {
            if started.elapsed() > self.config.time_budget() {
                warn!("reaper time budget exceeded, deferring remaining workers to next sweep");
                break;
            }

            if self.registry.is_alive(&worker_id).await? {
                continue;
            }

            info!(worker_id, "reaping dead worker");
            let jobs = self.store.drain_processing(&worker_id, self.config.drain_cap).await?;
            for mut job in jobs {
                reclaimed += 1;
                if job.is_exhausted_after_next_attempt() {
                    self.store.move_to_dead_letter(&worker_id, job, DEAD_WORKER_REASON).await?;
                } else {
                    job.last_error = Some(DEAD_WORKER_REASON.to_string());
                    self.store.requeue(&worker_id, job).await?;
                }
            }

            self.registry.unregister(&worker_id).await?;
            self.workers_reaped.fetch_add(1, Ordering::Relaxed);
        }

        self.jobs_reclaimed.fetch_add(reclaimed, Ordering::Relaxed);
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_start_at_zero() {
        let stats = ReaperStats::default();
        assert_eq!(stats.sweeps, 0);
        assert_eq!(stats.jobs_reclaimed, 0);
        assert_eq!(stats.workers_reaped, 0);
    }
}
