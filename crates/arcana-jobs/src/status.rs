//! Read-side queries backing the admin surface: queue stats, job listings,
//! and worker health, all derived from the store and registry rather than a
//! separately maintained index.

use crate::error::JobResult;
use crate::job::JobInfo;
use crate::queue::{QueueStats, Store};
use crate::worker_registry::WorkerRegistry;
use arcana_core::{CursorPage, CursorRequest, JobId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Aggregate stats across every configured queue, for the admin `/stats`
/// endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_ready: u64,
    pub total_delayed: u64,
    pub total_dead_letter: u64,
    pub active_workers: u64,
    pub queues: Vec<QueueStats>,
}

/// A registered worker and whether its heartbeat is still live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: String,
    pub alive: bool,
    /// Milliseconds remaining before the heartbeat key expires, or `None` if
    /// it already has.
    pub heartbeat_ttl_ms: Option<i64>,
    pub processing_depth: u64,
}

/// Read-only view over queue and worker state, used by the admin HTTP
/// surface and by anything that wants a snapshot without touching the
/// mutating `Store` primitives directly.
pub struct StatusReader {
    store: Arc<dyn Store>,
    registry: Arc<WorkerRegistry>,
}

impl StatusReader {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, registry: Arc<WorkerRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn queue_stats(&self, queue: &str) -> JobResult<QueueStats> {
        self.store.queue_length(queue).await
    }

    pub async fn dashboard_stats(&self, queues: &[String]) -> JobResult<DashboardStats> {
        let mut dashboard = DashboardStats {
            active_workers: self.registry.active_count().await? as u64,
            ..Default::default()
        };

        for queue in queues {
            let stats = self.store.queue_length(queue).await?;
            dashboard.total_ready += stats.ready;
            dashboard.total_delayed += stats.delayed;
            dashboard.queues.push(stats);
        }

        let dlq_page = self.store.list_dead_letter(CursorRequest::new(None, CursorRequest::MAX_LIMIT)).await?;
        dashboard.total_dead_letter = dlq_page.items.len() as u64;

        Ok(dashboard)
    }

    pub async fn list_ready(&self, queue: &str, page: CursorRequest) -> JobResult<CursorPage<JobInfo>> {
        self.store.list_ready(queue, page).await
    }

    pub async fn peek(&self, queue: &str, job_id: &JobId) -> JobResult<Option<JobInfo>> {
        self.store.peek(queue, job_id).await
    }

    pub async fn list_dead_letter(&self, page: CursorRequest) -> JobResult<CursorPage<JobInfo>> {
        self.store.list_dead_letter(page).await
    }

    pub async fn worker_health(&self) -> JobResult<Vec<WorkerHealth>> {
        let mut workers = Vec::new();
        for worker_id in self.registry.list().await? {
            let alive = self.registry.is_alive(&worker_id).await?;
            let heartbeat_ttl_ms = self.registry.heartbeat_ttl_ms(&worker_id).await?;
            let processing_depth = self.store.processing_len(&worker_id).await?;
            workers.push(WorkerHealth {
                worker_id,
                alive,
                heartbeat_ttl_ms,
                processing_depth,
            });
        }
        Ok(workers)
    }

    /// Whether the scheduler lease currently resolves to a holder, used by
    /// `/readyz` independent of which instance holds it.
    pub async fn scheduler_lease_resolvable(&self) -> JobResult<bool> {
        Ok(self.store.scheduler_lease_holder().await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_stats_default_to_zero() {
        let stats = DashboardStats::default();
        assert_eq!(stats.total_ready, 0);
        assert_eq!(stats.queues.len(), 0);
    }
}
