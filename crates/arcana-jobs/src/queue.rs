//! The `Store` capability trait: the atomic primitives every other
//! component (scheduler, reaper, worker runtime, admin surface) is built on.

use crate::error::JobResult;
use crate::job::{Job, JobInfo};
use arcana_core::{CursorPage, CursorRequest, JobId};
use async_trait::async_trait;
use std::time::Duration;

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub enqueued: bool,
    pub duplicate: bool,
}

/// Result of an ack attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckOutcome {
    pub acked: bool,
    pub missing: bool,
}

/// Per-queue counters surfaced by the admin `/stats` endpoint.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QueueStats {
    pub queue: String,
    pub ready: u64,
    pub delayed: u64,
    pub dead_letter: u64,
}

/// The atomic queue primitives, implemented against Redis via server-side
/// Lua scripts so every operation below is indivisible from the store's
/// point of view even under concurrent workers and a cluster-sharded
/// keyspace.
#[async_trait]
pub trait Store: Send + Sync {
    /// Adds a job to its queue (ready list) or delayed set, deduplicating
    /// against `idempotency_key` when present.
    async fn enqueue(&self, job: Job) -> JobResult<EnqueueOutcome>;

    /// Atomically pops the next job for `worker_id` across `queues`, in
    /// priority order, respecting the anti-starvation cadence, placing it
    /// in the worker's processing list and creating its heartbeat key.
    async fn reserve(
        &self,
        queues: &[String],
        worker_id: &str,
        heartbeat_ttl: Duration,
    ) -> JobResult<Option<Job>>;

    /// Acknowledges successful completion, removing the job from the
    /// worker's processing list.
    async fn ack(&self, worker_id: &str, job_id: &JobId) -> JobResult<AckOutcome>;

    /// Removes `job` from the worker's processing list and reschedules it
    /// on `origin_queue` at `job.scheduled_at`, recording `last_error` and
    /// the incremented attempt count.
    async fn requeue(&self, worker_id: &str, job: Job) -> JobResult<()>;

    /// Removes `job` from the worker's processing list and appends it to
    /// the dead-letter sink with `reason`.
    async fn move_to_dead_letter(&self, worker_id: &str, job: Job, reason: &str) -> JobResult<()>;

    /// Promotes delayed jobs whose `scheduled_at` has passed into their
    /// ready lists, up to `limit` per call. Idempotent: a job promoted
    /// twice by racing scheduler instances is a no-op the second time.
    async fn promote_due(&self, queue: &str, limit: usize) -> JobResult<u64>;

    /// Renews a worker's heartbeat key without touching its processing
    /// list.
    async fn renew_heartbeat(&self, worker_id: &str, ttl: Duration) -> JobResult<()>;

    /// Pops every job currently in `worker_id`'s processing list, used by
    /// the reaper to drain a dead worker. Does not touch the `workers` set.
    async fn drain_processing(&self, worker_id: &str, limit: usize) -> JobResult<Vec<Job>>;

    async fn queue_length(&self, queue: &str) -> JobResult<QueueStats>;

    async fn list_ready(&self, queue: &str, page: CursorRequest) -> JobResult<CursorPage<JobInfo>>;

    async fn peek(&self, queue: &str, job_id: &JobId) -> JobResult<Option<JobInfo>>;

    async fn list_dead_letter(&self, page: CursorRequest) -> JobResult<CursorPage<JobInfo>>;

    async fn requeue_from_dead_letter(&self, job_id: &JobId, target_queue: Option<&str>) -> JobResult<bool>;

    async fn purge_dead_letter(&self) -> JobResult<u64>;

    async fn purge_all(&self, queues: &[String]) -> JobResult<u64>;

    async fn health_check(&self) -> JobResult<()>;

    /// Depth of `worker_id`'s processing list, surfaced on the admin
    /// `/workers` endpoint alongside heartbeat liveness.
    async fn processing_len(&self, worker_id: &str) -> JobResult<u64>;

    /// The scheduler lease holder's id, if the lease is currently held by
    /// anyone. Used by `/readyz` to confirm the lease is resolvable at all,
    /// independent of which instance holds it.
    async fn scheduler_lease_holder(&self) -> JobResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_outcome_distinguishes_duplicate_from_enqueued() {
        let fresh = EnqueueOutcome { enqueued: true, duplicate: false };
        let dup = EnqueueOutcome { enqueued: false, duplicate: true };
        assert_ne!(fresh, dup);
    }
}
