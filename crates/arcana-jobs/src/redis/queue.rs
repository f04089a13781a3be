//! `Store` implementation backed by Redis, using server-side Lua scripts so
//! each primitive is atomic even against concurrent workers.

use super::RedisKeys;
use crate::error::{JobError, JobResult};
use crate::job::{Job, JobInfo, JobStatus};
use crate::metrics::JobMetrics;
use crate::queue::{AckOutcome, EnqueueOutcome, QueueStats, Store};
use arcana_core::{decode_offset_cursor, encode_offset_cursor, CursorPage, CursorRequest, JobId};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::Pool;
use redis::{AsyncCommands, Script};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const ENQUEUE_SCRIPT: &str = r"
local idem_key = KEYS[1]
local target_key = KEYS[2]
local has_idem = ARGV[1]
local job_json = ARGV[2]
local score = ARGV[3]
local is_delayed = ARGV[4]
local idem_ttl = ARGV[5]
local job_id = ARGV[6]

if has_idem == '1' then
    local set = redis.call('SET', idem_key, job_id, 'NX', 'EX', idem_ttl)
    if not set then
        return {0, 1}
    end
end

if is_delayed == '1' then
    redis.call('ZADD', target_key, score, job_json)
else
    redis.call('LPUSH', target_key, job_json)
end

return {1, 0}
";

const RESERVE_SCRIPT: &str = r"
local ready_key = KEYS[1]
local processing_key = KEYS[2]
local raw = redis.call('RPOPLPUSH', ready_key, processing_key)
if not raw then
    return false
end
local job = cjson.decode(raw)
job.attempts = (job.attempts or 0) + 1
local updated = cjson.encode(job)
redis.call('LREM', processing_key, 1, raw)
redis.call('LPUSH', processing_key, updated)
return updated
";

const FIND_AND_REMOVE_SCRIPT: &str = r"
local processing_key = KEYS[1]
local job_id = ARGV[1]
local items = redis.call('LRANGE', processing_key, 0, -1)
for _, raw in ipairs(items) do
    local job = cjson.decode(raw)
    if job.id == job_id then
        redis.call('LREM', processing_key, 1, raw)
        return raw
    end
end
return false
";

const REQUEUE_SCRIPT: &str = r"
local target_key = KEYS[1]
local job_json = ARGV[1]
local score = ARGV[2]
local is_delayed = ARGV[3]

if is_delayed == '1' then
    redis.call('ZADD', target_key, score, job_json)
else
    redis.call('LPUSH', target_key, job_json)
end
return 1
";

const PROMOTE_DUE_SCRIPT: &str = r"
local delayed_key = KEYS[1]
local ready_key = KEYS[2]
local now = ARGV[1]
local limit = tonumber(ARGV[2])
local due = redis.call('ZRANGEBYSCORE', delayed_key, '-inf', now, 'LIMIT', 0, limit)
local promoted = 0
for _, raw in ipairs(due) do
    local removed = redis.call('ZREM', delayed_key, raw)
    if removed == 1 then
        redis.call('LPUSH', ready_key, raw)
        promoted = promoted + 1
    end
end
return promoted
";

const DRAIN_SCRIPT: &str = r"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local result = {}
for _ = 1, limit do
    local raw = redis.call('RPOP', key)
    if not raw then break end
    table.insert(result, raw)
end
return result
";

/// Redis-backed `Store`.
pub struct RedisStore {
    pool: Pool,
    keys: RedisKeys,
    idempotency_ttl: Duration,
    anti_starvation_n: u64,
    reservation_count: AtomicU64,
    enqueue_script: Script,
    reserve_script: Script,
    find_and_remove_script: Script,
    requeue_script: Script,
    promote_due_script: Script,
    drain_script: Script,
}

impl RedisStore {
    pub fn new(
        pool: Pool,
        key_prefix: impl Into<String>,
        idempotency_ttl: Duration,
        anti_starvation_n: u64,
    ) -> Self {
        Self {
            pool,
            keys: RedisKeys::new(key_prefix),
            idempotency_ttl,
            anti_starvation_n: anti_starvation_n.max(1),
            reservation_count: AtomicU64::new(0),
            enqueue_script: Script::new(ENQUEUE_SCRIPT),
            reserve_script: Script::new(RESERVE_SCRIPT),
            find_and_remove_script: Script::new(FIND_AND_REMOVE_SCRIPT),
            requeue_script: Script::new(REQUEUE_SCRIPT),
            promote_due_script: Script::new(PROMOTE_DUE_SCRIPT),
            drain_script: Script::new(DRAIN_SCRIPT),
        }
    }

    async fn conn(&self) -> JobResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Orders `queues` for a single reservation attempt. Every
    /// `anti_starvation_n`-th call checks the lowest-priority queue first,
    /// guaranteeing it is serviced even while higher-priority queues stay
    /// busy.
    fn reservation_order<'a>(&self, queues: &'a [String]) -> Vec<&'a String> {
        let n = self.reservation_count.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.anti_starvation_n == 0 {
            queues.iter().rev().collect()
        } else {
            queues.iter().collect()
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn enqueue(&self, job: Job) -> JobResult<EnqueueOutcome> {
        let mut conn = self.conn().await?;
        let now = Utc::now();
        let is_delayed = job.scheduled_at > now;
        let target_key = if is_delayed {
            self.keys.delayed(&job.queue)
        } else {
            self.keys.ready(&job.queue)
        };
        let score = job.scheduled_at.timestamp_millis();
        let job_id = job.id.to_string();
        let has_idem = job.idempotency_key.is_some();
        let idem_key = job
            .idempotency_key
            .as_deref()
            .map(|k| self.keys.idempotency(&job.queue, k))
            .unwrap_or_else(|| format!("{}:unused", self.keys.ready(&job.queue)));
        let job_json = job.to_json()?;

        let (enqueued, duplicate): (i64, i64) = self
            .enqueue_script
            .key(&idem_key)
            .key(&target_key)
            .arg(if has_idem { "1" } else { "0" })
            .arg(&job_json)
            .arg(score)
            .arg(if is_delayed { "1" } else { "0" })
            .arg(self.idempotency_ttl.as_secs())
            .arg(&job_id)
            .invoke_async(&mut conn)
            .await?;

        debug!(job_id = %job_id, queue = %job.queue, delayed = is_delayed, "enqueued job");
        if enqueued == 1 {
            JobMetrics::job_enqueued(&job.queue, &job.priority.to_string());
        }

        Ok(EnqueueOutcome {
            enqueued: enqueued == 1,
            duplicate: duplicate == 1,
        })
    }

    async fn reserve(
        &self,
        queues: &[String],
        worker_id: &str,
        _heartbeat_ttl: Duration,
    ) -> JobResult<Option<Job>> {
        let mut conn = self.conn().await?;
        let processing_key = self.keys.processing(worker_id);

        for queue in self.reservation_order(queues) {
            let ready_key = self.keys.ready(queue);
            let raw: Option<String> = self
                .reserve_script
                .key(&ready_key)
                .key(&processing_key)
                .invoke_async(&mut conn)
                .await?;

            if let Some(raw) = raw {
                let job = Job::from_json(&raw)?;
                debug!(job_id = %job.id, queue = %queue, worker_id, "reserved job");
                return Ok(Some(job));
            }
        }

        Ok(None)
    }

    async fn ack(&self, worker_id: &str, job_id: &JobId) -> JobResult<AckOutcome> {
        let mut conn = self.conn().await?;
        let processing_key = self.keys.processing(worker_id);
        let removed: Option<String> = self
            .find_and_remove_script
            .key(&processing_key)
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await?;

        Ok(AckOutcome {
            acked: removed.is_some(),
            missing: removed.is_none(),
        })
    }

    async fn requeue(&self, worker_id: &str, job: Job) -> JobResult<()> {
        let mut conn = self.conn().await?;
        let processing_key = self.keys.processing(worker_id);
        let _: Option<String> = self
            .find_and_remove_script
            .key(&processing_key)
            .arg(job.id.to_string())
            .invoke_async(&mut conn)
            .await?;

        let now = Utc::now();
        let is_delayed = job.scheduled_at > now;
        let target_key = if is_delayed {
            self.keys.delayed(&job.origin_queue)
        } else {
            self.keys.ready(&job.origin_queue)
        };
        let score = job.scheduled_at.timestamp_millis();
        let job_json = job.to_json()?;

        let _: i64 = self
            .requeue_script
            .key(&target_key)
            .arg(&job_json)
            .arg(score)
            .arg(if is_delayed { "1" } else { "0" })
            .invoke_async(&mut conn)
            .await?;

        debug!(job_id = %job.id, origin_queue = %job.origin_queue, attempts = job.attempts, "requeued job");
        Ok(())
    }

    async fn move_to_dead_letter(&self, worker_id: &str, mut job: Job, reason: &str) -> JobResult<()> {
        let mut conn = self.conn().await?;
        let processing_key = self.keys.processing(worker_id);
        let _: Option<String> = self
            .find_and_remove_script
            .key(&processing_key)
            .arg(job.id.to_string())
            .invoke_async(&mut conn)
            .await?;

        job.last_error = Some(reason.to_string());
        let envelope = serde_json::json!({
            "job": job,
            "reason": reason,
            "dead_lettered_at": Utc::now(),
        });
        let envelope_json = serde_json::to_string(&envelope)?;

        conn.lpush::<_, _, ()>(self.keys.dead_letter(), envelope_json).await?;

        warn!(job_id = %job.id, queue = %job.origin_queue, reason, "moved job to dead letter sink");
        Ok(())
    }

    async fn promote_due(&self, queue: &str, limit: usize) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        let delayed_key = self.keys.delayed(queue);
        let ready_key = self.keys.ready(queue);
        let now = Utc::now().timestamp_millis();

        let promoted: u64 = self
            .promote_due_script
            .key(&delayed_key)
            .key(&ready_key)
            .arg(now)
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;

        if promoted > 0 {
            debug!(queue, promoted, "promoted delayed jobs to ready");
        }
        Ok(promoted)
    }

    async fn renew_heartbeat(&self, worker_id: &str, ttl: Duration) -> JobResult<()> {
        let mut conn = self.conn().await?;
        let key = self.keys.heartbeat(worker_id);
        redis::cmd("SET")
            .arg(&key)
            .arg(1i64)
            .arg("XX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn drain_processing(&self, worker_id: &str, limit: usize) -> JobResult<Vec<Job>> {
        let mut conn = self.conn().await?;
        let processing_key = self.keys.processing(worker_id);

        let raw: Vec<String> = self
            .drain_script
            .key(&processing_key)
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;

        raw.iter().map(|s| Job::from_json(s).map_err(JobError::from)).collect()
    }

    async fn queue_length(&self, queue: &str) -> JobResult<QueueStats> {
        let mut conn = self.conn().await?;
        let ready: u64 = conn.llen(self.keys.ready(queue)).await?;
        let delayed: u64 = conn.zcard(self.keys.delayed(queue)).await?;
        JobMetrics::update_queue_length(queue, ready);
        Ok(QueueStats {
            queue: queue.to_string(),
            ready,
            delayed,
            dead_letter: 0,
        })
    }

    async fn list_ready(&self, queue: &str, page: CursorRequest) -> JobResult<CursorPage<JobInfo>> {
        let mut conn = self.conn().await?;
        let offset = decode_offset_cursor(page.cursor.as_deref());
        let key = self.keys.ready(queue);
        let raw: Vec<String> = conn
            .lrange(&key, offset as isize, (offset + page.limit) as isize - 1)
            .await?;

        let has_more = raw.len() > page.limit;
        let items = raw
            .into_iter()
            .take(page.limit)
            .filter_map(|s| Job::from_json(&s).ok())
            .map(|job| JobInfo {
                job,
                status: JobStatus::Ready,
                worker_id: None,
            })
            .collect();

        let next_cursor = has_more.then(|| encode_offset_cursor(offset + page.limit));
        Ok(CursorPage { items, next_cursor })
    }

    async fn peek(&self, queue: &str, job_id: &JobId) -> JobResult<Option<JobInfo>> {
        let mut conn = self.conn().await?;
        let ready: Vec<String> = conn.lrange(self.keys.ready(queue), 0, -1).await?;
        for raw in ready {
            if let Ok(job) = Job::from_json(&raw) {
                if &job.id == job_id {
                    return Ok(Some(JobInfo {
                        job,
                        status: JobStatus::Ready,
                        worker_id: None,
                    }));
                }
            }
        }

        let delayed: Vec<String> = conn.zrange(self.keys.delayed(queue), 0, -1).await?;
        for raw in delayed {
            if let Ok(job) = Job::from_json(&raw) {
                if &job.id == job_id {
                    return Ok(Some(JobInfo {
                        job,
                        status: JobStatus::Scheduled,
                        worker_id: None,
                    }));
                }
            }
        }

        Ok(None)
    }

    async fn list_dead_letter(&self, page: CursorRequest) -> JobResult<CursorPage<JobInfo>> {
        let mut conn = self.conn().await?;
        let offset = decode_offset_cursor(page.cursor.as_deref());
        let raw: Vec<String> = conn
            .lrange(self.keys.dead_letter(), offset as isize, (offset + page.limit) as isize - 1)
            .await?;

        let has_more = raw.len() > page.limit;
        let items = raw
            .into_iter()
            .take(page.limit)
            .filter_map(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .filter_map(|envelope| serde_json::from_value::<Job>(envelope.get("job")?.clone()).ok())
            .map(|job| JobInfo {
                job,
                status: JobStatus::DeadLetter,
                worker_id: None,
            })
            .collect();

        let next_cursor = has_more.then(|| encode_offset_cursor(offset + page.limit));
        Ok(CursorPage { items, next_cursor })
    }

    async fn requeue_from_dead_letter(&self, job_id: &JobId, target_queue: Option<&str>) -> JobResult<bool> {
        let mut conn = self.conn().await?;
        let entries: Vec<String> = conn.lrange(self.keys.dead_letter(), 0, -1).await?;

        for raw in entries {
            let Ok(envelope) = serde_json::from_str::<serde_json::Value>(&raw) else {
                continue;
            };
            let Some(job_value) = envelope.get("job") else {
                continue;
            };
            let Ok(mut job) = serde_json::from_value::<Job>(job_value.clone()) else {
                continue;
            };
            if &job.id != job_id {
                continue;
            }

            conn.lrem::<_, _, i64>(self.keys.dead_letter(), 1, &raw).await?;

            job.attempts = 0;
            job.last_error = None;
            job.scheduled_at = Utc::now();
            if let Some(target) = target_queue {
                job.queue = target.to_string();
                job.origin_queue = target.to_string();
            }

            let ready_key = self.keys.ready(&job.queue);
            let job_json = job.to_json()?;
            conn.lpush::<_, _, ()>(&ready_key, job_json).await?;
            return Ok(true);
        }

        Ok(false)
    }

    async fn purge_dead_letter(&self) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.llen(self.keys.dead_letter()).await?;
        conn.del::<_, ()>(self.keys.dead_letter()).await?;
        Ok(len)
    }

    async fn purge_all(&self, queues: &[String]) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        let mut purged = 0u64;
        for queue in queues {
            let ready_key = self.keys.ready(queue);
            let delayed_key = self.keys.delayed(queue);
            let ready_len: u64 = conn.llen(&ready_key).await?;
            let delayed_len: u64 = conn.zcard(&delayed_key).await?;
            conn.del::<_, ()>(&ready_key).await?;
            conn.del::<_, ()>(&delayed_key).await?;
            purged += ready_len + delayed_len;
        }
        purged += self.purge_dead_letter().await?;
        Ok(purged)
    }

    async fn health_check(&self) -> JobResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn processing_len(&self, worker_id: &str) -> JobResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(self.keys.processing(worker_id)).await?)
    }

    async fn scheduler_lease_holder(&self) -> JobResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(self.keys.scheduler_lease()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_order_forces_reverse_on_the_nth_call() {
        let pool_config = deadpool_redis::Config::from_url("redis://127.0.0.1:6390");
        let pool = pool_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)).unwrap();
        let store = RedisStore::new(pool, "test", Duration::from_secs(60), 3);
        let queues = vec!["high".to_string(), "normal".to_string(), "low".to_string()];

        let first = store.reservation_order(&queues);
        let second = store.reservation_order(&queues);
        let third = store.reservation_order(&queues);

        assert_eq!(first, vec![&queues[0], &queues[1], &queues[2]]);
        assert_eq!(second, vec![&queues[0], &queues[1], &queues[2]]);
        assert_eq!(third, vec![&queues[2], &queues[1], &queues[0]]);
    }
}
