//! Worker pool: a bounded set of concurrent slots reserving and executing
//! jobs against a `Store`, gated by a per-queue circuit breaker and backed
//! by a background heartbeat-renewal task.

use crate::config::WorkerConfig;
use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::metrics::{BreakerMetrics, JobMetrics, WorkerMetrics};
use crate::queue::Store;
use crate::worker_registry::WorkerRegistry;
use arcana_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn, Instrument};

/// A job handler, registered per queue name.
pub type JobHandler = Box<dyn Fn(Job) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// Pool-level configuration, derived from `WorkerConfig` plus the queues a
/// particular pool instance services.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub slots: usize,
    pub queues: Vec<String>,
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub heartbeat_ttl: Duration,
    pub drain_deadline: Duration,
    pub anti_starvation_n: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            slots: 4,
            queues: vec!["default".to_string()],
            job_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(100),
            heartbeat_ttl: Duration::from_secs(15),
            drain_deadline: Duration::from_secs(30),
            anti_starvation_n: 10,
        }
    }
}

impl WorkerPoolConfig {
    #[must_use]
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            slots: config.slots,
            queues: config.queues.ordered(),
            job_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(100),
            heartbeat_ttl: config.heartbeat_ttl(),
            drain_deadline: config.drain_deadline(),
            anti_starvation_n: config.anti_starvation_n,
        }
    }
}

/// Lets a queue bring its own processing logic without going through the
/// handler-registration map, e.g. for handlers assembled dynamically.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn process(&self, job: &Job) -> Result<(), JobError>;
    fn can_handle(&self, queue: &str) -> bool;
}

/// Runtime stats surfaced for admin/observability.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerPoolStats {
    pub id: String,
    pub running: bool,
    pub slots: usize,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub queues: Vec<String>,
}

/// A bounded-concurrency pool of job slots, all sharing one worker identity
/// (and therefore one processing list and heartbeat key in the store).
pub struct WorkerPool {
    id: String,
    store: Arc<dyn Store>,
    registry: Arc<WorkerRegistry>,
    config: WorkerPoolConfig,
    handlers: Arc<RwLock<HashMap<String, JobHandler>>>,
    breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
    shutdown_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    jobs_processed: Arc<AtomicU64>,
    jobs_failed: Arc<AtomicU64>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, registry: Arc<WorkerRegistry>, config: WorkerPoolConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            id: arcana_core::WorkerId::new("worker").to_string(),
            store,
            registry,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            breakers: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            jobs_processed: Arc::new(AtomicU64::new(0)),
            jobs_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers the handler for `queue`, replacing any prior registration.
    pub fn register(
        &self,
        queue: impl Into<String>,
        handler: impl Fn(Job) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync + 'static,
    ) {
        let queue = queue.into();
        self.breakers
            .write()
            .entry(queue.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(queue.clone(), CircuitBreakerConfig::default())));
        info!(queue = %queue, "registered job handler");
        self.handlers.write().insert(queue, Box::new(handler));
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current circuit breaker state per queue this pool has registered a
    /// handler for, for the admin `/stats` and `/metrics` endpoints.
    #[must_use]
    pub fn breaker_states(&self) -> Vec<(String, arcana_resilience::CircuitState)> {
        self.breakers
            .read()
            .iter()
            .map(|(queue, breaker)| (queue.clone(), breaker.state()))
            .collect()
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            id: self.id.clone(),
            running: self.is_running(),
            slots: self.config.slots,
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            queues: self.config.queues.clone(),
        }
    }

    pub fn stop(&self) {
        info!(pool_id = %self.id, "stopping worker pool");
        let _ = self.shutdown_tx.send(());
    }

    /// Registers the worker, starts the heartbeat-renewal task, then runs
    /// the reservation loop until shutdown.
    pub async fn start(&self) -> JobResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JobError::Configuration("worker pool already running".to_string()));
        }

        info!(pool_id = %self.id, slots = self.config.slots, queues = ?self.config.queues, "starting worker pool");

        self.registry.register(&self.id, self.config.heartbeat_ttl).await?;
        WorkerMetrics::worker_registered(&self.id);
        let heartbeat_task = self.spawn_heartbeat_task();

        let semaphore = Arc::new(Semaphore::new(self.config.slots));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(pool_id = %self.id, "received shutdown signal");
                    break;
                }

                permit = semaphore.clone().acquire_owned() => {
                    if let Ok(permit) = permit {
                        self.spawn_slot(permit);
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        heartbeat_task.abort();

        let drained = timeout(self.config.drain_deadline, async {
            while semaphore.available_permits() < self.config.slots {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(pool_id = %self.id, "drain deadline exceeded, in-flight jobs may be reclaimed by the reaper");
        }

        if let Err(e) = self.registry.unregister(&self.id).await {
            warn!(pool_id = %self.id, error = %e, "failed to unregister on shutdown");
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            pool_id = %self.id,
            processed = self.jobs_processed.load(Ordering::Relaxed),
            failed = self.jobs_failed.load(Ordering::Relaxed),
            "worker pool stopped"
        );

        Ok(())
    }

    fn spawn_heartbeat_task(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let worker_id = self.id.clone();
        let ttl = self.config.heartbeat_ttl;
        let renew_every = ttl / 3;

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(renew_every.max(Duration::from_millis(100)));
            loop {
                tick.tick().await;
                if let Err(e) = store.renew_heartbeat(&worker_id, ttl).await {
                    warn!(worker_id = %worker_id, error = %e, "heartbeat renewal failed");
                    let _ = registry.heartbeat(&worker_id, ttl).await;
                }
            }
        })
    }

    fn spawn_slot(&self, permit: tokio::sync::OwnedSemaphorePermit) {
        let store = self.store.clone();
        let handlers = self.handlers.clone();
        let breakers = self.breakers.clone();
        let worker_id = self.id.clone();
        let queues = self.config.queues.clone();
        let heartbeat_ttl = self.config.heartbeat_ttl;
        let job_timeout = self.config.job_timeout;
        let jobs_processed = self.jobs_processed.clone();
        let jobs_failed = self.jobs_failed.clone();

        tokio::spawn(
            async move {
                let reservable_queues: Vec<String> = queues
                    .iter()
                    .filter(|q| breakers.read().get(*q).map_or(true, |b| b.state() != arcana_resilience::CircuitState::Open))
                    .cloned()
                    .collect();

                if reservable_queues.is_empty() {
                    drop(permit);
                    return;
                }

                match store.reserve(&reservable_queues, &worker_id, heartbeat_ttl).await {
                    Ok(Some(job)) => {
                        Self::execute_job(&store, &handlers, &breakers, &worker_id, job, job_timeout, &jobs_processed, &jobs_failed).await;
                    }
                    Ok(None) => {}
                    Err(e) => error!(worker_id = %worker_id, error = %e, "failed to reserve job"),
                }

                drop(permit);
            }
            .instrument(tracing::info_span!("worker_slot")),
        );
    }

    async fn execute_job(
        store: &Arc<dyn Store>,
        handlers: &Arc<RwLock<HashMap<String, JobHandler>>>,
        breakers: &Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
        worker_id: &str,
        job: Job,
        job_timeout: Duration,
        jobs_processed: &Arc<AtomicU64>,
        jobs_failed: &Arc<AtomicU64>,
    ) {
        let job_id = job.id;
        let queue = job.queue.clone();
        let started = std::time::Instant::now();

        debug!(job_id = %job_id, queue = %queue, worker_id, "processing job");

        let handler_call = {
            let guard = handlers.read();
            guard.get(&queue).map(|h| h(job.clone()))
        };

        let Some(future) = handler_call else {
            error!(queue = %queue, "no handler registered for queue");
            let _ = store
                .move_to_dead_letter(worker_id, job, "no handler registered for queue")
                .await;
            jobs_failed.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let run = || async move {
            match timeout(job_timeout, future).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(JobError::HandlerTimeout(job_timeout)),
            }
        };

        let breaker = breakers.read().get(&queue).cloned();
        let outcome = match breaker {
            Some(breaker) => breaker.call(run).await,
            None => run().await.map_err(CircuitBreakerError::Failure),
        };

        match outcome {
            Ok(()) => {
                debug!(job_id = %job_id, "job completed successfully");
                if let Err(e) = store.ack(worker_id, &job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to ack completed job");
                }
                JobMetrics::job_acked(&queue);
                JobMetrics::job_processed(&queue, "success", started.elapsed());
                jobs_processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(CircuitBreakerError::Failure(e)) => {
                warn!(job_id = %job_id, error = %e, "job execution failed");
                let reason = e.kind();
                Self::requeue_or_dead_letter(store, worker_id, job, e.to_string()).await;
                JobMetrics::job_failed(&queue, reason);
                JobMetrics::job_processed(&queue, "failure", started.elapsed());
                jobs_failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(CircuitBreakerError::Open(name)) => {
                debug!(job_id = %job_id, breaker = %name, "breaker open, returning job to ready list");
                if let Err(e) = store.requeue(worker_id, job).await {
                    error!(job_id = %job_id, error = %e, "failed to return job after breaker rejection");
                }
            }
        }

        if let Some(breaker) = breakers.read().get(&queue) {
            BreakerMetrics::update_state(&queue, breaker.state() as u8);
        }
    }

    async fn requeue_or_dead_letter(store: &Arc<dyn Store>, worker_id: &str, mut job: Job, reason: String) {
        let job_id = job.id;
        if job.is_exhausted_after_next_attempt() {
            if let Err(e) = store.move_to_dead_letter(worker_id, job, &reason).await {
                error!(job_id = %job_id, error = %e, "failed to move exhausted job to dead letter");
            }
            return;
        }

        job.last_error = Some(reason);
        if let Err(e) = store.requeue(worker_id, job).await {
            error!(job_id = %job_id, error = %e, "failed to requeue job after failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_from_worker_config_orders_queues_by_tier() {
        let mut config = WorkerConfig::default();
        config.queues.high = vec!["urgent".to_string()];
        config.queues.normal = vec!["default".to_string()];
        let pool_config = WorkerPoolConfig::from_config(&config);
        assert_eq!(pool_config.queues, vec!["urgent".to_string(), "default".to_string()]);
    }
}
