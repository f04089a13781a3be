//! Arcana Jobs - Distributed Job Queue System
//!
//! A Redis-backed distributed job queue with:
//! - Opaque-payload jobs, addressed by queue name rather than a typed trait
//! - Atomic queue primitives implemented as Redis Lua scripts
//! - Configurable worker pools with concurrency control and per-queue
//!   circuit breakers
//! - Retry with exponential backoff and a dead letter sink for exhausted jobs
//! - Priority queues (high, normal, low) with anti-starvation scanning
//! - A leader-elected scheduler that promotes delayed jobs back to ready
//! - A reaper that reclaims jobs left behind by workers with an expired
//!   heartbeat
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Arcana Jobs Architecture                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Producer                                                        │
//! │     │                                                            │
//! │     ▼                                                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    Store (Redis)                          │    │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐                     │    │
//! │  │  │  High   │ │ Normal  │ │   Low   │    Delayed (ZSET)    │    │
//! │  │  │  Ready  │ │  Ready  │ │  Ready  │                      │    │
//! │  │  └────┬────┘ └────┬────┘ └────┬────┘                     │    │
//! │  │       └───────────┴──────────┘                           │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                           │                                      │
//! │              ┌────────────┼────────────┐                        │
//! │              ▼            ▼            ▼                        │
//! │        ┌──────────┐ ┌──────────┐ ┌───────────┐                 │
//! │        │ Scheduler│ │  Reaper  │ │ WorkerPool│                 │
//! │        │ (leader) │ │          │ │           │                 │
//! │        └──────────┘ └──────────┘ └─────┬─────┘                 │
//! │                                         │                        │
//! │                              ┌──────────┴──────────┐            │
//! │                              ▼                     ▼            │
//! │                        ┌──────────┐       ┌─────────────┐       │
//! │                        │   Ack    │       │ Dead Letter │       │
//! │                        └──────────┘       └─────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use arcana_jobs::{Job, Store, WorkerPool, WorkerPoolConfig};
//! use std::sync::Arc;
//!
//! // Enqueue a job; the payload is an opaque byte string the handler decodes.
//! let job = Job::new("emails", serde_json::to_vec(&email)?, 5);
//! store.enqueue(job).await?;
//!
//! // Register a handler and run the pool.
//! let pool = WorkerPool::new(store, registry, WorkerPoolConfig::default());
//! pool.register("emails", |job| Box::pin(async move {
//!     send_email(job.payload).await
//! }));
//! pool.start().await?;
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod reaper;
pub mod redis;
pub mod runtime;
pub mod scheduler;
pub mod status;
pub mod worker;
pub mod worker_registry;

pub use config::{
    AdminConfig, BreakerSettings, IdempotencyConfig, JobsConfig, LimiterSettings, MetricsConfig,
    ReaperConfig, RedisConfig, RetryConfig, SchedulerConfig, WorkerConfig, WorkerQueues,
};
pub use error::{JobError, JobResult};
pub use job::{Job, JobInfo, JobStatus, Priority};
pub use metrics::{register_metrics, BreakerMetrics, JobMetrics, LimiterMetrics, WorkerMetrics};
pub use queue::{AckOutcome, EnqueueOutcome, QueueStats, Store};
pub use reaper::{Reaper, ReaperStats};
pub use redis::{create_pool, RedisKeys, RedisStore};
pub use runtime::Runtime;
pub use scheduler::{Scheduler, SchedulerStats};
pub use status::{DashboardStats, StatusReader, WorkerHealth};
pub use worker::{JobHandler, Worker, WorkerPool, WorkerPoolConfig, WorkerPoolStats};
pub use worker_registry::WorkerRegistry;

/// Re-export of the traits and types most call sites need.
pub mod prelude {
    pub use crate::job::{Job, JobStatus, Priority};
    pub use crate::queue::Store;
    pub use crate::worker::Worker;
    pub use crate::{JobError, JobResult};
}
