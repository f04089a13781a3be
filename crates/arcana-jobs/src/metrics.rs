//! Prometheus metrics for the job queue runtime.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names exposed on the admin `/metrics` endpoint.
pub mod names {
    pub const QUEUE_LENGTH: &str = "queue_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "jobs_enqueued_total";
    pub const JOBS_ACKED_TOTAL: &str = "jobs_acked_total";
    pub const JOBS_FAILED_TOTAL: &str = "jobs_failed_total";
    pub const JOB_PROCESSING_DURATION_SECONDS: &str = "job_processing_duration_seconds";
    pub const WORKER_REGISTERED_TOTAL: &str = "worker_registered_total";
    pub const RATE_LIMIT_EXCEEDED_TOTAL: &str = "rate_limit_exceeded_total";
    pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
}

/// Registers every metric description once at startup.
pub fn register_metrics() {
    describe_gauge!(names::QUEUE_LENGTH, "Number of jobs waiting in a queue's ready list");
    describe_counter!(names::JOBS_ENQUEUED_TOTAL, "Total number of jobs enqueued");
    describe_counter!(names::JOBS_ACKED_TOTAL, "Total number of jobs acknowledged as complete");
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total number of job executions that failed");
    describe_histogram!(names::JOB_PROCESSING_DURATION_SECONDS, "Job handler execution duration in seconds");
    describe_counter!(names::WORKER_REGISTERED_TOTAL, "Total number of workers that have registered");
    describe_counter!(names::RATE_LIMIT_EXCEEDED_TOTAL, "Total number of reservations skipped due to a tripped rate limit");
    describe_gauge!(names::CIRCUIT_BREAKER_STATE, "Circuit breaker state per queue: 0=closed, 1=open, 2=half_open");
}

/// Job-level metrics recorder.
#[derive(Clone)]
pub struct JobMetrics;

impl JobMetrics {
    pub fn job_enqueued(queue: &str, priority: &str) {
        counter!(names::JOBS_ENQUEUED_TOTAL, "queue" => queue.to_string(), "priority" => priority.to_string()).increment(1);
    }

    pub fn job_acked(queue: &str) {
        counter!(names::JOBS_ACKED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    pub fn job_failed(queue: &str, reason: &str) {
        counter!(
            names::JOBS_FAILED_TOTAL,
            "queue" => queue.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    pub fn job_processed(queue: &str, outcome: &str, duration: Duration) {
        histogram!(
            names::JOB_PROCESSING_DURATION_SECONDS,
            "queue" => queue.to_string(),
            "outcome" => outcome.to_string()
        )
        .record(duration.as_secs_f64());
    }

    pub fn update_queue_length(queue: &str, ready: u64) {
        gauge!(names::QUEUE_LENGTH, "queue" => queue.to_string()).set(ready as f64);
    }
}

/// Worker-level metrics recorder.
#[derive(Clone)]
pub struct WorkerMetrics;

impl WorkerMetrics {
    pub fn worker_registered(worker_id: &str) {
        counter!(names::WORKER_REGISTERED_TOTAL, "worker_id" => worker_id.to_string()).increment(1);
    }
}

/// Rate limiter metrics recorder.
#[derive(Clone)]
pub struct LimiterMetrics;

impl LimiterMetrics {
    pub fn rate_limit_exceeded(queue: &str, tenant: &str) {
        counter!(
            names::RATE_LIMIT_EXCEEDED_TOTAL,
            "queue" => queue.to_string(),
            "tenant" => tenant.to_string()
        )
        .increment(1);
    }
}

/// Circuit breaker metrics recorder.
#[derive(Clone)]
pub struct BreakerMetrics;

impl BreakerMetrics {
    pub fn update_state(queue: &str, state_value: u8) {
        gauge!(names::CIRCUIT_BREAKER_STATE, "queue" => queue.to_string()).set(state_value as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_metrics_does_not_panic() {
        register_metrics();
    }

    #[test]
    fn recording_job_metrics_does_not_panic() {
        JobMetrics::job_enqueued("emails", "normal");
        JobMetrics::job_acked("emails");
        JobMetrics::job_failed("emails", "handler_failure");
        JobMetrics::job_processed("emails", "success", Duration::from_millis(120));
    }
}
