//! Wire-level job record and the priority/state types around it.

use arcana_core::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Job priority. Ordering is used for strict priority scanning across ready
/// lists, bounded by the worker's anti-starvation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

fn base64_payload<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use base64::Engine;
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn base64_payload_de<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use base64::Engine;
    let s = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(serde::de::Error::custom)
}

/// A job as it is stored in and retrieved from the queue. The payload is
/// opaque to the runtime; handlers interpret it themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    /// The queue the job was originally enqueued to, persisted at enqueue
    /// time and never recomputed, so a requeue or reaper-driven recovery
    /// always lands the job back where it started.
    pub origin_queue: String,
    #[serde(serialize_with = "base64_payload", deserialize_with = "base64_payload_de")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Unknown fields round-trip here instead of being dropped, satisfying
    /// `decode(encode(job)) == job` even across schema additions.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    pub fn new(queue: impl Into<String>, payload: Vec<u8>, max_attempts: u32) -> Self {
        let queue = queue.into();
        let now = Utc::now();
        Self {
            id: JobId::new(),
            origin_queue: queue.clone(),
            queue,
            payload,
            priority: Priority::Normal,
            enqueued_at: now,
            scheduled_at: now,
            attempts: 0,
            max_attempts,
            trace_id: None,
            span_id: None,
            idempotency_key: None,
            last_error: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_exhausted_after_next_attempt(&self) -> bool {
        self.attempts + 1 >= self.max_attempts
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A job's lifecycle state, used for admin/status reporting only; the store
/// itself does not persist a status field, it's derived from which
/// structure currently holds the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Ready,
    Scheduled,
    Processing,
    DeadLetter,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Ready => write!(f, "ready"),
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::DeadLetter => write!(f, "dead_letter"),
        }
    }
}

/// A job plus the derived status used for admin listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    #[serde(flatten)]
    pub job: Job,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_with_unknown_fields() {
        let mut job = Job::new("emails", b"hello".to_vec(), 5);
        job.extra
            .insert("future_field".to_string(), serde_json::json!("kept"));

        let json = job.to_json().unwrap();
        let restored = Job::from_json(&json).unwrap();

        assert_eq!(restored.id, job.id);
        assert_eq!(restored.payload, job.payload);
        assert_eq!(restored.extra.get("future_field").unwrap(), "kept");
    }

    #[test]
    fn origin_queue_persists_independent_of_queue() {
        let mut job = Job::new("emails", b"x".to_vec(), 3);
        job.queue = "emails-retry".to_string();
        assert_eq!(job.origin_queue, "emails");
    }

    #[test]
    fn priority_orders_high_above_low() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn exhaustion_threshold_counts_the_next_attempt() {
        let mut job = Job::new("q", vec![], 3);
        job.attempts = 2;
        assert!(job.is_exhausted_after_next_attempt());
        job.attempts = 1;
        assert!(!job.is_exhausted_after_next_attempt());
    }
}
