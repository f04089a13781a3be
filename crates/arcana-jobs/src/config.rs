//! Job queue configuration: defaults layered with an optional TOML file and
//! `ARCANA_JOBS`-prefixed environment overrides.

use arcana_resilience::{CircuitBreakerConfig, LimiterConfig};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the job queue runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub store: RedisConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub limiter: HashMap<String, LimiterSettings>,
    #[serde(default)]
    pub breaker: HashMap<String, BreakerSettings>,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            store: RedisConfig::default(),
            worker: WorkerConfig::default(),
            scheduler: SchedulerConfig::default(),
            reaper: ReaperConfig::default(),
            retry: RetryConfig::default(),
            limiter: HashMap::new(),
            breaker: HashMap::new(),
            admin: AdminConfig::default(),
            idempotency: IdempotencyConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl JobsConfig {
    /// Loads configuration from an optional `path` TOML file, defaults, and
    /// `ARCANA_JOBS`-prefixed environment variables (dots become
    /// underscores, uppercased: `ARCANA_JOBS_STORE_ADDR`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("no .env file found or error loading it: {e}");
        }

        let mut builder = Config::builder();

        if let Some(path) = path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ARCANA_JOBS")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            password: None,
            db: 0,
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_addr() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_size() -> usize {
    16
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "arcana:jobs".to_string()
}

/// Queues a worker polls, in priority-tier order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueues {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub normal: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl Default for WorkerQueues {
    fn default() -> Self {
        Self {
            high: vec![],
            normal: vec!["default".to_string()],
            low: vec![],
        }
    }
}

impl WorkerQueues {
    /// Flattens the tiers into reservation order: high, then normal, then low.
    pub fn ordered(&self) -> Vec<String> {
        self.high
            .iter()
            .chain(self.normal.iter())
            .chain(self.low.iter())
            .cloned()
            .collect()
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_slots")]
    pub slots: usize,
    #[serde(default = "default_heartbeat_ttl_secs")]
    pub heartbeat_ttl_secs: u64,
    #[serde(default = "default_drain_deadline_secs")]
    pub drain_deadline_secs: u64,
    #[serde(default = "default_anti_starvation_n")]
    pub anti_starvation_n: u64,
    #[serde(default)]
    pub queues: WorkerQueues,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            slots: default_slots(),
            heartbeat_ttl_secs: default_heartbeat_ttl_secs(),
            drain_deadline_secs: default_drain_deadline_secs(),
            anti_starvation_n: default_anti_starvation_n(),
            queues: WorkerQueues::default(),
        }
    }
}

impl WorkerConfig {
    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }
}

fn default_worker_count() -> usize {
    1
}

fn default_slots() -> usize {
    std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4).max(4)
}

fn default_heartbeat_ttl_secs() -> u64 {
    15
}

fn default_drain_deadline_secs() -> u64 {
    30
}

fn default_anti_starvation_n() -> u64 {
    10
}

/// Delayed-job-promotion scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
            batch_cap: default_batch_cap(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

fn default_tick_interval_secs() -> u64 {
    1
}

fn default_lease_ttl_secs() -> u64 {
    10
}

fn default_batch_cap() -> usize {
    500
}

/// Dead-worker reaper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
    #[serde(default = "default_drain_cap")]
    pub drain_cap: usize,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reaper_interval_secs(),
            time_budget_ms: default_time_budget_ms(),
            drain_cap: default_drain_cap(),
        }
    }
}

impl ReaperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

fn default_reaper_interval_secs() -> u64 {
    5
}

fn default_time_budget_ms() -> u64 {
    500
}

fn default_drain_cap() -> usize {
    1000
}

/// Retry backoff configuration, shared by every queue unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_cap_ms")]
    pub cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_ms: default_base_ms(),
            cap_ms: default_cap_ms(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> arcana_resilience::RetryPolicy {
        arcana_resilience::RetryPolicy {
            max_attempts: self.max_attempts,
            base: Duration::from_millis(self.base_ms),
            cap: Duration::from_millis(self.cap_ms),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_ms() -> u64 {
    500
}

fn default_cap_ms() -> u64 {
    300_000
}

/// Per-queue token-bucket settings, keyed by queue name under `[limiter.<queue>]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimiterSettings {
    pub capacity: u32,
    pub refill_per_s: f64,
}

impl LimiterSettings {
    pub fn to_config(self) -> LimiterConfig {
        LimiterConfig {
            capacity: self.capacity,
            refill_per_s: self.refill_per_s,
        }
    }
}

/// Per-queue circuit breaker settings, keyed by queue name under `[breaker.<queue>]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_breaker_window_secs")]
    pub window_secs: u64,
    pub trip_ratio: f64,
    pub min_samples: u64,
    pub cooldown_secs: u64,
}

impl BreakerSettings {
    pub fn to_config(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window: Duration::from_secs(self.window_secs),
            trip_ratio: self.trip_ratio,
            min_samples: self.min_samples,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

fn default_breaker_window_secs() -> u64 {
    30
}

/// Admin HTTP surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_confirmation_phrase_dlq")]
    pub confirmation_phrase_dlq: String,
    #[serde(default = "default_confirmation_phrase_purge_all")]
    pub confirmation_phrase_purge_all: String,
    #[serde(default)]
    pub cors_allow_origins: Vec<String>,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            confirmation_phrase_dlq: default_confirmation_phrase_dlq(),
            confirmation_phrase_purge_all: default_confirmation_phrase_purge_all(),
            cors_allow_origins: vec![],
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:9091".to_string()
}

fn default_confirmation_phrase_dlq() -> String {
    "PURGE DEAD LETTER QUEUE".to_string()
}

fn default_confirmation_phrase_purge_all() -> String {
    "PURGE ALL QUEUES".to_string()
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

/// Idempotency-key bookkeeping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_idempotency_ttl_secs")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_idempotency_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl IdempotencyConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

fn default_idempotency_ttl_secs() -> u64 {
    86400
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

/// Metrics surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Queue names allowed as a metric label value; an unlisted queue is
    /// reported under the `other` bucket to bound label cardinality.
    #[serde(default)]
    pub allowed_queues: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { allowed_queues: vec![] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_usable_config() {
        let config = JobsConfig::default();
        assert_eq!(config.store.addr, "redis://127.0.0.1:6379");
        assert_eq!(config.worker.queues.normal, vec!["default".to_string()]);
    }

    #[test]
    fn worker_queues_order_high_before_normal_before_low() {
        let queues = WorkerQueues {
            high: vec!["h".to_string()],
            normal: vec!["n".to_string()],
            low: vec!["l".to_string()],
        };
        assert_eq!(queues.ordered(), vec!["h", "n", "l"]);
    }

    #[test]
    fn limiter_settings_convert_to_resilience_config() {
        let settings = LimiterSettings { capacity: 50, refill_per_s: 5.0 };
        let config = settings.to_config();
        assert_eq!(config.capacity, 50);
        assert!((config.refill_per_s - 5.0).abs() < f64::EPSILON);
    }
}
