//! Per-(queue, tenant) token-bucket rate limiter backed by a Redis-atomic
//! Lua script, so the bucket is shared coherently across worker processes.

use arcana_core::ArcanaError;
use deadpool_redis::Pool;
use redis::Script;

/// `tokens`/`last_refill_ms` are read, refilled, and (if >=1 available)
/// decremented in one atomic round trip. Returns `{allowed, retry_after_ms}`.
const TOKEN_BUCKET_SCRIPT: &str = r"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_per_s = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])
local ttl_s = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill_ms')
local tokens = tonumber(bucket[1])
local last_refill_ms = tonumber(bucket[2])

if tokens == nil then
    tokens = capacity
    last_refill_ms = now_ms
end

local elapsed_ms = now_ms - last_refill_ms
if elapsed_ms < 0 then
    elapsed_ms = 0
end
tokens = math.min(capacity, tokens + (elapsed_ms * refill_per_s / 1000.0))

local allowed = 0
local retry_after_ms = 0
if tokens >= 1.0 then
    tokens = tokens - 1.0
    allowed = 1
else
    local deficit = 1.0 - tokens
    if refill_per_s > 0 then
        retry_after_ms = math.ceil(deficit * 1000.0 / refill_per_s)
    else
        retry_after_ms = -1
    end
end

redis.call('HMSET', key, 'tokens', tostring(tokens), 'last_refill_ms', tostring(now_ms))
redis.call('EXPIRE', key, ttl_s)

return { allowed, retry_after_ms }
";

/// Per-queue limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub capacity: u32,
    pub refill_per_s: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_per_s: 10.0,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after_ms: u64 },
}

/// Token-bucket rate limiter keyed by `(queue, tenant)`.
pub struct RateLimiter {
    pool: Pool,
    key_prefix: String,
    script: Script,
}

impl RateLimiter {
    #[must_use]
    pub fn new(pool: Pool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            script: Script::new(TOKEN_BUCKET_SCRIPT),
        }
    }

    fn bucket_key(&self, queue: &str, tenant: &str) -> String {
        format!("{}:{{q:{queue}}}:rl:{tenant}", self.key_prefix)
    }

    /// Attempts to consume one token for `(queue, tenant)` at time `now_ms`.
    pub async fn try_acquire(
        &self,
        queue: &str,
        tenant: &str,
        config: LimiterConfig,
        now_ms: i64,
    ) -> Result<RateDecision, ArcanaError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ArcanaError::TransientStore(e.to_string()))?;

        let key = self.bucket_key(queue, tenant);
        let (allowed, retry_after_ms): (i64, i64) = self
            .script
            .key(key)
            .arg(config.capacity)
            .arg(config.refill_per_s)
            .arg(now_ms)
            .arg(60i64)
            .invoke_async(&mut conn)
            .await?;

        if allowed == 1 {
            Ok(RateDecision::Allow)
        } else {
            Ok(RateDecision::Deny {
                retry_after_ms: retry_after_ms.max(0) as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_config_defaults() {
        let config = LimiterConfig::default();
        assert_eq!(config.capacity, 100);
        assert!(config.refill_per_s > 0.0);
    }

    #[test]
    fn rate_decision_equality() {
        assert_eq!(RateDecision::Allow, RateDecision::Allow);
        assert_ne!(
            RateDecision::Allow,
            RateDecision::Deny { retry_after_ms: 10 }
        );
    }
}
