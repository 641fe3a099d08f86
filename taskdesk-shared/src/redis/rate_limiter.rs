/// Fixed-window rate limiting
///
/// Each key gets a counter that lives for one window. The first hit creates
/// the counter and sets its expiry; both happen inside one Lua script so a
/// crash between `INCR` and `EXPIRE` cannot leave an immortal counter.
///
/// # Storage
///
/// Keys: `ratelimit:{scope}:{subject}`, e.g. `ratelimit:login:id:ada` or
/// `ratelimit:ip:203.0.113.7`. TTL: the window length.
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::redis::{RateLimiter, RedisClient};
///
/// # async fn example(redis: RedisClient) -> anyhow::Result<()> {
/// let limiter = RateLimiter::new(redis);
/// let decision = limiter.hit("ip:203.0.113.7", 60, 60).await?;
/// if !decision.allowed {
///     println!("retry in {}s", decision.retry_after);
/// }
/// # Ok(())
/// # }
/// ```

use redis::Script;
use std::sync::Arc;

use super::client::{RedisClient, RedisClientError};

const HIT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('TTL', KEYS[1])
if ttl < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {current, ttl}
"#;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Hits counted in the current window
    pub count: u64,

    /// Hits left in the current window
    pub remaining: u64,

    /// Seconds until the window resets (0 when allowed)
    pub retry_after: u64,
}

impl RateLimitDecision {
    /// Decision after a hit: allowed while `count <= limit`
    pub fn after_hit(count: u64, limit: u64, ttl: i64) -> Self {
        let allowed = count <= limit;
        Self {
            allowed,
            count,
            remaining: limit.saturating_sub(count),
            retry_after: if allowed { 0 } else { ttl.max(1) as u64 },
        }
    }

    /// Decision without a hit: allowed while another hit would fit
    pub fn before_hit(count: u64, limit: u64, ttl: i64) -> Self {
        let allowed = count < limit;
        Self {
            allowed,
            count,
            remaining: limit.saturating_sub(count),
            retry_after: if allowed { 0 } else { ttl.max(1) as u64 },
        }
    }
}

fn key(subject: &str) -> String {
    format!("ratelimit:{}", subject)
}

/// Redis-backed fixed-window limiter
#[derive(Clone)]
pub struct RateLimiter {
    redis: RedisClient,
    script: Arc<Script>,
}

impl RateLimiter {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            script: Arc::new(Script::new(HIT_SCRIPT)),
        }
    }

    /// Counts one hit against `subject` and decides
    pub async fn hit(
        &self,
        subject: &str,
        limit: u64,
        window_secs: u64,
    ) -> Result<RateLimitDecision, RedisClientError> {
        let mut conn = self.redis.get_connection();
        let mut invocation = self.script.key(key(subject));
        invocation.arg(window_secs);

        let (count, ttl): (u64, i64) = self
            .redis
            .run(invocation.invoke_async(&mut conn))
            .await?;

        Ok(RateLimitDecision::after_hit(count, limit, ttl))
    }

    /// Reads the counter without counting a hit
    pub async fn peek(&self, subject: &str, limit: u64) -> Result<RateLimitDecision, RedisClientError> {
        let mut conn = self.redis.get_connection();
        let key = key(subject);

        let (count, ttl): (Option<u64>, i64) = self
            .redis
            .run(
                redis::pipe()
                    .cmd("GET")
                    .arg(&key)
                    .cmd("TTL")
                    .arg(&key)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(RateLimitDecision::before_hit(count.unwrap_or(0), limit, ttl))
    }

    /// Clears the counter for `subject`
    pub async fn reset(&self, subject: &str) -> Result<(), RedisClientError> {
        let mut conn = self.redis.get_connection();

        self.redis
            .run(redis::cmd("DEL").arg(key(subject)).query_async::<_, ()>(&mut conn))
            .await
    }
}
