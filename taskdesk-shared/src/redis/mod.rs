/// Redis integration for the authentication service
///
/// - `client`: Managed connection with command timeouts and health checks
/// - `rate_limiter`: Fixed-window counters for login and per-IP limits
/// - `session_cache`: Session lookups and the revoked access-token list
///
/// # Layout
///
/// ```text
/// session:{session_id}        -> user_id     (TTL: session lifetime)
/// revoked:{jti}               -> 1           (TTL: token lifetime)
/// ratelimit:login:id:{ident}  -> failures    (TTL: login window)
/// ratelimit:login:ip:{ip}     -> failures    (TTL: login window)
/// ratelimit:ip:{ip}           -> requests    (TTL: 60s)
/// ```

pub mod client;
pub mod rate_limiter;
pub mod session_cache;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use session_cache::SessionCache;
