/// Session cache and access-token deny-list
///
/// # Keys
///
/// - `session:{session_id}` → owning user id, TTL = remaining session lifetime
/// - `revoked:{jti}` → `1`, TTL = remaining access-token lifetime
///
/// The cache is only a shortcut: a missing `session:` entry means "ask the
/// database", never "session revoked". Revocation always deletes the entry.

use redis::AsyncCommands;
use uuid::Uuid;

use super::client::{RedisClient, RedisClientError};

pub fn session_key(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

pub fn revoked_key(jti: Uuid) -> String {
    format!("revoked:{}", jti)
}

#[derive(Clone, Debug)]
pub struct SessionCache {
    redis: RedisClient,
}

impl SessionCache {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    /// Caches an active session for `ttl_secs` (skipped when 0)
    pub async fn cache_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        ttl_secs: u64,
    ) -> Result<(), RedisClientError> {
        if ttl_secs == 0 {
            return Ok(());
        }

        let mut conn = self.redis.get_connection();
        self.redis
            .run(
                redis::cmd("SET")
                    .arg(session_key(session_id))
                    .arg(user_id.to_string())
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async::<_, ()>(&mut conn),
            )
            .await
    }

    /// Owner of a cached session, if cached
    pub async fn cached_session(&self, session_id: Uuid) -> Result<Option<Uuid>, RedisClientError> {
        let mut conn = self.redis.get_connection();
        let value: Option<String> = self.redis.run(conn.get(session_key(session_id))).await?;

        // Unparseable entries are treated as absent
        Ok(value.and_then(|raw| Uuid::parse_str(&raw).ok()))
    }

    pub async fn evict_session(&self, session_id: Uuid) -> Result<(), RedisClientError> {
        self.evict_sessions(&[session_id]).await
    }

    pub async fn evict_sessions(&self, session_ids: &[Uuid]) -> Result<(), RedisClientError> {
        if session_ids.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = session_ids.iter().copied().map(session_key).collect();
        let mut conn = self.redis.get_connection();
        self.redis.run(conn.del::<_, ()>(keys)).await
    }

    /// Puts an access token on the deny-list until it would expire anyway
    pub async fn revoke_token(&self, jti: Uuid, ttl_secs: u64) -> Result<(), RedisClientError> {
        if ttl_secs == 0 {
            return Ok(());
        }

        let mut conn = self.redis.get_connection();
        self.redis
            .run(
                redis::cmd("SET")
                    .arg(revoked_key(jti))
                    .arg(1)
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async::<_, ()>(&mut conn),
            )
            .await
    }

    pub async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, RedisClientError> {
        let mut conn = self.redis.get_connection();
        self.redis.run(conn.exists(revoked_key(jti))).await
    }
}
