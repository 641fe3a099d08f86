/// Redis client wrapper
///
/// Wraps `redis::aio::ConnectionManager` (multiplexed, reconnects on its
/// own) and bounds every command with the configured timeout.
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RedisConfig::from_env()?;
/// let client = RedisClient::new(config).await?;
///
/// let healthy = client.ping().await?;
/// println!("Redis healthy: {}", healthy);
/// # Ok(())
/// # }
/// ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{env_lookup, parse_or, required};

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            RedisClientError::ConnectionError(err.to_string())
        } else {
            RedisClientError::CommandError(err.to_string())
        }
    }
}

/// Redis configuration
///
/// # Environment Variables
///
/// - `REDIS_URL`: Connection URL (required), `redis://[user:pass@]host:port[/db]`
/// - `REDIS_CONNECTION_TIMEOUT_SECS`: Connect timeout (default: 5)
/// - `REDIS_COMMAND_TIMEOUT_SECS`: Per-command timeout (default: 2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    pub fn from_vars<F>(lookup: &F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: required(lookup, "REDIS_URL")?,
            connection_timeout_secs: parse_or(lookup, "REDIS_CONNECTION_TIMEOUT_SECS", 5)?,
            command_timeout_secs: parse_or(lookup, "REDIS_COMMAND_TIMEOUT_SECS", 2)?,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(&env_lookup)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Cloneable Redis handle shared through application state
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("url", &sanitize_url(&self.config.url))
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection
    /// cannot be established within the connection timeout.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let connect_timeout = Duration::from_secs(config.connection_timeout_secs);
        let manager = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisClientError::Timeout(connect_timeout))?
            .map_err(|e| {
                RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Runs a command future under the command timeout
    pub async fn run<T, F>(&self, command: F) -> Result<T, RedisClientError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        let limit = self.config.command_timeout();
        match tokio::time::timeout(limit, command).await {
            Ok(result) => result.map_err(RedisClientError::from),
            Err(_) => Err(RedisClientError::Timeout(limit)),
        }
    }

    /// Sends PING; `Ok(true)` on PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.get_connection();

        let pong: String = self
            .run(redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|e| RedisClientError::HealthCheckFailed(e.to_string()))?;

        Ok(pong == "PONG")
    }

    /// Returns a handle to the managed connection
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Replaces credentials in a Redis URL with `***:***` for logging
pub fn sanitize_url(url: &str) -> String {
    if let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) {
        if at_pos > scheme_end {
            return format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}
