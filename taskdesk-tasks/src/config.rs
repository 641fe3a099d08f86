/// Configuration for the task service
///
/// # Environment Variables
///
/// Shared (see `taskdesk_shared::config`): `API_HOST`, `API_PORT` (default
/// 8082), `CORS_ORIGINS`, `PRODUCTION`, `DATABASE_URL`,
/// `DATABASE_MAX_CONNECTIONS`, `SERVICE_API_KEY`.
///
/// Service specific:
///
/// - `AUTH_SERVICE_URL`: Base URL of the auth service (default: http://localhost:8081)
/// - `AUTH_SERVICE_TIMEOUT_SECS`: Timeout for verify-token calls (default: 5)

use std::time::Duration;
use taskdesk_shared::config::{
    env_lookup, parse_or, required_secret, DatabaseSettings, ServerConfig,
};

/// Default port of the task service
pub const DEFAULT_PORT: u16 = 8082;

/// Complete service configuration
#[derive(Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub auth_service: AuthServiceConfig,
}

/// Where and how to reach the auth service
#[derive(Clone)]
pub struct AuthServiceConfig {
    /// Base URL without trailing slash
    pub url: String,

    pub timeout_secs: u64,

    /// Sent as `X-Service-Key`
    pub service_api_key: String,
}

impl AuthServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Builds the configuration from a variable lookup
    pub fn from_vars<F>(lookup: &F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("AUTH_SERVICE_URL")
            .unwrap_or_else(|| "http://localhost:8081".to_string())
            .trim_end_matches('/')
            .to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("AUTH_SERVICE_URL must start with http:// or https://");
        }

        let timeout_secs = parse_or(lookup, "AUTH_SERVICE_TIMEOUT_SECS", 5u64)?;
        if timeout_secs == 0 {
            anyhow::bail!("AUTH_SERVICE_TIMEOUT_SECS must be at least 1");
        }

        Ok(Self {
            server: ServerConfig::from_vars(lookup, DEFAULT_PORT)?,
            database: DatabaseSettings::from_vars(lookup)?,
            auth_service: AuthServiceConfig {
                url,
                timeout_secs,
                service_api_key: required_secret(lookup, "SERVICE_API_KEY")?,
            },
        })
    }

    /// Loads configuration from the environment (and `.env` if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(&env_lookup)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("auth_service_url", &self.auth_service.url)
            .field("auth_service_timeout_secs", &self.auth_service.timeout_secs)
            .finish_non_exhaustive()
    }
}
