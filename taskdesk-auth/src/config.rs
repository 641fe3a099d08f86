/// Configuration for the authentication service
///
/// # Environment Variables
///
/// Shared (see `taskdesk_shared::config`): `API_HOST`, `API_PORT` (default
/// 8081), `CORS_ORIGINS`, `PRODUCTION`, `DATABASE_URL`,
/// `DATABASE_MAX_CONNECTIONS`, `SERVICE_API_KEY`.
///
/// Service specific:
///
/// - `REDIS_URL`: Redis connection URL (required)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `JWT_ISSUER`: `iss` claim (default: taskdesk)
/// - `ACCESS_TOKEN_TTL_SECS`: Access token lifetime (default: 900)
/// - `REFRESH_TOKEN_TTL_SECS`: Refresh token and session lifetime (default: 604800)
/// - `LOGIN_MAX_ATTEMPTS`: Failed logins per identifier per window (default: 5)
/// - `LOGIN_IP_MAX_ATTEMPTS`: Failed logins per IP per window (default: 20)
/// - `LOGIN_WINDOW_SECS`: Login lockout window (default: 900)
/// - `AUTH_RATE_LIMIT_PER_MINUTE`: Requests per IP per minute (default: 60)
/// - `TRUST_PROXY_HEADERS`: Take the client IP from `X-Forwarded-For` /
///   `X-Real-IP`; only enable behind a proxy that overwrites them (default: false)
///
/// # Example
///
/// ```no_run
/// use taskdesk_auth::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Auth service will listen on {}", config.server.bind_address());
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use taskdesk_shared::{
    auth::jwt::DEFAULT_ISSUER,
    config::{env_lookup, parse_bool, parse_or, required_secret, DatabaseSettings, ServerConfig},
    redis::RedisConfig,
};

/// Default port of the authentication service
pub const DEFAULT_PORT: u16 = 8081;

/// Complete service configuration
#[derive(Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub limits: LimitsConfig,

    /// Key the task service must present on `verify-token`
    pub service_api_key: String,

    /// Whether forwarding headers name the client for limits and auditing
    pub trust_proxy_headers: bool,
}

/// Token signing settings
#[derive(Clone)]
pub struct JwtConfig {
    /// HS256 secret (generate with `openssl rand -hex 32`)
    pub secret: String,
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl JwtConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl_secs)
    }
}

/// Brute-force and request rate limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    pub login_max_attempts: u64,
    pub login_ip_max_attempts: u64,
    pub login_window_secs: u64,
    pub requests_per_minute: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            login_max_attempts: 5,
            login_ip_max_attempts: 20,
            login_window_secs: 900,
            requests_per_minute: 60,
        }
    }
}

impl Config {
    /// Builds the configuration from a variable lookup
    pub fn from_vars<F>(lookup: &F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LimitsConfig::default();

        let jwt = JwtConfig {
            secret: required_secret(lookup, "JWT_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            access_ttl_secs: parse_or(lookup, "ACCESS_TOKEN_TTL_SECS", 900)?,
            refresh_ttl_secs: parse_or(lookup, "REFRESH_TOKEN_TTL_SECS", 604_800)?,
        };

        if jwt.access_ttl_secs <= 0 || jwt.refresh_ttl_secs <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }
        if jwt.refresh_ttl_secs <= jwt.access_ttl_secs {
            anyhow::bail!("REFRESH_TOKEN_TTL_SECS must be longer than ACCESS_TOKEN_TTL_SECS");
        }

        let limits = LimitsConfig {
            login_max_attempts: parse_or(lookup, "LOGIN_MAX_ATTEMPTS", defaults.login_max_attempts)?,
            login_ip_max_attempts: parse_or(
                lookup,
                "LOGIN_IP_MAX_ATTEMPTS",
                defaults.login_ip_max_attempts,
            )?,
            login_window_secs: parse_or(lookup, "LOGIN_WINDOW_SECS", defaults.login_window_secs)?,
            requests_per_minute: parse_or(
                lookup,
                "AUTH_RATE_LIMIT_PER_MINUTE",
                defaults.requests_per_minute,
            )?,
        };

        Ok(Self {
            server: ServerConfig::from_vars(lookup, DEFAULT_PORT)?,
            database: DatabaseSettings::from_vars(lookup)?,
            redis: RedisConfig::from_vars(lookup)?,
            jwt,
            limits,
            service_api_key: required_secret(lookup, "SERVICE_API_KEY")?,
            trust_proxy_headers: parse_bool(lookup, "TRUST_PROXY_HEADERS")?,
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
            .field("jwt_issuer", &self.jwt.issuer)
            .field("access_ttl_secs", &self.jwt.access_ttl_secs)
            .field("refresh_ttl_secs", &self.jwt.refresh_ttl_secs)
            .field("limits", &self.limits)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}
