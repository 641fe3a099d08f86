/// Configuration pieces common to both services
///
/// Each service owns a `Config` struct that is assembled from environment
/// variables. The helpers here do the parsing so that the services only
/// describe *which* variables they read. Every loader takes a lookup
/// function instead of reading `std::env` directly, which lets tests feed a
/// fixed set of variables.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (service-specific default)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: `*`)
/// - `PRODUCTION`: Enables HSTS and strict CORS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `SERVICE_API_KEY`: Shared secret for service-to-service calls (required)

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Minimum length accepted for shared secrets (JWT secret, service key)
pub const MIN_SECRET_LENGTH: usize = 32;

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,
}

impl ServerConfig {
    /// Loads server settings, falling back to `default_port`
    pub fn from_vars<F>(lookup: &F, default_port: u16) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(lookup, "API_PORT", default_port)?;
        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| vec!["*".to_string()]);
        let production = parse_bool(lookup, "PRODUCTION")?;

        Ok(Self {
            host,
            port,
            cors_origins,
            production,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether any origin is allowed
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn from_vars<F>(lookup: &F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: required(lookup, "DATABASE_URL")?,
            max_connections: parse_or(lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }
}

/// Reads a required variable
pub fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
}

/// Reads a required secret and enforces the minimum length
pub fn required_secret<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = required(lookup, key)?;
    if secret.len() < MIN_SECRET_LENGTH {
        anyhow::bail!(
            "{} must be at least {} characters long",
            key,
            MIN_SECRET_LENGTH
        );
    }
    Ok(secret)
}

/// Parses a variable, using `default` when it is unset
pub fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

/// Parses a boolean flag (`true/false/1/0/yes/no`), default false
pub fn parse_bool<F>(lookup: &F, key: &str) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off" | "") => Ok(false),
        Some(v) => anyhow::bail!("Invalid boolean for {}: {}", key, v),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Environment lookup used by `from_env` constructors
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_config_defaults() {
        let lookup = vars(&[]);
        let config = ServerConfig::from_vars(&lookup, 8081).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8081");
        assert!(config.allows_any_origin());
        assert!(!config.production);
    }

    #[test]
    fn test_server_config_overrides() {
        let lookup = vars(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://app.example.com, https://admin.example.com"),
            ("PRODUCTION", "true"),
        ]);
        let config = ServerConfig::from_vars(&lookup, 8081).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.cors_origins.len(), 2);
        assert!(!config.allows_any_origin());
        assert!(config.production);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let lookup = vars(&[("API_PORT", "not-a-port")]);
        assert!(ServerConfig::from_vars(&lookup, 8081).is_err());
    }

    #[test]
    fn test_required_secret_length() {
        let lookup = vars(&[("JWT_SECRET", "short")]);
        let err = required_secret(&lookup, "JWT_SECRET").unwrap_err();
        assert!(err.to_string().contains("at least 32"));

        let lookup = vars(&[("JWT_SECRET", "0123456789abcdef0123456789abcdef")]);
        assert!(required_secret(&lookup, "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_required_missing_and_blank() {
        let lookup = vars(&[("DATABASE_URL", "   ")]);
        assert!(required(&lookup, "DATABASE_URL").is_err());
        assert!(required(&lookup, "REDIS_URL").is_err());
    }

    #[test]
    fn test_parse_bool_values() {
        let lookup = vars(&[("A", "yes"), ("B", "0"), ("C", "maybe")]);
        assert!(parse_bool(&lookup, "A").unwrap());
        assert!(!parse_bool(&lookup, "B").unwrap());
        assert!(!parse_bool(&lookup, "MISSING").unwrap());
        assert!(parse_bool(&lookup, "C").is_err());
    }
}
