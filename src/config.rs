use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 characters long")]
    WeakSecret,
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings shared by the three services. Each binary reads the same
/// variables and ignores the ones it does not need.
#[derive(Clone, Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub user_service_url: String,
    pub gitlab_api_base: String,
    pub gitlab_token: Option<String>,
    pub frontend_url: Option<String>,
    /// Shared secret for `/api/v1/internal/**` calls between services.
    pub service_token: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub retry: RetryPolicy,
}

fn opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match opt(name) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(default),
    }
}

impl Config {
    /// Reads configuration from the environment. `default_port` is the
    /// per-service fallback when `PORT` is unset.
    pub fn from_env(default_port: u16) -> Result<Self, ConfigError> {
        let jwt_secret = opt("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        Ok(Self {
            jwt_secret,
            access_token_ttl: Duration::from_secs(parse_or("ACCESS_TOKEN_TTL_SECS", 30 * 60)?),
            refresh_token_ttl: Duration::from_secs(parse_or("REFRESH_TOKEN_TTL_SECS", 14 * 24 * 60 * 60)?),
            database_url: opt("DATABASE_URL"),
            redis_url: opt("REDIS_URL"),
            user_service_url: opt("USER_SERVICE_URL").unwrap_or_else(|| "http://localhost:8082".into()),
            gitlab_api_base: opt("GITLAB_API_BASE").unwrap_or_else(|| "https://gitlab.com/api/v4".into()),
            gitlab_token: opt("GITLAB_TOKEN"),
            frontend_url: opt("FRONTEND_URL"),
            service_token: opt("INTERNAL_SERVICE_TOKEN"),
            bind_addr: opt("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or("PORT", default_port)?,
            retry: RetryPolicy::new(
                parse_or("CLIENT_RETRY_ATTEMPTS", 3)?,
                Duration::from_millis(parse_or("CLIENT_RETRY_BACKOFF_MS", 1000)?),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

    fn clear() {
        for k in ["JWT_SECRET", "ACCESS_TOKEN_TTL_SECS", "PORT", "CLIENT_RETRY_ATTEMPTS", "DATABASE_URL", "INTERNAL_SERVICE_TOKEN"] {
            env::remove_var(k);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply() {
        clear();
        env::set_var("JWT_SECRET", SECRET);
        let cfg = Config::from_env(8083).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.access_token_ttl, Duration::from_secs(1800));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert!(cfg.database_url.is_none());
        assert!(cfg.service_token.is_none());
    }

    #[test]
    #[serial]
    fn short_secret_rejected() {
        clear();
        env::set_var("JWT_SECRET", "short");
        assert!(matches!(Config::from_env(1), Err(ConfigError::WeakSecret)));
        env::remove_var("JWT_SECRET");
        assert!(matches!(Config::from_env(1), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    #[serial]
    fn invalid_number_reported() {
        clear();
        env::set_var("JWT_SECRET", SECRET);
        env::set_var("PORT", "eighty");
        let err = Config::from_env(1).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        env::remove_var("PORT");
    }
}
