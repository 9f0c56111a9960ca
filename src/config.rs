//! Runtime configuration, read from the environment.
//!
//! - `PORT`: listen port, default `8000`. The host is `0.0.0.0` unless the
//!   `serve --host` flag says otherwise.
//! - `DATABASE_URL`: SQLite database path. When unset the database is reported
//!   as not configured and evaluation endpoints answer 500.
//! - `DATABASE_NAME`: display name of the database, reported by `/test`.
//! - `FETCH_MAX_RETRIES`, `FETCH_BACKOFF_MS`, `FETCH_TIMEOUT_SECS`: download
//!   retry policy, defaults `3`, `800`, `10`.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::FetchPolicy;

pub const DEFAULT_PORT: u16 = 8000;
pub const BIND_HOST: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    pub fetch: FetchPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::V4(BIND_HOST),
            port: DEFAULT_PORT,
            database_url: None,
            database_name: None,
            fetch: FetchPolicy::default(),
        }
    }
}

fn parse_var<T>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|e| ConfigError::ParseError {
                field: name.to_string(),
                error: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FetchPolicy::default();

        let port = parse_var("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let max_retries = parse_var("FETCH_MAX_RETRIES", lookup("FETCH_MAX_RETRIES"), defaults.max_retries)?;
        let backoff_ms = parse_var(
            "FETCH_BACKOFF_MS",
            lookup("FETCH_BACKOFF_MS"),
            defaults.backoff.as_millis() as u64,
        )?;
        let timeout_secs = parse_var(
            "FETCH_TIMEOUT_SECS",
            lookup("FETCH_TIMEOUT_SECS"),
            defaults.timeout.as_secs(),
        )?;

        Ok(ServerConfig {
            host: IpAddr::V4(BIND_HOST),
            port,
            database_url: non_empty(lookup("DATABASE_URL")),
            database_name: non_empty(lookup("DATABASE_NAME")),
            fetch: FetchPolicy {
                max_retries,
                backoff: Duration::from_millis(backoff_ms),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8000");
        assert!(config.database_url.is_none());
        assert!(config.database_name.is_none());
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.backoff, Duration::from_millis(800));
        assert_eq!(config.fetch.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "/tmp/eval.db"),
            ("DATABASE_NAME", "eval"),
            ("FETCH_MAX_RETRIES", "5"),
            ("FETCH_BACKOFF_MS", "10"),
            ("FETCH_TIMEOUT_SECS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:9000");
        assert_eq!(config.database_url.as_deref(), Some("/tmp/eval.db"));
        assert_eq!(config.database_name.as_deref(), Some("eval"));
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.backoff, Duration::from_millis(10));
        assert_eq!(config.fetch.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_empty_values_fall_back() {
        let config =
            ServerConfig::from_lookup(lookup(&[("PORT", ""), ("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(config.port, 8000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_port() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse PORT"));
    }
}
