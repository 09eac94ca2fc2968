//! Configuration Module
//!
//! Loads the gateway configuration from environment variables. Unset or
//! unparsable variables fall back to their defaults; [`Config::validate`]
//! rejects values no component can work with.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use axum::http::StatusCode;

use crate::cache::{DEFAULT_CACHE_TTL, DEFAULT_MISS_TTL};
use crate::error::{CoordError, Result};
use crate::limiter::{FailPolicy, RateLimitRule, DEFAULT_LIMIT, DEFAULT_WINDOW_SECS};

const DEFAULT_LOCK_TTL: u64 = 10;

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Entry bound of the in-process store
    pub max_entries: usize,
    /// Active-expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Upper bound on a single store call in milliseconds
    pub store_timeout_ms: u64,
    /// Namespace prefix for every key the gateway writes
    pub key_prefix: String,
    pub rate_limit: u64,
    pub rate_window: u64,
    /// Admit requests while the store is unreachable
    pub rate_fail_open: bool,
    pub rate_limit_status: u16,
    /// TTL of per-request locks in seconds
    pub lock_ttl: u64,
    pub lock_status: u16,
    pub cache_ttl: u64,
    pub miss_ttl: u64,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` (default: 3000)
    /// - `MAX_ENTRIES` (default: 10000)
    /// - `CLEANUP_INTERVAL` seconds (default: 1)
    /// - `STORE_TIMEOUT_MS` (default: 500)
    /// - `KEY_PREFIX` (default: mini_coord)
    /// - `RATE_LIMIT` / `RATE_WINDOW` (default: 5 requests per 3 seconds)
    /// - `RATE_FAIL_OPEN` (default: true)
    /// - `RATE_LIMIT_STATUS` / `LOCK_STATUS` (default: 429)
    /// - `LOCK_TTL` seconds (default: 10)
    /// - `CACHE_TTL` / `MISS_TTL` seconds (default: 600)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from any name-to-value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            server_port: parsed(&lookup, "SERVER_PORT", defaults.server_port),
            max_entries: parsed(&lookup, "MAX_ENTRIES", defaults.max_entries),
            cleanup_interval: parsed(&lookup, "CLEANUP_INTERVAL", defaults.cleanup_interval),
            store_timeout_ms: parsed(&lookup, "STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            key_prefix: lookup("KEY_PREFIX").unwrap_or(defaults.key_prefix),
            rate_limit: parsed(&lookup, "RATE_LIMIT", defaults.rate_limit),
            rate_window: parsed(&lookup, "RATE_WINDOW", defaults.rate_window),
            rate_fail_open: lookup("RATE_FAIL_OPEN")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.rate_fail_open),
            rate_limit_status: parsed(&lookup, "RATE_LIMIT_STATUS", defaults.rate_limit_status),
            lock_ttl: parsed(&lookup, "LOCK_TTL", defaults.lock_ttl),
            lock_status: parsed(&lookup, "LOCK_STATUS", defaults.lock_status),
            cache_ttl: parsed(&lookup, "CACHE_TTL", defaults.cache_ttl),
            miss_ttl: parsed(&lookup, "MISS_TTL", defaults.miss_ttl),
        }
    }

    /// Rejects zero TTLs, limits and timeouts, an empty key prefix and
    /// status codes outside the HTTP range.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("MAX_ENTRIES", self.max_entries as u64),
            ("CLEANUP_INTERVAL", self.cleanup_interval),
            ("STORE_TIMEOUT_MS", self.store_timeout_ms),
            ("RATE_LIMIT", self.rate_limit),
            ("RATE_WINDOW", self.rate_window),
            ("LOCK_TTL", self.lock_ttl),
            ("CACHE_TTL", self.cache_ttl),
            ("MISS_TTL", self.miss_ttl),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(CoordError::InvalidConfig(format!("{} must be greater than zero", name)));
        }
        if self.key_prefix.is_empty() {
            return Err(CoordError::InvalidConfig("KEY_PREFIX cannot be empty".to_string()));
        }
        if self.key_prefix.contains(':') {
            return Err(CoordError::InvalidConfig("KEY_PREFIX cannot contain ':'".to_string()));
        }
        for (name, code) in [
            ("RATE_LIMIT_STATUS", self.rate_limit_status),
            ("LOCK_STATUS", self.lock_status),
        ] {
            status_code(name, code)?;
        }
        Ok(())
    }

    pub fn rate_rule(&self) -> Result<RateLimitRule> {
        RateLimitRule::new(self.rate_limit, self.rate_window)
    }

    pub fn fail_policy(&self) -> FailPolicy {
        FailPolicy::from_fail_open(self.rate_fail_open)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn rate_limit_status(&self) -> Result<StatusCode> {
        status_code("RATE_LIMIT_STATUS", self.rate_limit_status)
    }

    pub fn lock_status(&self) -> Result<StatusCode> {
        status_code("LOCK_STATUS", self.lock_status)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            max_entries: 10_000,
            cleanup_interval: 1,
            store_timeout_ms: 500,
            key_prefix: "mini_coord".to_string(),
            rate_limit: DEFAULT_LIMIT,
            rate_window: DEFAULT_WINDOW_SECS,
            rate_fail_open: true,
            rate_limit_status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            cache_ttl: DEFAULT_CACHE_TTL,
            miss_ttl: DEFAULT_MISS_TTL,
        }
    }
}

fn parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn status_code(name: &str, code: u16) -> Result<StatusCode> {
    StatusCode::from_u16(code)
        .map_err(|_| CoordError::InvalidConfig(format!("{} is not an HTTP status: {}", name, code)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.rate_window, 3);
        assert_eq!(config.lock_ttl, 10);
        assert_eq!(config.cache_ttl, 600);
        assert_eq!(config.miss_ttl, 600);
        assert!(config.rate_fail_open);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_source_yields_defaults() {
        assert_eq!(lookup(&[]), Config::default());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = lookup(&[
            ("SERVER_PORT", "8080"),
            ("RATE_LIMIT", " 20 "),
            ("RATE_WINDOW", "soon"),
            ("RATE_FAIL_OPEN", "off"),
            ("KEY_PREFIX", "shop"),
        ]);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.rate_limit, 20);
        assert_eq!(config.rate_window, 3);
        assert!(!config.rate_fail_open);
        assert_eq!(config.fail_policy(), FailPolicy::Closed);
        assert_eq!(config.key_prefix, "shop");
    }

    #[test]
    fn test_validate_rejects_zero_and_empty() {
        let zero_window = Config {
            rate_window: 0,
            ..Config::default()
        };
        assert!(matches!(zero_window.validate(), Err(CoordError::InvalidConfig(_))));

        let zero_timeout = Config {
            store_timeout_ms: 0,
            ..Config::default()
        };
        assert!(zero_timeout.validate().is_err());

        let no_prefix = Config {
            key_prefix: String::new(),
            ..Config::default()
        };
        assert!(no_prefix.validate().is_err());

        let nested_prefix = Config {
            key_prefix: "shop:eu".to_string(),
            ..Config::default()
        };
        assert!(nested_prefix.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_status() {
        let config = Config {
            lock_status: 42,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(Config::default().lock_status().unwrap(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_derived_values() {
        let config = Config::default();
        assert_eq!(config.store_timeout(), Duration::from_millis(500));
        assert_eq!(config.rate_rule().unwrap(), RateLimitRule::default());
    }
}
