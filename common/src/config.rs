//! Service configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory. A `.env` entry never overrides a variable
//! that is already set.

use std::path::Path;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

/// Table probed when `PROBE_TABLE` is not set.
pub const DEFAULT_PROBE_TABLE: &str = "demo";
/// Row sample size when `PROBE_SAMPLE_LIMIT` is not set.
pub const DEFAULT_SAMPLE_LIMIT: u32 = 3;

/// Runtime configuration shared by the service and its tests.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name, used in logs and response metadata.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Connection URL of the probed database (`mysql://`, `postgres://`, `sqlite:`).
    pub database_url: Option<String>,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
    /// Pool acquire timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Table checked by the schema probes.
    pub probe_table: String,
    /// Default row sample size.
    pub sample_limit: u32,
    /// Run every probe once at startup and log the report.
    pub probe_on_startup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "probe-service".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8085,
            database_url: None,
            max_connections: 5,
            connect_timeout_secs: 5,
            probe_table: DEFAULT_PROBE_TABLE.to_string(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            probe_on_startup: true,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment for the named service.
    ///
    /// `default_port` is used when `SERVER_PORT` is unset or unparsable.
    pub fn load_with_service(service_name: &str, default_port: u16) -> Self {
        Self::from_lookup(service_name, default_port, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, default_port: u16, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "SERVER_PORT").unwrap_or(default_port),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_connections),
            connect_timeout_secs: parse_var(&lookup, "DB_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
            probe_table: lookup("PROBE_TABLE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.probe_table),
            sample_limit: parse_var(&lookup, "PROBE_SAMPLE_LIMIT").unwrap_or(defaults.sample_limit),
            probe_on_startup: lookup("PROBE_ON_STARTUP")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.probe_on_startup),
        }
    }

    /// Returns the database URL or a configuration error when it is missing.
    pub fn database_url(&self) -> AppResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::Config("DATABASE_URL is not set".into()))
    }

    /// Bind address in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads `key` through `lookup` and parses it; unset or unparsable is `None`.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Parses `KEY=VALUE` lines, skipping blanks and `#` comments.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Loads `.env` from the given path into the process environment (best-effort).
///
/// Call it first thing in `main`, before any task reads the environment.
pub fn load_dotenv(path: &Path) -> usize {
    let Ok(content) = std::fs::read_to_string(path) else {
        return 0;
    };
    let mut applied = 0;
    for (key, value) in parse_dotenv(&content) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup("probe-service", 9000, lookup_from(&[]));
        assert_eq!(config.port, 9000);
        assert_eq!(config.probe_table, "demo");
        assert_eq!(config.sample_limit, 3);
        assert!(config.database_url.is_none());
        assert!(config.database_url().is_err());
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = AppConfig::from_lookup(
            "probe-service",
            9000,
            lookup_from(&[
                ("SERVER_PORT", "8123"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("DB_MAX_CONNECTIONS", "2"),
                ("PROBE_TABLE", "people"),
                ("PROBE_SAMPLE_LIMIT", "10"),
                ("PROBE_ON_STARTUP", "false"),
            ]),
        );
        assert_eq!(config.port, 8123);
        assert_eq!(config.database_url().unwrap(), "sqlite::memory:");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.probe_table, "people");
        assert_eq!(config.sample_limit, 10);
        assert!(!config.probe_on_startup);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = AppConfig::from_lookup(
            "probe-service",
            9000,
            lookup_from(&[("SERVER_PORT", "http"), ("DB_MAX_CONNECTIONS", "0")]),
        );
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_each_numeric_field_keeps_its_own_type() {
        let config = AppConfig::from_lookup(
            "probe-service",
            9000,
            lookup_from(&[
                ("SERVER_PORT", "65535"),
                ("DB_MAX_CONNECTIONS", "70000"),
                ("DB_CONNECT_TIMEOUT_SECS", "5000000000"),
                ("PROBE_SAMPLE_LIMIT", " 42 "),
            ]),
        );
        assert_eq!(config.port, u16::MAX);
        assert_eq!(config.max_connections, 70_000);
        assert_eq!(config.connect_timeout_secs, 5_000_000_000);
        assert_eq!(config.sample_limit, 42);

        // 70000 does not fit a port
        let config = AppConfig::from_lookup(
            "probe-service",
            9000,
            lookup_from(&[("SERVER_PORT", "70000")]),
        );
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_parse_dotenv() {
        let pairs = parse_dotenv(
            "# comment\n\nDATABASE_URL=\"mysql://root:pw@localhost/app\"\n PROBE_TABLE = demo \nnot a pair\n",
        );
        assert_eq!(
            pairs,
            vec![
                (
                    "DATABASE_URL".to_string(),
                    "mysql://root:pw@localhost/app".to_string()
                ),
                ("PROBE_TABLE".to_string(), "demo".to_string()),
            ]
        );
    }
}
