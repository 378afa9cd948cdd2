//! Environment configuration for both binaries

use crate::delivery::{Granularity, DEFAULT_TICK};
use crate::llm::LlmConfig;
use crate::transport::DEFAULT_TIMEOUT;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787";

/// Value of `TEAMMATE_DB_PATH` that keeps the session in memory only
pub const IN_MEMORY_DB: &str = ":memory:";

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
    }
}

/// Settings for the `teammate` backend
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub llm: LlmConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_or(&|k: &str| std::env::var(k).ok(), "TEAMMATE_PORT", DEFAULT_PORT),
            llm: LlmConfig::from_env(),
        }
    }
}

/// Settings for the `teammate-chat` terminal client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// `None` keeps the session in memory
    pub db_path: Option<PathBuf>,
    pub tick: Duration,
    pub granularity: Granularity,
    pub http_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = match lookup("TEAMMATE_DB_PATH") {
            Some(path) if path.trim() == IN_MEMORY_DB => None,
            Some(path) if !path.trim().is_empty() => Some(PathBuf::from(path.trim())),
            _ => {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                Some(PathBuf::from(format!("{home}/.teammate/teammate.db")))
            }
        };

        let granularity = match lookup("TEAMMATE_STREAM_UNIT") {
            None => Granularity::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Ignoring TEAMMATE_STREAM_UNIT");
                Granularity::default()
            }),
        };

        let tick_ms = parse_or(&lookup, "TEAMMATE_TICK_MS", duration_ms(DEFAULT_TICK));
        let timeout_secs = parse_or(
            &lookup,
            "TEAMMATE_HTTP_TIMEOUT_SECS",
            DEFAULT_TIMEOUT.as_secs(),
        );

        Self {
            endpoint: lookup("TEAMMATE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            db_path,
            tick: Duration::from_millis(tick_ms),
            granularity,
            http_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_client_defaults() {
        let config = config(&[("HOME", "/home/sam")]);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/home/sam/.teammate/teammate.db"))
        );
        assert_eq!(config.tick, Duration::from_millis(20));
        assert_eq!(config.granularity, Granularity::Char);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_client_overrides() {
        let config = config(&[
            ("TEAMMATE_ENDPOINT", "http://backend:9000"),
            ("TEAMMATE_DB_PATH", "/data/session.db"),
            ("TEAMMATE_TICK_MS", "5"),
            ("TEAMMATE_STREAM_UNIT", "word"),
            ("TEAMMATE_HTTP_TIMEOUT_SECS", "10"),
        ]);
        assert_eq!(config.endpoint, "http://backend:9000");
        assert_eq!(config.db_path, Some(PathBuf::from("/data/session.db")));
        assert_eq!(config.tick, Duration::from_millis(5));
        assert_eq!(config.granularity, Granularity::Word);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_in_memory_db() {
        assert!(config(&[("TEAMMATE_DB_PATH", ":memory:")]).db_path.is_none());
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config(&[
            ("TEAMMATE_TICK_MS", "fast"),
            ("TEAMMATE_STREAM_UNIT", "sentence"),
        ]);
        assert_eq!(config.tick, DEFAULT_TICK);
        assert_eq!(config.granularity, Granularity::Char);
    }
}
