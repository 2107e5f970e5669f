//! # Runtime Configuration
//!
//! Everything the runtime needs, read from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STATS_RPC_URL` | `http://127.0.0.1:8332` |
//! | `STATS_RPC_USER` / `STATS_RPC_PASSWORD` | unset (no auth) |
//! | `STATS_DATA_DIR` | `./data/stats` |
//! | `STATS_POLL_INTERVAL_MS` | `2000` |
//! | `STATS_RPC_TIMEOUT_SECS` | `30` |
//! | `STATS_LOG_LEVEL` | `info` (`RUST_LOG` wins when set) |
//! | `STATS_JSON_LOGS` | `false` |

use std::path::PathBuf;
use std::time::Duration;

use stats_engine::StatsConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Node JSON-RPC connection settings.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Endpoint URL.
    pub url: String,
    /// Basic auth user.
    pub user: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332".to_string(),
            user: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Node connection.
    pub rpc: RpcConfig,
    /// RocksDB directory.
    pub data_dir: PathBuf,
    /// How often the tip is polled.
    pub poll_interval: Duration,
    /// Logging.
    pub log: LogConfig,
    /// Engine settings.
    pub stats: StatsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            data_dir: PathBuf::from("./data/stats"),
            poll_interval: Duration::from_millis(2_000),
            log: LogConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("STATS_RPC_URL") {
            config.rpc.url = url;
        }
        config.rpc.user = lookup("STATS_RPC_USER").filter(|v| !v.is_empty());
        config.rpc.password = lookup("STATS_RPC_PASSWORD");

        if let Some(dir) = lookup("STATS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("STATS_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse_positive("STATS_POLL_INTERVAL_MS", &raw)?);
        }
        if let Some(raw) = lookup("STATS_RPC_TIMEOUT_SECS") {
            config.rpc.timeout = Duration::from_secs(parse_positive("STATS_RPC_TIMEOUT_SECS", &raw)?);
        }
        if let Some(level) = lookup("STATS_LOG_LEVEL") {
            config.log.level = level;
        }
        if let Some(raw) = lookup("STATS_JSON_LOGS") {
            config.log.json = parse_bool("STATS_JSON_LOGS", &raw)?;
        }

        Ok(config)
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
