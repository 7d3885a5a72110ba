//! Service configuration.
//!
//! The canonical configuration lives in `sentinel-config.yaml` (path
//! overridable with `SENTINEL_CONFIG`). Every section and field has a
//! default, so a missing file or an empty section is valid.
//!
//! A few settings can be overridden from the environment so deployments
//! do not need to edit the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SENTINEL_ENDPOINT` | `transport.endpoint` |
//! | `SENTINEL_MAX_ACTIONS` | `engine.max_actions_per_tick` |
//! | `SENTINEL_BUDGET_MS` | `processor.decision_budget_ms` |
//! | `SENTINEL_LOG_FORMAT` | `logging.format` (`text` or `json`) |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sentinel_combat::{CombatConfig, RecoveryConfig};
use sentinel_core::{EngineConfig, ProcessorConfig};
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "SENTINEL_CONFIG";

/// Config file used when `SENTINEL_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "sentinel-config.yaml";

const ENV_ENDPOINT: &str = "SENTINEL_ENDPOINT";
const ENV_MAX_ACTIONS: &str = "SENTINEL_MAX_ACTIONS";
const ENV_BUDGET_MS: &str = "SENTINEL_BUDGET_MS";
const ENV_LOG_FORMAT: &str = "SENTINEL_LOG_FORMAT";

/// Top-level service configuration, mirroring `sentinel-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceConfig {
    /// Listener and framing settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// History and latency settings.
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Action cap and subsystem switches.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Tactical controller tuning.
    #[serde(default)]
    pub combat: CombatConfig,

    /// Recovery subsystem tuning.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Log level and format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if it is not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid configuration.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file) for a file that exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `SENTINEL_*` overrides, reading variables through `lookup`.
    ///
    /// `main` passes `std::env::var`; tests pass a map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a set variable does not
    /// parse.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.transport.endpoint = endpoint;
        }
        if let Some(value) = lookup(ENV_MAX_ACTIONS) {
            self.engine.max_actions_per_tick = parse_env(ENV_MAX_ACTIONS, value)?;
        }
        if let Some(value) = lookup(ENV_BUDGET_MS) {
            self.processor.decision_budget_ms = parse_env(ENV_BUDGET_MS, value)?;
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = parse_env(ENV_LOG_FORMAT, value)?;
        }
        Ok(())
    }
}

fn parse_env<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        reason: e.to_string(),
        value,
    })
}

/// Listener and framing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// `tcp://host:port` or `host:port`; `*` binds every interface.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// How long one receive waits before re-checking for shutdown.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    /// How long one reply may take to send before the peer is dropped.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Largest accepted frame, newline excluded.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl TransportConfig {
    /// Receive poll interval.
    pub const fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Send deadline.
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            recv_timeout_ms: default_recv_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_endpoint() -> String {
    String::from("tcp://127.0.0.1:5555")
}

const fn default_recv_timeout_ms() -> u64 {
    100
}

const fn default_send_timeout_ms() -> u64 {
    1_000
}

const fn default_max_frame_bytes() -> usize {
    1_048_576
}

fn default_log_level() -> String {
    String::from("info")
}
