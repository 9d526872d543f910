//! Configuration file parsing and structures.
//!
//! The daemon reads a single TOML file. Only `[gateway]` is required; every
//! other section falls back to its defaults.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"wallpad::connection" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Where the RS485-to-TCP bridge lives and how to talk to it
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Seconds between reconnect attempts after the bus drops. 0 disables.
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Frames buffered between the read task and the receive loop
    #[serde(default = "default_frame_channel_size")]
    pub frame_channel_size: usize,
}

fn default_port() -> u16 {
    8899
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_reconnect_interval_secs() -> u64 {
    10
}

fn default_frame_channel_size() -> usize {
    256
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_interval(&self) -> Option<Duration> {
        match self.reconnect_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Entity persistence
#[derive(Debug, Default, Deserialize)]
pub struct RegistryConfig {
    /// JSON file holding known identities. Nothing is persisted when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ScanConfig {
    /// Probe platforms that have no known entities at startup
    #[serde(default = "default_scan_enabled")]
    pub enabled: bool,
}

fn default_scan_enabled() -> bool {
    true
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: default_scan_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
