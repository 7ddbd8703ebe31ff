//! Configuration management for the pcwake daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/pcwake/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::default_data_dir;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("monitor.interval_secs must be greater than 0")]
    InvalidInterval,

    #[error("{0} must be greater than 0")]
    InvalidTimeout(&'static str),

    #[error("wake.broadcast_addr must be an IP:port pair, got {0}")]
    InvalidBroadcastAddr(String),

    #[error("wake.command must not be empty when wake.method = \"command\"")]
    EmptyWakeCommand,

    #[error("monitor.probe_timeout_secs must be at least 2 so ping can give up first, got {0}")]
    ProbeTimeoutTooShort(u64),

    #[error("monitor.ping_command must not be empty")]
    EmptyPingCommand,

    #[error("display.api_base must start with http:// or https://, got {0}")]
    InvalidApiBase(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the pcwake daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Reachability monitor configuration.
    pub monitor: MonitorConfig,

    /// How the wake signal is sent.
    pub wake: WakeConfig,

    /// Chat display configuration.
    pub display: DisplayConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding the device record.
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for rotated log files. Logs go to stderr only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Reachability monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between two probes.
    pub interval_secs: u64,

    /// Seconds a single probe may take before it counts as failed.
    pub probe_timeout_secs: u64,

    /// Program used for the echo request.
    pub ping_command: String,
}

/// Mechanism used to emit the wake signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WakeMethod {
    /// Broadcast the magic packet from the daemon itself.
    Udp,
    /// Run an external program with the MAC address as its only argument.
    Command,
}

/// Wake signal configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WakeConfig {
    pub method: WakeMethod,

    /// Destination of the magic packet for the `udp` method.
    pub broadcast_addr: String,

    /// Program run by the `command` method.
    pub command: String,

    /// Seconds a dispatch may take before it counts as failed.
    pub timeout_secs: u64,
}

/// Chat display configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Base URL of the chat REST API.
    pub api_base: String,

    /// Bot token. The display is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Seconds a single display request may take.
    pub timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            probe_timeout_secs: 5,
            ping_command: "ping".to_string(),
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            method: WakeMethod::Udp,
            broadcast_addr: "255.255.255.255:9".to_string(),
            command: "wakeonlan".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            api_base: crate::display::discord::DEFAULT_API_BASE.to_string(),
            bot_token: None,
            timeout_secs: 10,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// How long `ping` waits for a reply.
    ///
    /// One second less than the probe deadline, so an unanswered echo
    /// ends as "offline" instead of being cut off as a timeout.
    pub fn ping_wait(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.saturating_sub(1).max(1))
    }
}

impl WakeConfig {
    /// Parsed magic packet destination.
    pub fn destination(&self) -> Result<SocketAddr, ConfigError> {
        self.broadcast_addr
            .parse()
            .map_err(|_| ConfigError::InvalidBroadcastAddr(self.broadcast_addr.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DisplayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The bot token, if one is set and non-blank.
    pub fn token(&self) -> Option<&str> {
        self.bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pcwake")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - PCWAKE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - PCWAKE_BOT_TOKEN: Override the chat bot token
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PCWAKE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(token) = std::env::var("PCWAKE_BOT_TOKEN") {
            if !token.is_empty() {
                tracing::info!("Overriding display.bot_token from environment");
                self.display.bot_token = Some(token);
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        for (field, value) in [
            ("monitor.probe_timeout_secs", self.monitor.probe_timeout_secs),
            ("wake.timeout_secs", self.wake.timeout_secs),
            ("display.timeout_secs", self.display.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTimeout(field));
            }
        }

        if self.monitor.probe_timeout_secs < 2 {
            return Err(ConfigError::ProbeTimeoutTooShort(
                self.monitor.probe_timeout_secs,
            ));
        }
        if self.monitor.ping_command.trim().is_empty() {
            return Err(ConfigError::EmptyPingCommand);
        }

        match self.wake.method {
            WakeMethod::Udp => {
                self.wake.destination()?;
            }
            WakeMethod::Command => {
                if self.wake.command.trim().is_empty() {
                    return Err(ConfigError::EmptyWakeCommand);
                }
            }
        }

        let api_base = &self.display.api_base;
        if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
            return Err(ConfigError::InvalidApiBase(api_base.clone()));
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
