//! # Configuration Management
//!
//! Centralized configuration for the multiboot host.
//!
//! This module covers the link the session runs over, the polling behaviour of
//! the two wait phases, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - `MULTIBOOT_*` environment overrides via `from_env()`
//!
//! ## Polling
//! Classic multiboot loaders poll every 10 ms with no limit. The default here keeps
//! the interval but gives up after 30 seconds; a zero timeout together with zero
//! max attempts restores the unbounded wait.

use crate::error::{ProtocolError, Result};
use crate::protocol::exchanger::PollPolicy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Delay between polling attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the peer before giving up
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default device path for a serial bridge link
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyACM0";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MultibootConfig {
    /// Link configuration
    #[serde(default)]
    pub link: LinkConfig,

    /// Polling configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MultibootConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `MULTIBOOT_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var("MULTIBOOT_LINK_KIND") {
            self.link.kind = kind.parse()?;
        }

        if let Ok(path) = std::env::var("MULTIBOOT_LINK_PATH") {
            self.link.path = path;
        }

        if let Ok(interval) = std::env::var("MULTIBOOT_POLL_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                self.poll.interval = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("MULTIBOOT_POLL_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                self.poll.timeout = Duration::from_millis(val);
            }
        }

        if let Ok(attempts) = std::env::var("MULTIBOOT_POLL_MAX_ATTEMPTS") {
            if let Ok(val) = attempts.parse::<u32>() {
                self.poll.max_attempts = val;
            }
        }

        if let Ok(level) = std::env::var("MULTIBOOT_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                self.logging.log_level = val;
            }
        }

        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.link.validate());
        errors.extend(self.poll.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// What carries the words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Character device or serial bridge, opened read/write
    Device,
    /// Unix domain socket bridge
    Socket,
    /// In-process emulated peer
    Emulated,
}

impl std::str::FromStr for LinkKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "device" => Ok(LinkKind::Device),
            "socket" => Ok(LinkKind::Socket),
            "emulated" => Ok(LinkKind::Emulated),
            other => Err(ProtocolError::ConfigError(format!(
                "Unknown link kind: '{other}' (expected device, socket or emulated)"
            ))),
        }
    }
}

/// Link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Transport used for the session
    pub kind: LinkKind,

    /// Device or socket path (ignored for the emulated link)
    pub path: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            kind: LinkKind::Device,
            path: String::from(DEFAULT_DEVICE_PATH),
        }
    }
}

impl LinkConfig {
    /// Validate link configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.kind != LinkKind::Emulated && self.path.is_empty() {
            errors.push("Link path cannot be empty".to_string());
        }

        if self.kind == LinkKind::Socket && cfg!(not(unix)) {
            errors.push("Socket links require a Unix platform".to_string());
        }

        errors
    }
}

/// Polling configuration for the discovery and checksum-ready waits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// Delay between attempts
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Give up after this long; zero disables the deadline
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Give up after this many attempts; zero disables the limit
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            max_attempts: 0,
        }
    }
}

impl PollConfig {
    /// Validate polling configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.interval.as_millis() < 1 {
            errors.push("Poll interval too short (minimum: 1ms)".to_string());
        } else if self.interval.as_secs() > 10 {
            errors.push("Poll interval too long (maximum: 10s)".to_string());
        }

        if !self.timeout.is_zero() && self.timeout < self.interval {
            errors.push("Poll timeout shorter than the poll interval".to_string());
        }

        if self.timeout.is_zero() && self.max_attempts == 0 {
            errors.push(
                "WARNING: Polling is unbounded - an absent peer blocks forever".to_string(),
            );
        }

        errors
    }

    /// Polling policy for the session engine
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.interval,
            timeout: (!self.timeout.is_zero()).then_some(self.timeout),
            max_attempts: (self.max_attempts != 0).then_some(self.max_attempts),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Log every exchanged word pair
    #[serde(default)]
    pub log_exchanges: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("multiboot"),
            log_level: Level::INFO,
            json_format: false,
            log_exchanges: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
