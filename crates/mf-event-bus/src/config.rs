//! # Bus Configuration
//!
//! Immutable settings consumed when the bus is constructed. Callers supply a
//! partial set of values which is merged over the defaults.

use crate::DEFAULT_MAX_HISTORY_SIZE;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// History size must be a positive integer.
    #[error("max_history_size must be positive")]
    InvalidHistorySize,

    /// Unknown log level name.
    #[error("invalid log level '{0}' (expected debug, info, warn or error)")]
    InvalidLogLevel(String),

    /// Malformed configuration document or value.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Verbosity of the bus's own diagnostic output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Whether audit records are mirrored to the diagnostic log at this level.
    #[must_use]
    pub fn mirrors_audit(&self) -> bool {
        *self != Self::Error
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// Complete bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Maximum audit records kept before the oldest is evicted.
    pub max_history_size: usize,

    /// Whether bus activity is recorded in the audit log.
    pub enable_logging: bool,

    /// Whether the host mounts the monitoring module.
    pub enable_monitor: bool,

    /// Verbosity of diagnostic output.
    pub log_level: LogLevel,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            enable_logging: true,
            enable_monitor: false,
            log_level: LogLevel::Info,
        }
    }
}

/// Caller-supplied partial configuration.
///
/// Every field left as `None` keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BusConfigOverrides {
    pub max_history_size: Option<usize>,
    pub enable_logging: Option<bool>,
    pub enable_monitor: Option<bool>,
    pub log_level: Option<LogLevel>,
}

impl BusConfigOverrides {
    /// Parse overrides from a JSON object such as `{"maxHistorySize": 3}`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON or mistyped fields.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read overrides from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MF_BUS_MAX_HISTORY`: history size
    /// - `MF_BUS_ENABLE_LOGGING`: record audit log (true/false)
    /// - `MF_BUS_ENABLE_MONITOR`: mount the monitor module (true/false)
    /// - `MF_BUS_LOG_LEVEL`: debug, info, warn or error
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_history_size = lookup("MF_BUS_MAX_HISTORY")
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::Parse(format!("MF_BUS_MAX_HISTORY: {e}")))
            })
            .transpose()?;

        let log_level = lookup("MF_BUS_LOG_LEVEL")
            .map(|v| v.parse::<LogLevel>())
            .transpose()?;

        let enable_logging = lookup("MF_BUS_ENABLE_LOGGING")
            .map(|v| parse_flag("MF_BUS_ENABLE_LOGGING", &v))
            .transpose()?;
        let enable_monitor = lookup("MF_BUS_ENABLE_MONITOR")
            .map(|v| parse_flag("MF_BUS_ENABLE_MONITOR", &v))
            .transpose()?;

        Ok(Self {
            max_history_size,
            enable_logging,
            enable_monitor,
            log_level,
        })
    }
}

/// Parse a boolean switch, rejecting anything that is not clearly on or off.
fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Parse(format!(
            "{key}: expected true or false, got '{other}'"
        ))),
    }
}

impl BusConfig {
    /// Merge overrides over the defaults and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidHistorySize` for a zero history size.
    pub fn merged(overrides: BusConfigOverrides) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_history_size: overrides
                .max_history_size
                .unwrap_or(defaults.max_history_size),
            enable_logging: overrides.enable_logging.unwrap_or(defaults.enable_logging),
            enable_monitor: overrides.enable_monitor.unwrap_or(defaults.enable_monitor),
            log_level: overrides.log_level.unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration from `MF_BUS_*` environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::merged(BusConfigOverrides::from_env()?)
    }

    /// Check the invariants of a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidHistorySize` for a zero history size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history_size == 0 {
            return Err(ConfigError::InvalidHistorySize);
        }
        Ok(())
    }

    /// Convenience constructor for a given history size.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidHistorySize` for zero.
    pub fn with_history_size(max_history_size: usize) -> Result<Self, ConfigError> {
        Self::merged(BusConfigOverrides {
            max_history_size: Some(max_history_size),
            ..BusConfigOverrides::default()
        })
    }
}
