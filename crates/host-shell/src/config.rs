//! # Host Configuration
//!
//! Unified configuration for the bus, logging and module switches.

use std::time::Duration;

use mf_event_bus::{BusConfig, ConfigError};
use mf_telemetry::TelemetryConfig;

use crate::modules::{BUILTIN_MODULE_IDS, MONITOR_MODULE_ID};
use crate::registry::ModuleConfig;

/// Complete host configuration.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Event bus configuration.
    pub bus: BusConfig,
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
    /// Module switches.
    pub modules: ModuleConfig,
    /// Monitor polling configuration.
    pub monitor: MonitorConfig,
}

/// Monitor polling configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between statistics polls.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl HostConfig {
    /// Load configuration from the environment.
    ///
    /// The monitor module is mounted only when the bus configuration enables
    /// it, unless `MF_MODULE_EVENT_BUS_MONITOR_MF` says otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bus = BusConfig::merged(mf_event_bus::BusConfigOverrides::from_lookup(&lookup)?)?;
        let telemetry = TelemetryConfig::from_lookup(&lookup);

        let mut modules = ModuleConfig::from_lookup(&BUILTIN_MODULE_IDS, &lookup);
        if !modules.enabled.contains_key(MONITOR_MODULE_ID) && !bus.enable_monitor {
            modules.disable(MONITOR_MODULE_ID);
        }

        let poll_interval = lookup("MF_MONITOR_POLL_MS")
            .map(|v| parse_poll_ms(&v))
            .transpose()?
            .map(Duration::from_millis)
            .unwrap_or_else(|| MonitorConfig::default().poll_interval);

        Ok(Self {
            bus,
            telemetry,
            modules,
            monitor: MonitorConfig { poll_interval },
        })
    }
}

/// Poll period in milliseconds; zero would make the poller spin.
fn parse_poll_ms(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Parse(
            "MF_MONITOR_POLL_MS: interval must be at least 1ms".to_string(),
        )),
        Ok(ms) => Ok(ms),
        Err(e) => Err(ConfigError::Parse(format!("MF_MONITOR_POLL_MS: {e}"))),
    }
}
