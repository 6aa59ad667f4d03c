use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use crate::core::{LayoutKind, MeasurementMode, SensorIdentity};
use crate::resilience::RetryPolicy;
use crate::session::SessionSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Everything the acquisition process needs, loaded from JSON.
///
/// Every field has a default, so `{}` plus a sensor list is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Outbound telemetry target
    pub sink: Endpoint,
    /// Inbound control bind address
    pub control: Endpoint,
    /// Device addresses; sensor indices are assigned 1.. in this order
    pub sensors: Vec<String>,
    pub mode: MeasurementMode,
    /// Overrides the mode's default payload layout
    pub layout: Option<LayoutKind>,
    pub window_size: usize,
    pub discovery_timeout_secs: u64,
    pub command_timeout_ms: u64,
    pub battery_timeout_ms: u64,
    pub battery_interval_secs: u64,
    pub shutdown_grace_ms: u64,
    pub min_connected: usize,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sink: Endpoint::new("127.0.0.1", 5555),
            control: Endpoint::new("0.0.0.0", 5556),
            sensors: Vec::new(),
            mode: MeasurementMode::FreeAcceleration,
            layout: None,
            window_size: 10,
            discovery_timeout_secs: 20,
            command_timeout_ms: 5000,
            battery_timeout_ms: 5000,
            battery_interval_secs: 300,
            shutdown_grace_ms: 3000,
            min_connected: 1,
            retry: RetryPolicy::Never,
            queue_capacity: 1024,
        }
    }
}

impl AcquisitionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("Invalid config in {:?}", path))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize acquisition config")
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            bail!("at least one sensor address is required");
        }
        if self.window_size == 0 {
            bail!("window_size must be at least 1");
        }
        if self.min_connected > self.sensors.len() {
            bail!(
                "min_connected ({}) exceeds the number of sensors ({})",
                self.min_connected,
                self.sensors.len()
            );
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        for (name, value) in [
            ("discovery_timeout_secs", self.discovery_timeout_secs),
            ("command_timeout_ms", self.command_timeout_ms),
            ("battery_timeout_ms", self.battery_timeout_ms),
            ("battery_interval_secs", self.battery_interval_secs),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        self.resolved_layout()?;
        Ok(())
    }

    /// Explicit layout if given, otherwise the mode's default.
    pub fn resolved_layout(&self) -> Result<LayoutKind> {
        match self.layout.or_else(|| self.mode.default_layout()) {
            Some(layout) => Ok(layout),
            None => bail!("mode {:?} has no known payload layout; set `layout` explicitly", self.mode),
        }
    }

    pub fn identities(&self) -> Vec<SensorIdentity> {
        self.sensors
            .iter()
            .enumerate()
            .map(|(i, address)| SensorIdentity::new(address.clone(), i as u32 + 1))
            .collect()
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            mode: self.mode,
            layout: self.resolved_layout()?,
            window_size: self.window_size,
            discovery_timeout: self.discovery_timeout(),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
        })
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn battery_timeout(&self) -> Duration {
        Duration::from_millis(self.battery_timeout_ms)
    }

    pub fn battery_interval(&self) -> Duration {
        Duration::from_secs(self.battery_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
