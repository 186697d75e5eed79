//! Simulated transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Device;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the simulated transport
///
/// Durations are whole milliseconds so the TOML stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Synthetic peripherals, discovered in order
    pub devices: Vec<Device>,
    /// Delay between consecutive discoveries
    pub discovery_interval_ms: u64,
    /// Total length of one scan
    pub scan_duration_ms: u64,
    /// Delay before the echo reply to a sent message
    pub echo_delay_ms: u64,
    /// Interval of unsolicited ping notifications while connected
    pub ping_interval_ms: Option<u64>,
    /// How long connecting to an unresponsive device takes to time out
    pub connect_timeout_ms: u64,
    /// Device ids that never answer a connection attempt
    pub unresponsive_devices: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            devices: vec![
                Device::new("mock-alpha", "Mock Beacon Alpha", Some(-55)),
                Device::new("mock-beta", "Mock Beacon Beta", Some(-63)),
                Device::new("mock-gamma", "Mock Beacon Gamma", Some(-72)),
            ],
            discovery_interval_ms: 400,
            scan_duration_ms: 1200,
            echo_delay_ms: 300,
            ping_interval_ms: Some(6000),
            connect_timeout_ms: 15_000,
            unresponsive_devices: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the synthetic device list
    pub fn with_devices(mut self, devices: Vec<Device>) -> Self {
        self.devices = devices;
        self
    }

    /// Set the ping interval, `None` disables pings
    pub fn with_ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.ping_interval_ms = interval.map(|d| d.as_millis() as u64);
        self
    }

    /// Mark a device id as never answering connection attempts
    pub fn with_unresponsive_device(mut self, device_id: impl Into<String>) -> Self {
        self.unresponsive_devices.push(device_id.into());
        self
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }

    pub fn echo_delay(&self) -> Duration {
        Duration::from_millis(self.echo_delay_ms)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
