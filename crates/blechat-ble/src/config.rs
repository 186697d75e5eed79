//! BLE transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{
    CHAT_NOTIFY_CHARACTERISTIC_UUID, CHAT_SERVICE_UUID, CHAT_WRITE_CHARACTERISTIC_UUID,
};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for BLE transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleTransportConfig {
    /// How long one scan runs before finishing on its own
    pub scan_duration_ms: u64,
    /// Maximum time to wait for a connection
    pub connection_timeout_ms: u64,
    /// Service advertised by chat peripherals
    pub service_uuid: Uuid,
    /// Characteristic outgoing messages are written to
    pub write_characteristic: Uuid,
    /// Characteristic incoming messages are notified on
    pub notify_characteristic: Uuid,
    /// Largest single write accepted, in bytes
    pub max_write_size: usize,
    /// Only report peripherals advertising the chat service
    pub filter_by_service: bool,
}

impl Default for BleTransportConfig {
    fn default() -> Self {
        Self {
            scan_duration_ms: 10_000,
            connection_timeout_ms: 15_000,
            service_uuid: CHAT_SERVICE_UUID,
            write_characteristic: CHAT_WRITE_CHARACTERISTIC_UUID,
            notify_characteristic: CHAT_NOTIFY_CHARACTERISTIC_UUID,
            max_write_size: 512,
            filter_by_service: false,
        }
    }
}

impl BleTransportConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan duration
    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration_ms = duration.as_millis() as u64;
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set maximum write size
    pub fn with_max_write_size(mut self, size: usize) -> Self {
        self.max_write_size = size;
        self
    }

    /// Restrict scans to peripherals advertising the service UUID
    pub fn with_service_filter(mut self, enabled: bool) -> Self {
        self.filter_by_service = enabled;
        self
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Services passed to the adapter's scan filter
    pub fn scan_services(&self) -> Vec<Uuid> {
        if self.filter_by_service {
            vec![self.service_uuid]
        } else {
            Vec::new()
        }
    }
}
