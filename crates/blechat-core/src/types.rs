//! Core data model: devices, messages and timestamps

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Wall-clock time of day (UTC) formatted as `HH:MM:SS`
    pub fn clock_time(&self) -> String {
        let seconds_of_day = (self.0 / 1000) % 86_400;
        format!(
            "{:02}:{:02}:{:02}",
            seconds_of_day / 3600,
            (seconds_of_day % 3600) / 60,
            seconds_of_day % 60
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of message timestamps
///
/// Injected into the session so tests can control time.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard library implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ----------------------------------------------------------------------------
// Device
// ----------------------------------------------------------------------------

/// A discovered peripheral
///
/// Identity is `id`; `name` and `signal_strength` may be refreshed when the
/// same peripheral is seen again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier of the physical peripheral
    pub id: String,
    /// Advertised name, `"Unknown"` when the peripheral does not advertise one
    pub name: String,
    /// Last observed RSSI in dBm
    pub signal_strength: Option<i16>,
}

impl Device {
    /// Name used for peripherals that do not advertise one
    pub const UNKNOWN_NAME: &'static str = "Unknown";

    pub fn new(id: impl Into<String>, name: impl Into<String>, signal_strength: Option<i16>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            signal_strength,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal_strength {
            Some(rssi) => write!(f, "{} ({}, {} dBm)", self.name, self.id, rssi),
            None => write!(f, "{} ({})", self.name, self.id),
        }
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Typed on this device
    Local,
    /// Pushed by the connected peripheral
    Remote,
}

/// An immutable chat message in a device conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the device's conversation
    pub id: String,
    pub origin: Origin,
    /// Never empty
    pub text: String,
    pub timestamp: Timestamp,
}

impl Message {
    /// Create a message with a fresh random id
    pub fn new(origin: Origin, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            origin,
            text: text.into(),
            timestamp,
        }
    }

    /// Message authored locally
    pub fn local(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(Origin::Local, text, timestamp)
    }

    /// Message received from the peripheral
    pub fn remote(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(Origin::Remote, text, timestamp)
    }
}
