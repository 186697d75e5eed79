//! Error types for the BLE chat core
//!
//! Every transport, persistence and session failure is reported through
//! [`BlechatError`]. The first five variants form the taxonomy that transports
//! must use so the session manager can stay transport-agnostic.

use std::time::Duration;

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Core error type shared by transports, history stores and the session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlechatError {
    #[error("Bluetooth permission not granted")]
    PermissionDenied,

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Device not found: {device_id}")]
    NotFound { device_id: String },

    #[error("No device connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("History storage error: {0}")]
    Storage(String),

    #[error("Session already initialized")]
    AlreadyInitialized,
}

impl BlechatError {
    /// Build a timeout error from the interval that elapsed
    pub fn timeout(duration: Duration) -> Self {
        BlechatError::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Build a not-found error for a device id
    pub fn not_found(device_id: impl Into<String>) -> Self {
        BlechatError::NotFound {
            device_id: device_id.into(),
        }
    }

    /// Build a catch-all transport error
    pub fn transport(message: impl Into<String>) -> Self {
        BlechatError::Transport(message.into())
    }
}

/// Result type for core operations
pub type BlechatResult<T> = Result<T, BlechatError>;
