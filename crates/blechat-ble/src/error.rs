//! Error types for BLE transport

use blechat_core::BlechatError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE transport
#[derive(Error, Debug)]
pub enum BleTransportError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Failed to get BLE events: {0}")]
    EventStreamFailed(String),

    #[error("Payload too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
}

impl From<BleTransportError> for BlechatError {
    fn from(err: BleTransportError) -> Self {
        match err {
            BleTransportError::Btleplug(inner) => from_btleplug(inner),
            other => BlechatError::Transport(other.to_string()),
        }
    }
}

/// Map a btleplug failure onto the core taxonomy
pub fn from_btleplug(err: btleplug::Error) -> BlechatError {
    match err {
        btleplug::Error::PermissionDenied => BlechatError::PermissionDenied,
        btleplug::Error::DeviceNotFound => BlechatError::NotFound {
            device_id: "unknown".to_string(),
        },
        btleplug::Error::NotConnected => BlechatError::NotConnected,
        btleplug::Error::TimedOut(duration) => BlechatError::timeout(duration),
        other => BlechatError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_btleplug_errors_map_to_taxonomy() {
        assert_eq!(
            BlechatError::from(BleTransportError::from(btleplug::Error::PermissionDenied)),
            BlechatError::PermissionDenied
        );
        assert_eq!(
            BlechatError::from(BleTransportError::from(btleplug::Error::NotConnected)),
            BlechatError::NotConnected
        );
        assert_eq!(
            from_btleplug(btleplug::Error::TimedOut(Duration::from_secs(15))),
            BlechatError::Timeout {
                duration_ms: 15_000
            }
        );
        assert!(matches!(
            from_btleplug(btleplug::Error::RuntimeError("boom".to_string())),
            BlechatError::Transport(_)
        ));
    }

    #[test]
    fn test_transport_errors_keep_message() {
        let err: BlechatError = BleTransportError::CharacteristicNotFound {
            characteristic: "write".to_string(),
        }
        .into();
        assert_eq!(
            err,
            BlechatError::Transport("Characteristic not found: write".to_string())
        );
    }
}
