//! BLE protocol constants and payload helpers

use uuid::Uuid;

use crate::error::BleTransportError;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Chat service UUID (Nordic UART service)
pub const CHAT_SERVICE_UUID: Uuid = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the central writes outgoing messages to
pub const CHAT_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the peripheral notifies incoming messages on
pub const CHAT_NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

// ----------------------------------------------------------------------------
// Payload Encoding
// ----------------------------------------------------------------------------

/// Encode a chat message as the UTF-8 bytes of a single write
pub fn encode_message(text: &str, max_size: usize) -> Result<Vec<u8>, BleTransportError> {
    let bytes = text.as_bytes();
    if bytes.len() > max_size {
        return Err(BleTransportError::PayloadTooLarge {
            size: bytes.len(),
            max_size,
        });
    }
    Ok(bytes.to_vec())
}

/// Decode one notification payload
///
/// Invalid UTF-8 is replaced rather than rejected and trailing NUL padding
/// is stripped. Returns `None` when nothing printable is left.
pub fn decode_notification(value: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(value);
    let text = text.trim_end_matches('\0');
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
