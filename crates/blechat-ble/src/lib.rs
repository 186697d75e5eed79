//! Bluetooth Low Energy transport for BLE chat
//!
//! This crate provides a BLE transport that implements the `Transport` trait from
//! `blechat-core` on top of `btleplug`, acting as a GATT central.
//!
//! ## Architecture
//!
//! - [`config`] - Transport configuration and settings
//! - [`error`] - Error types specific to BLE transport
//! - [`protocol`] - Service and characteristic UUIDs, payload encoding
//! - [`discovery`] - Adapter bootstrap and device scanning
//! - [`connection`] - Connection setup, notification pump and writes
//! - [`transport`] - Main transport implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use blechat_ble::{BleTransport, BleTransportConfig};
//! use blechat_core::SessionManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BleTransportConfig::new()
//!     .with_scan_duration(Duration::from_secs(5))
//!     .with_service_filter(true);
//!
//! let session = SessionManager::new(Arc::new(BleTransport::new(config)));
//! session.start_scan().await?;
//!
//! for device in session.snapshot().devices {
//!     println!("{}", device);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! Scanning and connecting work wherever `btleplug` supports central mode
//! (Linux via BlueZ, macOS, Windows). On macOS the device id is the platform
//! peripheral identifier because Bluetooth addresses are not exposed.

pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod transport;

pub use config::BleTransportConfig;
pub use error::BleTransportError;
pub use protocol::{
    CHAT_NOTIFY_CHARACTERISTIC_UUID, CHAT_SERVICE_UUID, CHAT_WRITE_CHARACTERISTIC_UUID,
};
pub use transport::BleTransport;
