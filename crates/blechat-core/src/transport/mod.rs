//! Transport abstraction for BLE chat
//!
//! The session manager only talks to the radio through [`Transport`]. Exactly
//! one implementation is chosen at process start: the simulated transport in
//! this crate, or the btleplug-backed transport in `blechat-ble`. Both honour
//! the same pre- and postconditions.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::BlechatResult;
use crate::types::Device;

pub mod simulated;
pub mod subscription;

pub use simulated::SimulatedTransport;
pub use subscription::{ListenerSlot, Subscription};

// ----------------------------------------------------------------------------
// Event Channels
// ----------------------------------------------------------------------------

/// Sink for devices found during a scan
pub type DeviceSender = mpsc::UnboundedSender<Device>;

/// Sink for inbound events while connected
pub type InboundSender = mpsc::UnboundedSender<InboundEvent>;

/// Events delivered to the inbound listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One decoded notification from the notify characteristic
    Notification { device_id: String, text: String },
    /// The established connection reported a failure
    Fault { reason: String },
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Radio capability used by the session manager
///
/// Failures are reported as [`crate::BlechatError`] using the
/// `PermissionDenied` / `Timeout` / `NotFound` / `NotConnected` / `Transport`
/// taxonomy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Scan until the scan duration elapses or [`Transport::stop_scan`] is called
    ///
    /// Sends each newly seen device id to `on_found`. The transport keeps its
    /// own dedup window but callers must not rely on it. The sender is dropped
    /// before this returns.
    async fn start_scan(&self, on_found: DeviceSender) -> BlechatResult<()>;

    /// Stop an in-flight scan; no-op when not scanning
    fn stop_scan(&self);

    /// Establish the single connection
    ///
    /// A prior connection must have been torn down explicitly; transports do
    /// not disconnect stale sessions on their own.
    async fn connect(&self, device_id: &str) -> BlechatResult<Device>;

    /// Best-effort teardown; never fails and releases the inbound listener
    async fn disconnect(&self);

    /// One outbound write of `text` on the wire
    async fn send_message(&self, text: &str) -> BlechatResult<()>;

    /// Install the inbound listener, replacing any previous one
    fn subscribe_inbound(&self, listener: InboundSender) -> Subscription;

    fn current_connection(&self) -> Option<Device>;

    fn is_scanning(&self) -> bool;

    fn kind(&self) -> TransportKind;
}

// ----------------------------------------------------------------------------
// Transport Selection
// ----------------------------------------------------------------------------

/// Which transport implementation to build at start-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Physical radio through btleplug
    #[default]
    Ble,
    /// Synthetic devices with echo replies, no hardware needed
    Simulated,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ble => write!(f, "ble"),
            TransportKind::Simulated => write!(f, "simulated"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ble" => Ok(TransportKind::Ble),
            "simulated" | "mock" => Ok(TransportKind::Simulated),
            other => Err(format!("Unknown transport: {}", other)),
        }
    }
}
