//! Session status and the state guarded by the session's mutation point

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationLog;
use crate::discovery::DiscoveredDevices;
use crate::session::snapshot::SessionSnapshot;
use crate::transport::Subscription;
use crate::types::Device;

// ----------------------------------------------------------------------------
// Session Status
// ----------------------------------------------------------------------------

/// Connection lifecycle status exposed to presentation code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Scanning => "scanning",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Whole session state; only ever touched under the session mutex
///
/// `connected_device` and `subscription` are always set and cleared together.
pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub connected_device: Option<Device>,
    pub subscription: Option<Subscription>,
    pub devices: DiscoveredDevices,
    pub conversation: ConversationLog,
    pub last_error: Option<String>,
    /// Incremented whenever a scan starts; discovery events carry the epoch
    /// of the scan that produced them
    pub scan_epoch: u64,
    /// Epoch of the scan still running, if any
    pub active_scan: Option<u64>,
    /// Incremented on every connect and teardown to retire stale inbound pumps
    pub connection_epoch: u64,
}

impl SessionState {
    pub fn new(conversation: ConversationLog) -> Self {
        Self {
            status: SessionStatus::Idle,
            connected_device: None,
            subscription: None,
            devices: DiscoveredDevices::new(),
            conversation,
            last_error: None,
            scan_epoch: 0,
            active_scan: None,
            connection_epoch: 0,
        }
    }

    /// Status to return to once a scan is over
    pub fn resting_status(&self) -> SessionStatus {
        if self.connected_device.is_some() {
            SessionStatus::Connected
        } else {
            SessionStatus::Idle
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let messages = self
            .connected_device
            .as_ref()
            .map(|device| self.conversation.messages(&device.id).to_vec())
            .unwrap_or_default();

        SessionSnapshot {
            status: self.status,
            devices: self.devices.to_vec(),
            connected_device: self.connected_device.clone(),
            messages,
            scanning: self.active_scan.is_some(),
            last_error: self.last_error.clone(),
        }
    }
}
