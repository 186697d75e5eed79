//! Observable session snapshot consumed by presentation code

use serde::{Deserialize, Serialize};

use crate::session::state::SessionStatus;
use crate::types::{Device, Message};

/// Immutable view of the session after a transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Devices from the latest scan, first-seen order
    pub devices: Vec<Device>,
    pub connected_device: Option<Device>,
    /// Conversation with the connected device, oldest first
    pub messages: Vec<Message>,
    pub scanning: bool,
    /// Single channel for user-facing failure text
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connected_device.is_some()
    }
}
