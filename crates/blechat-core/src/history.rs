//! Conversation persistence collaborator

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::{BlechatError, BlechatResult};
use crate::types::Message;

// ----------------------------------------------------------------------------
// History Store Trait
// ----------------------------------------------------------------------------

/// Backend that stores one message sequence per device
///
/// No partial-write semantics: the last `save` for a device wins.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stored messages for a device, or an empty sequence if none
    async fn load(&self, device_id: &str) -> BlechatResult<Vec<Message>>;

    /// Replace the stored messages for a device
    async fn save(&self, device_id: &str, messages: &[Message]) -> BlechatResult<()>;
}

// ----------------------------------------------------------------------------
// In-Memory Store
// ----------------------------------------------------------------------------

/// In-memory history store
///
/// Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, device_id: &str) -> BlechatResult<Vec<Message>> {
        Ok(self
            .conversations
            .read()
            .map_err(|e| BlechatError::Storage(e.to_string()))?
            .get(device_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, device_id: &str, messages: &[Message]) -> BlechatResult<()> {
        self.conversations
            .write()
            .map_err(|e| BlechatError::Storage(e.to_string()))?
            .insert(device_id.to_string(), messages.to_vec());
        Ok(())
    }
}
