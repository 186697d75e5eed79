//! Per-device conversation log backed by a history store

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::BlechatResult;
use crate::history::HistoryStore;
use crate::types::{Message, Timestamp};

// ----------------------------------------------------------------------------
// Conversation Log
// ----------------------------------------------------------------------------

/// Append-only message sequences keyed by device id
///
/// Every append writes the full updated sequence back through the history
/// store, so the persisted copy always matches memory and is always sorted.
pub struct ConversationLog {
    store: Arc<dyn HistoryStore>,
    conversations: HashMap<String, Vec<Message>>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            conversations: HashMap::new(),
        }
    }

    /// Replace the in-memory sequence for a device with its persisted history
    pub async fn load(&mut self, device_id: &str) -> BlechatResult<&[Message]> {
        let mut history = self.store.load(device_id).await?;
        // Stable sort keeps insertion order for equal timestamps
        history.sort_by_key(|message| message.timestamp);
        debug!("Loaded {} messages for {}", history.len(), device_id);

        let entry = self.conversations.entry(device_id.to_string()).or_default();
        *entry = history;
        Ok(entry.as_slice())
    }

    /// Insert a message in timestamp order and persist the whole sequence
    ///
    /// The message stays in memory even when the store rejects the write.
    pub async fn append(&mut self, device_id: &str, message: Message) -> BlechatResult<()> {
        let messages = self.conversations.entry(device_id.to_string()).or_default();
        let position = messages.partition_point(|m| m.timestamp <= message.timestamp);
        messages.insert(position, message);

        if let Err(e) = self.store.save(device_id, messages).await {
            warn!("Failed to persist conversation for {}: {}", device_id, e);
            return Err(e);
        }
        Ok(())
    }

    /// Messages for a device, oldest first
    pub fn messages(&self, device_id: &str) -> &[Message] {
        self.conversations
            .get(device_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Timestamp for the next message, never earlier than the newest one
    pub fn next_timestamp(&self, device_id: &str, now: Timestamp) -> Timestamp {
        self.messages(device_id)
            .last()
            .map_or(now, |last| now.max(last.timestamp))
    }
}
