//! File-backed conversation history
//!
//! One pretty-printed JSON array of messages per device, named after the hex
//! encoding of the device id so arbitrary ids map to safe file names.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use blechat_core::{BlechatError, BlechatResult, HistoryStore, Message};

/// History store writing JSON files under a directory
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the history file for `device_id`
    pub fn path_for(&self, device_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", hex::encode(device_id.as_bytes())))
    }
}

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> BlechatError {
    BlechatError::Storage(format!("Failed to {} {}: {}", action, path.display(), err))
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self, device_id: &str) -> BlechatResult<Vec<Message>> {
        let path = self.path_for(device_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("read", &path, e)),
        };

        let messages: Vec<Message> =
            serde_json::from_str(&contents).map_err(|e| storage_error("parse", &path, e))?;
        debug!("Read {} messages from {}", messages.len(), path.display());
        Ok(messages)
    }

    async fn save(&self, device_id: &str, messages: &[Message]) -> BlechatResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error("create", &self.dir, e))?;

        let path = self.path_for(device_id);
        let contents =
            serde_json::to_string_pretty(messages).map_err(|e| storage_error("serialize", &path, e))?;

        // Write then rename so a crash never leaves a truncated file
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| storage_error("write", &staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| storage_error("replace", &path, e))?;
        Ok(())
    }
}
