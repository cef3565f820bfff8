//! Checkpoint persistence keyed by discussion id.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interrupt::PendingInterrupt;
use crate::state::ConversationState;

/// The persisted serialization of one conversation, enabling
/// suspend/resume across process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: ConversationState,
    /// Set while the conversation is suspended waiting for input.
    #[serde(default)]
    pub pending_interrupt: Option<PendingInterrupt>,
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn new(state: ConversationState) -> Self {
        Self {
            state,
            pending_interrupt: None,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.pending_interrupt.is_some()
    }
}

/// Errors from checkpoint storage.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage: {0}")]
    Storage(String),
}

/// Key-value checkpoint storage keyed by discussion id.
///
/// Runs for one id are sequential, so last-writer-wins per id is
/// sufficient; implementations only need whole-checkpoint load/save.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, discussion_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    async fn save(&self, discussion_id: &str, checkpoint: &Checkpoint)
    -> Result<(), CheckpointError>;

    /// Delete one checkpoint; returns the number of bytes removed, or
    /// `None` if nothing was stored under the id.
    async fn delete(&self, discussion_id: &str) -> Result<Option<u64>, CheckpointError>;

    /// Delete every checkpoint; returns the total bytes removed.
    async fn wipe(&self) -> Result<u64, CheckpointError>;
}

/// In-memory store. Checkpoints are held serialized so that loading
/// always exercises the same (de)serialization path as a durable store.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, discussion_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.entries.read().get(discussion_id) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        discussion_id: &str,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        let raw = serde_json::to_string(checkpoint)?;
        self.entries.write().insert(discussion_id.to_string(), raw);
        Ok(())
    }

    async fn delete(&self, discussion_id: &str) -> Result<Option<u64>, CheckpointError> {
        Ok(self
            .entries
            .write()
            .remove(discussion_id)
            .map(|raw| raw.len() as u64))
    }

    async fn wipe(&self) -> Result<u64, CheckpointError> {
        let mut entries = self.entries.write();
        let total = entries.values().map(|raw| raw.len() as u64).sum();
        entries.clear();
        Ok(total)
    }
}

/// File-backed store: one JSON file per discussion id. Saves go through
/// a temp file and rename so a crash never leaves a torn checkpoint.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the platform data directory.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay")
            .join("checkpoints")
    }

    fn path_for(&self, discussion_id: &str) -> PathBuf {
        // Discussion ids come from external callers; keep them out of
        // path syntax.
        let safe: String = discussion_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, discussion_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(discussion_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(
        &self,
        discussion_id: &str,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(discussion_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(checkpoint)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    async fn delete(&self, discussion_id: &str) -> Result<Option<u64>, CheckpointError> {
        let path = self.path_for(discussion_id);
        if !path.exists() {
            return Ok(None);
        }
        let size = fs::metadata(&path)?.len();
        fs::remove_file(&path)?;
        Ok(Some(size))
    }

    async fn wipe(&self) -> Result<u64, CheckpointError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut total = 0u64;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                total += entry.metadata()?.len();
                fs::remove_file(&path)?;
            }
        }
        Ok(total)
    }
}
