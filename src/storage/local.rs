// Local JSON file store: one array of conversations in conversations.json

use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{new_conversation_id, ConversationDraft, ConversationStore, SavedConversation, StorageError};

pub const CONVERSATIONS_FILE: &str = "conversations.json";

pub struct LocalStore {
    path: PathBuf,
    // serialises read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store at `<dir>/conversations.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONVERSATIONS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<SavedConversation>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, conversations: &[SavedConversation]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(conversations)?;

        // write-then-rename: readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl ConversationStore for LocalStore {
    async fn save(&self, draft: &ConversationDraft) -> Result<String, StorageError> {
        let _guard = self.lock.lock().await;
        let mut conversations = self.read_all()?;

        let id = draft.id.clone().unwrap_or_else(new_conversation_id);
        let created_at = conversations
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.created_at)
            .unwrap_or_else(Utc::now);
        conversations.retain(|c| c.id != id);
        conversations.push(SavedConversation {
            id: id.clone(),
            topic: draft.topic.clone(),
            messages: draft.messages.clone(),
            roster_ids: draft.roster_ids.clone(),
            created_at,
        });

        self.write_all(&conversations)?;
        tracing::debug!("Saved conversation {} to {}", id, self.path.display());
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<SavedConversation>, StorageError> {
        let _guard = self.lock.lock().await;
        self.read_all()
    }

    async fn load(&self, id: &str) -> Result<Option<SavedConversation>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all()?.into_iter().find(|c| c.id == id))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;
        let mut conversations = self.read_all()?;
        let before = conversations.len();
        conversations.retain(|c| c.id != id);
        if conversations.len() == before {
            return Ok(false);
        }
        self.write_all(&conversations)?;
        Ok(true)
    }

    fn name(&self) -> &str {
        "local"
    }
}
