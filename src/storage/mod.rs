// Conversation persistence
//
// Best-effort: callers log failures and carry on. Backends are tried in order
// through `FallbackStore` (remote first when configured, local file last).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discussion::Message;

pub mod fallback;
pub mod local;
pub mod remote;

pub use fallback::FallbackStore;
pub use local::LocalStore;
pub use remote::RemoteStore;

/// A persisted transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConversation {
    pub id: String,
    pub topic: String,
    pub messages: Vec<Message>,
    pub roster_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// What gets handed to `save`: a snapshot of the transcript plus the id
/// assigned by an earlier save, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDraft {
    pub id: Option<String>,
    pub topic: String,
    pub messages: Vec<Message>,
    pub roster_ids: Vec<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed conversation data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("remote store unreachable: {0}")]
    Transport(String),

    #[error("remote store returned {status}: {detail}")]
    Remote { status: u16, detail: String },

    #[error("no conversation store succeeded ({0})")]
    Unavailable(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Upsert by `draft.id`; a draft without id gets a fresh one. Returns the id.
    async fn save(&self, draft: &ConversationDraft) -> Result<String, StorageError>;

    async fn list(&self) -> Result<Vec<SavedConversation>, StorageError>;

    async fn load(&self, id: &str) -> Result<Option<SavedConversation>, StorageError>;

    /// Returns whether something was removed
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

pub(crate) fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
