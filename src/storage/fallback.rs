// Ordered chain of stores: the first backend that accepts a save wins

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use super::{ConversationDraft, ConversationStore, SavedConversation, StorageError};

pub struct FallbackStore {
    backends: Vec<Arc<dyn ConversationStore>>,
}

impl FallbackStore {
    pub fn new(backends: Vec<Arc<dyn ConversationStore>>) -> Self {
        Self { backends }
    }

    fn unavailable(failures: Vec<String>) -> StorageError {
        if failures.is_empty() {
            StorageError::Unavailable("no backends configured".to_string())
        } else {
            StorageError::Unavailable(failures.join("; "))
        }
    }
}

#[async_trait]
impl ConversationStore for FallbackStore {
    async fn save(&self, draft: &ConversationDraft) -> Result<String, StorageError> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            match backend.save(draft).await {
                Ok(id) => return Ok(id),
                Err(e) => {
                    warn!("Saving to {} store failed: {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }
        Err(Self::unavailable(failures))
    }

    /// Union of every reachable backend, newest first. An id present in
    /// several backends is taken from the earliest one.
    async fn list(&self) -> Result<Vec<SavedConversation>, StorageError> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        let mut failures = Vec::new();
        let mut any_ok = false;

        for backend in &self.backends {
            match backend.list().await {
                Ok(conversations) => {
                    any_ok = true;
                    for conversation in conversations {
                        if seen.insert(conversation.id.clone()) {
                            merged.push(conversation);
                        }
                    }
                }
                Err(e) => {
                    warn!("Listing {} store failed: {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        if !any_ok {
            return Err(Self::unavailable(failures));
        }
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(merged)
    }

    async fn load(&self, id: &str) -> Result<Option<SavedConversation>, StorageError> {
        let mut failures = Vec::new();
        let mut any_ok = false;
        for backend in &self.backends {
            match backend.load(id).await {
                Ok(Some(conversation)) => return Ok(Some(conversation)),
                Ok(None) => any_ok = true,
                Err(e) => {
                    warn!("Loading {} from {} store failed: {}", id, backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }
        if any_ok {
            Ok(None)
        } else {
            Err(Self::unavailable(failures))
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut removed = false;
        let mut failures = Vec::new();
        let mut any_ok = false;
        for backend in &self.backends {
            match backend.delete(id).await {
                Ok(r) => {
                    any_ok = true;
                    removed |= r;
                }
                Err(e) => {
                    warn!("Deleting {} from {} store failed: {}", id, backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }
        if any_ok {
            Ok(removed)
        } else {
            Err(Self::unavailable(failures))
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
