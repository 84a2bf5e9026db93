// Background saver: one task per session, saving snapshots in order
//
// Only the most recent unsaved snapshot is kept; intermediate ones are
// skipped. The id returned by the first successful save is reused for
// every later one.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::events::DiscussionEvent;
use crate::storage::{ConversationDraft, ConversationStore};

pub struct Autosaver {
    tx: watch::Sender<Option<ConversationDraft>>,
    task: JoinHandle<Option<String>>,
}

impl Autosaver {
    pub fn spawn(
        store: Arc<dyn ConversationStore>,
        conversation_id: Option<String>,
        events: mpsc::UnboundedSender<DiscussionEvent>,
    ) -> Self {
        let (tx, mut rx) = watch::channel(None::<ConversationDraft>);

        let task = tokio::spawn(async move {
            let mut conversation_id = conversation_id;
            while rx.changed().await.is_ok() {
                let Some(mut draft) = rx.borrow_and_update().clone() else {
                    continue;
                };
                if draft.id.is_none() {
                    draft.id = conversation_id.clone();
                }

                match store.save(&draft).await {
                    Ok(id) => {
                        debug!("Autosaved {} messages as {}", draft.messages.len(), id);
                        conversation_id = Some(id.clone());
                        let _ = events.send(DiscussionEvent::Saved { id });
                    }
                    Err(e) => warn!("Autosave to {} store failed: {}", store.name(), e),
                }
            }
            conversation_id
        });

        Self { tx, task }
    }

    /// Queue a snapshot, replacing any snapshot not yet picked up
    pub fn submit(&self, draft: ConversationDraft) {
        self.tx.send_replace(Some(draft));
    }

    /// Drain pending work and return the conversation id, if any save succeeded
    pub async fn finish(self) -> Option<String> {
        let Self { tx, task } = self;
        drop(tx);
        match task.await {
            Ok(id) => id,
            Err(e) => {
                error!("Autosave task panicked: {:?}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discussion::Message;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    fn draft(messages: usize) -> ConversationDraft {
        ConversationDraft {
            id: None,
            topic: "tides".to_string(),
            messages: (0..messages)
                .map(|i| Message::user("You", format!("m{}", i)))
                .collect(),
            roster_ids: vec!["claude".to_string(), "grok".to_string()],
        }
    }

    #[tokio::test]
    async fn test_repeated_snapshots_share_one_id() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::in_dir(dir.path()));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let saver = Autosaver::spawn(store.clone(), None, events_tx);
        saver.submit(draft(2));
        // wait for the first save so the second one reuses its id
        let first = match events_rx.recv().await {
            Some(DiscussionEvent::Saved { id }) => id,
            other => panic!("expected Saved, got {:?}", other),
        };
        saver.submit(draft(3));
        saver.submit(draft(4));

        let id = saver.finish().await;
        assert_eq!(id.as_deref(), Some(first.as_str()));

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_finish_without_snapshots() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::in_dir(dir.path()));
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let saver = Autosaver::spawn(store.clone(), Some("keep".to_string()), events_tx);
        assert_eq!(saver.finish().await.as_deref(), Some("keep"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
