// Remote conversation store over a PostgREST-style table API
//
// `base_url` is the REST root (e.g. https://<project>.supabase.co/rest/v1);
// rows live at `<base_url>/<table>` with columns
// id, topic, messages, selected_models, created_at.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::{new_conversation_id, ConversationDraft, ConversationStore, SavedConversation, StorageError};
use crate::discussion::Message;

pub const DEFAULT_TABLE: &str = "ai_conversations";

pub struct RemoteStore {
    client: Client,
    table_url: String,
    api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConversationRow {
    id: String,
    topic: String,
    messages: Vec<Message>,
    #[serde(default)]
    selected_models: Vec<String>,
    // omitted when re-saving an existing id; the stored timestamp stays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl From<ConversationRow> for SavedConversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            topic: row.topic,
            messages: row.messages,
            roster_ids: row.selected_models,
            created_at: row.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl RemoteStore {
    pub fn new(base_url: &str, api_key: impl Into<String>, table: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            table_url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                table.unwrap_or(DEFAULT_TABLE)
            ),
            api_key: api_key.into(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(&self, request: RequestBuilder) -> Result<Vec<ConversationRow>, StorageError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(StorageError::Remote {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl ConversationStore for RemoteStore {
    async fn save(&self, draft: &ConversationDraft) -> Result<String, StorageError> {
        let (id, created_at) = match &draft.id {
            Some(id) => (id.clone(), None),
            None => (new_conversation_id(), Some(Utc::now())),
        };
        let row = ConversationRow {
            id,
            topic: draft.topic.clone(),
            messages: draft.messages.clone(),
            selected_models: draft.roster_ids.clone(),
            created_at,
        };

        let request = self
            .client
            .post(&self.table_url)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[row]);
        let saved = self.rows(request).await?;

        let id = saved.into_iter().next().map(|r| r.id).ok_or_else(|| StorageError::Remote {
            status: 200,
            detail: "upsert returned no rows".to_string(),
        })?;
        tracing::debug!("Saved conversation {} to remote store", id);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<SavedConversation>, StorageError> {
        let request = self
            .client
            .get(&self.table_url)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let rows = self.rows(request).await?;
        Ok(rows.into_iter().map(SavedConversation::from).collect())
    }

    async fn load(&self, id: &str) -> Result<Option<SavedConversation>, StorageError> {
        let filter = format!("eq.{}", id);
        let request = self
            .client
            .get(&self.table_url)
            .query(&[("select", "*"), ("id", filter.as_str())]);
        let rows = self.rows(request).await?;
        Ok(rows.into_iter().next().map(SavedConversation::from))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let filter = format!("eq.{}", id);
        let request = self
            .client
            .delete(&self.table_url)
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=representation");
        let rows = self.rows(request).await?;
        Ok(!rows.is_empty())
    }

    fn name(&self) -> &str {
        "remote"
    }
}
