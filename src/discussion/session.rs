// Session: topic + roster + transcript for one discussion

use crate::config::{PersonaCatalogue, Roster, RosterError};
use crate::storage::{ConversationDraft, SavedConversation};

use super::transcript::{Message, Transcript};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub topic: String,
    pub roster: Roster,
    pub transcript: Transcript,

    /// Assigned by the first successful save, stable afterwards
    pub conversation_id: Option<String>,
}

impl Session {
    /// Fresh session whose transcript holds only the seed message
    pub fn new(topic: impl Into<String>, roster: Roster, user_name: &str) -> Self {
        let topic = topic.into();
        let mut transcript = Transcript::new();
        transcript.push(Message::topic_seed(user_name, &topic));
        Self {
            topic,
            roster,
            transcript,
            conversation_id: None,
        }
    }

    /// Rebuild a session from storage. Fails if the saved roster no longer
    /// resolves against the catalogue.
    pub fn from_saved(
        saved: SavedConversation,
        catalogue: &PersonaCatalogue,
    ) -> Result<Self, RosterError> {
        let roster = catalogue.roster(&saved.roster_ids)?;
        Ok(Self {
            topic: saved.topic,
            roster,
            transcript: Transcript::from_messages(saved.messages),
            conversation_id: Some(saved.id),
        })
    }

    /// Snapshot for the store
    pub fn draft(&self) -> ConversationDraft {
        ConversationDraft {
            id: self.conversation_id.clone(),
            topic: self.topic.clone(),
            messages: self.transcript.messages().to_vec(),
            roster_ids: self.roster.ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_session_is_seeded() {
        let catalogue = PersonaCatalogue::builtin().unwrap();
        let roster = catalogue.roster(&["claude", "grok"]).unwrap();
        let session = Session::new("tides", roster, "Ada");

        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript.messages()[0].speaker_name, "Ada");
        assert!(!session.transcript.has_discussion());

        let draft = session.draft();
        assert_eq!(draft.id, None);
        assert_eq!(draft.roster_ids, vec!["claude", "grok"]);
    }

    #[test]
    fn test_from_saved_keeps_id_and_rejects_unknown_personas() {
        let catalogue = PersonaCatalogue::builtin().unwrap();
        let saved = SavedConversation {
            id: "c1".to_string(),
            topic: "tides".to_string(),
            messages: vec![Message::topic_seed("You", "tides")],
            roster_ids: vec!["gemini".to_string(), "nova".to_string()],
            created_at: Utc::now(),
        };

        let session = Session::from_saved(saved.clone(), &catalogue).unwrap();
        assert_eq!(session.conversation_id.as_deref(), Some("c1"));
        assert_eq!(session.roster.ids(), vec!["gemini", "nova"]);

        let stale = SavedConversation {
            roster_ids: vec!["gemini".to_string(), "hal".to_string()],
            ..saved
        };
        assert_eq!(
            Session::from_saved(stale, &catalogue),
            Err(RosterError::Unknown("hal".to_string()))
        );
    }
}
