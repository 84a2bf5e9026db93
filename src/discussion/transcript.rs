// Transcript: the append-only message log of one discussion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Persona;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Only used to annotate failed turns
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One turn in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Display label: the user's name or the persona's name
    pub speaker_name: String,

    /// Persona that produced this message; absent for user and system messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(speaker_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            speaker_name: speaker_name.into(),
            persona_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(persona: &Persona, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            speaker_name: persona.display_name.clone(),
            persona_id: Some(persona.id.clone()),
            created_at: Utc::now(),
        }
    }

    /// Inline annotation for a turn that produced no reply
    pub fn turn_failure(persona: &Persona, detail: &str) -> Self {
        Self {
            role: Role::System,
            content: format!("Error with {}'s response: {}", persona.display_name, detail),
            speaker_name: "System".to_string(),
            persona_id: None,
            created_at: Utc::now(),
        }
    }

    /// The opening message naming the topic
    pub fn topic_seed(speaker_name: impl Into<String>, topic: &str) -> Self {
        Self::user(
            speaker_name,
            format!("The topic for discussion is: \"{}\"", topic),
        )
    }
}

/// Ordered, append-only sequence of messages.
///
/// Messages cannot be edited or removed once pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True once anything beyond the seed message has been added
    pub fn has_discussion(&self) -> bool {
        self.messages.len() > 1
    }
}
