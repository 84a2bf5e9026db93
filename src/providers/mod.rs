// Response generation
//
// A generator turns (persona, history, credential) into one reply string.
// It never retries and never touches shared state; retry policy and
// transcript bookkeeping belong to the caller.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Persona;
use crate::credentials::{Credential, CredentialError};
use crate::discussion::Message;

pub mod openrouter;
pub mod types;

pub use openrouter::OpenRouterGenerator;

/// Trait for reply generators
///
/// `OpenRouterGenerator` is the production implementation; tests script
/// their own.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce one in-character reply for `persona` given the transcript so far
    async fn generate(
        &self,
        persona: &Persona,
        history: &[Message],
        credential: &Credential,
    ) -> Result<String, GenerationError>;

    /// Generator name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Missing or malformed key; raised before any request is sent
    #[error(transparent)]
    InvalidCredential(#[from] CredentialError),

    /// Non-success HTTP status from the gateway
    #[error("OpenRouter API error: {}", gateway_summary(.status, .detail))]
    Gateway { status: u16, detail: String },

    /// The request never produced an HTTP response
    #[error("OpenRouter request failed: {0}")]
    Transport(String),

    /// Success status, but no `choices[0].message.content`
    #[error("Invalid response format from OpenRouter: {0}")]
    MalformedResponse(String),
}

fn gateway_summary(status: &u16, detail: &str) -> String {
    match *status {
        401 => "Invalid API key or authorization failed".to_string(),
        400 => "Bad request - check model ID and parameters".to_string(),
        other => format!("{} {}", other, detail.trim()),
    }
}

impl GenerationError {
    /// Credential problems halt the discussion; everything else only costs a turn
    pub fn is_credential_error(&self) -> bool {
        matches!(self, GenerationError::InvalidCredential(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GenerationError::Gateway { status: 401, .. })
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, GenerationError::Gateway { status: 400, .. })
    }
}

/// The instruction message sent ahead of the history
pub fn instruction_for(persona: &Persona) -> String {
    format!(
        "You are {name}, an AI model with the following personality: {personality}.\n\
         You are participating in a discussion with other AI models.\n\
         Respond in character, maintaining your unique perspective and personality.\n\
         Keep your response concise (2-3 sentences).\n\
         Consider and reference what other AIs have said before you (if applicable).",
        name = persona.display_name,
        personality = persona.personality,
    )
}
