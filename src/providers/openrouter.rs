// OpenRouter chat-completions generator
//
// One POST per turn: the persona's instruction message followed by the
// transcript so far. No retries and no request timeout; a hung request
// stalls that persona's turn.

use async_trait::async_trait;
use reqwest::Client;

use super::types::{ChatMessage, ChatRequest, ChatResponse};
use super::{instruction_for, GenerationError, ResponseGenerator};
use crate::config::{GatewayConfig, Persona};
use crate::credentials::Credential;
use crate::discussion::Message;

#[derive(Clone)]
pub struct OpenRouterGenerator {
    client: Client,
    endpoint: String,
    referer: String,
    title: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterGenerator {
    pub fn new(gateway: &GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", gateway.base_url.trim_end_matches('/')),
            referer: gateway.referer.clone(),
            title: gateway.title.clone(),
            max_tokens: gateway.max_tokens,
            temperature: gateway.temperature,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the request body for one turn
    pub fn build_request(&self, persona: &Persona, history: &[Message]) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(instruction_for(persona)));
        messages.extend(history.iter().map(ChatMessage::from));

        ChatRequest {
            model: persona.model_id.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ResponseGenerator for OpenRouterGenerator {
    async fn generate(
        &self,
        persona: &Persona,
        history: &[Message],
        credential: &Credential,
    ) -> Result<String, GenerationError> {
        credential.validate()?;

        let request = self.build_request(persona, history);
        tracing::debug!(
            "Sending request to OpenRouter for {} using model {} ({} messages)",
            persona.display_name,
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!("OpenRouter API error ({}): {}", status, body);
            return Err(GenerationError::Gateway {
                status: status.as_u16(),
                detail: body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let content = parsed.into_content().ok_or_else(|| {
            GenerationError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

        tracing::debug!("Received response for {}", persona.display_name);
        Ok(content)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
