// src/gateway.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::conversation::{Message, MessageRole};

/// Instruction sent ahead of every conversation.
pub const SYSTEM_PROMPT: &str = "Anda adalah asisten virtual Smart City. \
Bantu warga dengan informasi seputar lalu lintas, cuaca, kesehatan, pendidikan, \
dan keamanan kota. Jawab dengan singkat, ramah, dan dalam Bahasa Indonesia. \
Gunakan format markdown bila membantu.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network Error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API Error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Malformed Response: {0}")]
    MalformedResponse(String),
    #[error("Request Aborted: {0}")]
    Aborted(String),
}

/// Anything that can turn a conversation history into the assistant's next reply.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn complete(&self, history: &[Message]) -> Result<String, GatewayError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for PayloadRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => PayloadRole::User,
            MessageRole::Assistant => PayloadRole::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMessage {
    pub role: PayloadRole,
    pub content: String,
}

/// System record first, then the history in order.
pub fn build_payload(history: &[Message]) -> Vec<PayloadMessage> {
    let mut payload = Vec::with_capacity(history.len() + 1);
    payload.push(PayloadMessage {
        role: PayloadRole::System,
        content: SYSTEM_PROMPT.to_string(),
    });
    payload.extend(history.iter().map(|m| PayloadMessage {
        role: m.role.into(),
        content: m.text.clone(),
    }));
    payload
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<PayloadMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct CompletionClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatGateway for CompletionClient {
    async fn complete(&self, history: &[Message]) -> Result<String, GatewayError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: build_payload(history),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        debug!(model = %self.model, messages = body.messages.len(), "sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "completion endpoint returned an error");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::MalformedResponse("no choices in response".to_string()))
    }
}
