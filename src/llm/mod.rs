//! LLM integration module.
//!
//! Everything that calls a language model goes through the [`LlmClient`]
//! trait. There is one implementation per provider family plus a
//! [`ProviderRouter`] that picks the family from a `provider/model` id.

mod gemini;
mod openai;
mod prompts;
mod router;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use prompts::{CHUNK_SEPARATOR, MAX_JUDGE_CHUNKS, Prompts, count_chunks, join_chunks};
pub use router::ProviderRouter;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Output shape requested from the model.
///
/// `Json` is advisory: providers may still wrap the object in a code fence
/// or ignore the mode entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Text,
    Json,
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub response_mode: ResponseMode,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Single user message, text mode, provider default temperature.
    pub fn user(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            response_mode: ResponseMode::Text,
            temperature: None,
        }
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Response from an LLM call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text.
    pub text: String,
    /// The provider's full response body.
    pub raw: serde_json::Value,
}

/// A language-model completion capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short provider name used in logs.
    fn provider_name(&self) -> &'static str;

    /// Whether `model_id` resolves to a model this client can invoke.
    fn supports(&self, model_id: &str) -> bool {
        !model_id.trim().is_empty()
    }

    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
