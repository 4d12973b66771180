//! Gemini `generateContent` client.
//!
//! Also exposes the raw REST calls the hosted file-search pipeline needs.

use super::{Completion, CompletionRequest, LlmClient, ResponseMode, Role};
use crate::config::ProviderConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: ProviderConfig,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        let base = if self.config.api_base.is_empty() {
            DEFAULT_API_BASE
        } else {
            self.config.api_base.trim_end_matches('/')
        };
        format!("{}/v1beta/{}", base, path.trim_start_matches('/'))
    }

    /// Build a `generateContent` body from chat messages.
    ///
    /// System messages become `systemInstruction`.
    fn build_body(request: &CompletionRequest) -> Value {
        let mut system = Vec::new();
        let mut contents = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => system.push(json!({ "text": message.content })),
                Role::User => contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": message.content }]
                })),
            }
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if request.response_mode == ResponseMode::Json {
            generation_config.insert("responseMimeType".to_string(), json!("application/json"));
        }

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": system });
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }
        body
    }

    /// Authenticated request with URL-encoded query pairs.
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("x-goog-api-key", &self.config.api_key);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
    }

    /// Send a raw REST request and return the decoded JSON body.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let response = self.request(method, path, query, body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&text) {
                return Err(EvalError::LlmApi(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(EvalError::LlmApi(format!(
                "Request failed ({}): {}",
                status, text
            )));
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Call `models/{model}:generateContent` with a prepared body.
    pub(crate) async fn generate_content(&self, model: &str, body: &Value) -> Result<Value> {
        let path = format!("models/{}:generateContent", model);
        self.send(Method::POST, &path, &[], Some(body)).await
    }

    /// Concatenate the text parts of the first candidate.
    pub(crate) fn candidate_text(raw: &Value) -> Option<String> {
        let parts = raw["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        Some(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let raw = self
            .generate_content(&request.model, &Self::build_body(request))
            .await?;

        let text = Self::candidate_text(&raw).ok_or_else(|| {
            let reason = raw["promptFeedback"]["blockReason"]
                .as_str()
                .unwrap_or("no candidates in response");
            EvalError::LlmApi(reason.to_string())
        })?;

        Ok(Completion { text, raw })
    }
}
