//! Hosted file-search pipeline backed by the Gemini file-search tool.
//!
//! Store creation and document upload happen elsewhere; this client only
//! looks up an existing store and queries it.

use super::{HostedAnswer, HostedSearch};
use crate::error::{EvalError, Result};
use crate::llm::GeminiClient;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::info;

const STORE_PREFIX: &str = "fileSearchStores/";

/// Queries a Gemini file-search store.
pub struct FileSearchClient {
    gemini: GeminiClient,
    model: String,
}

impl FileSearchClient {
    pub fn new(gemini: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            gemini,
            model: model.into(),
        }
    }

    /// Resolve a store display name (or a full resource name) to its resource name.
    async fn resolve_store(&self, corpus_id: &str) -> Result<String> {
        if corpus_id.starts_with(STORE_PREFIX) {
            return Ok(corpus_id.to_string());
        }

        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|token| ("pageToken", token))
                .into_iter()
                .collect();
            let page = self
                .gemini
                .send(Method::GET, "fileSearchStores", &query, None)
                .await?;

            if let Some(name) = find_store(&page, corpus_id) {
                info!(store = %name, display_name = corpus_id, "file search store found");
                return Ok(name);
            }

            match page["nextPageToken"].as_str() {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Err(EvalError::Pipeline(format!(
            "No file search store with display name '{}'",
            corpus_id
        )))
    }

    fn request_body(query: &str, store: &str) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": query }] }],
            "tools": [{ "fileSearch": { "fileSearchStoreNames": [store] } }]
        })
    }
}

fn find_store(page: &Value, display_name: &str) -> Option<String> {
    page["fileSearchStores"]
        .as_array()?
        .iter()
        .find(|s| s["displayName"].as_str() == Some(display_name))
        .and_then(|s| s["name"].as_str())
        .map(str::to_string)
}

/// Grounding chunk texts plus the total number of chunks the provider reported.
fn grounding_chunks(raw: &Value) -> (Vec<String>, usize) {
    let Some(chunks) = raw["candidates"][0]["groundingMetadata"]["groundingChunks"].as_array()
    else {
        return (Vec::new(), 0);
    };

    let texts = chunks
        .iter()
        .filter_map(|c| c["retrievedContext"]["text"].as_str())
        .map(str::to_string)
        .collect();
    (texts, chunks.len())
}

#[async_trait]
impl HostedSearch for FileSearchClient {
    async fn ask(&self, query: &str, corpus_id: &str) -> Result<HostedAnswer> {
        let store = self.resolve_store(corpus_id).await?;

        let start = Instant::now();
        let raw = self
            .gemini
            .generate_content(&self.model, &Self::request_body(query, &store))
            .await?;
        // The whole reply arrives at once, so first-token time is the call time.
        let ttft = start.elapsed().as_secs_f64();

        let answer = GeminiClient::candidate_text(&raw).unwrap_or_default();
        let (texts, reported) = grounding_chunks(&raw);
        info!(ttft_secs = ttft, grounding_chunks = reported, "file search answer received");

        Ok(HostedAnswer {
            answer,
            grounding_chunks: texts,
            reported_chunks: reported,
            time_to_first_token: ttft,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_store_by_display_name() {
        let page = json!({
            "fileSearchStores": [
                {"name": "fileSearchStores/abc", "displayName": "civil"},
                {"name": "fileSearchStores/def", "displayName": "direito_constitucional"}
            ]
        });
        assert_eq!(
            find_store(&page, "direito_constitucional").as_deref(),
            Some("fileSearchStores/def")
        );
        assert!(find_store(&page, "penal").is_none());
        assert!(find_store(&json!({}), "civil").is_none());
    }

    #[test]
    fn test_grounding_chunks_skip_textless_entries() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [{"text": "answer"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"retrievedContext": {"text": "first"}},
                    {"web": {"uri": "https://example.com"}},
                    {"retrievedContext": {"text": "second"}}
                ]}
            }]
        });
        let (texts, reported) = grounding_chunks(&raw);
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(reported, 3);

        assert_eq!(grounding_chunks(&json!({"candidates": []})), (Vec::new(), 0));
    }

    #[test]
    fn test_request_body_attaches_store() {
        let body = FileSearchClient::request_body("Q?", "fileSearchStores/abc");
        assert_eq!(body["tools"][0]["fileSearch"]["fileSearchStoreNames"][0], "fileSearchStores/abc");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Q?");
    }
}
