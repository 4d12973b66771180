//! Routes `provider/model` identifiers to a concrete provider client.

use super::{Completion, CompletionRequest, GeminiClient, LlmClient, OpenAiClient};
use crate::config::ProvidersConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Dispatches completions by the model id's provider prefix.
///
/// `gemini/gemini-2.5-flash` goes to the client registered as `gemini` with
/// the bare model `gemini-2.5-flash`. Ids without a prefix go to the default
/// provider.
#[derive(Clone)]
pub struct ProviderRouter {
    providers: Vec<(String, Arc<dyn LlmClient>)>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register every provider that has credentials configured.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut router = Self::new(config.default_provider.clone());
        if !config.openai.api_key.is_empty() {
            router = router.with_provider("openai", Arc::new(OpenAiClient::new(config.openai.clone())));
        }
        if !config.gemini.api_key.is_empty() {
            router = router.with_provider("gemini", Arc::new(GeminiClient::new(config.gemini.clone())));
        }
        router
    }

    pub fn with_provider(mut self, name: impl Into<String>, client: Arc<dyn LlmClient>) -> Self {
        self.providers.push((name.into(), client));
        self
    }

    /// Resolve a model id into a client and the provider-local model name.
    pub fn resolve<'a>(&self, model_id: &'a str) -> Option<(Arc<dyn LlmClient>, &'a str)> {
        let (provider, model) = match model_id.split_once('/') {
            Some((prefix, rest)) if self.lookup(prefix).is_some() => (prefix, rest),
            _ => (self.default_provider.as_str(), model_id),
        };

        if model.trim().is_empty() {
            return None;
        }

        self.lookup(provider).map(|client| (client, model))
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn LlmClient>> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| Arc::clone(c))
    }
}

#[async_trait]
impl LlmClient for ProviderRouter {
    fn provider_name(&self) -> &'static str {
        "router"
    }

    fn supports(&self, model_id: &str) -> bool {
        self.resolve(model_id)
            .is_some_and(|(client, model)| client.supports(model))
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let (client, model) = self.resolve(&request.model).ok_or_else(|| {
            EvalError::Config(format!(
                "No configured provider can serve model '{}'",
                request.model
            ))
        })?;

        debug!(provider = client.provider_name(), model, "routing completion");

        let mut routed = request.clone();
        routed.model = model.to_string();
        client.complete(&routed).await
    }
}
