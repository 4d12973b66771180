//! Judge call executor: prompt, call, sanitize, parse, retry.

use super::evaluation::{Evaluation, FailureReason, strip_code_fence};
use crate::config::JudgeConfig;
use crate::error::{EvalError, Result};
use crate::llm::{CompletionRequest, LlmClient, Prompts, ResponseMode, join_chunks};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One answer to be graded.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub question: String,
    /// Retrieved chunks in rank order; only the first five are submitted.
    pub context: Vec<String>,
    pub answer: String,
    /// Name of the pipeline being graded, for logs.
    pub system_label: String,
}

impl EvaluationRequest {
    pub fn new(
        question: impl Into<String>,
        context: &[String],
        answer: impl Into<String>,
        system_label: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            context: context.iter().take(crate::llm::MAX_JUDGE_CHUNKS).cloned().collect(),
            answer: answer.into(),
            system_label: system_label.into(),
        }
    }

    /// Context chunks joined with the separator marker.
    pub fn joined_context(&self) -> String {
        join_chunks(&self.context)
    }

    pub fn prompt(&self) -> String {
        Prompts::judge(&self.question, &self.joined_context(), &self.answer)
    }
}

/// Per-call overrides of the configured judge settings.
#[derive(Debug, Clone, Default)]
pub struct JudgeOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_attempts: Option<u32>,
}

/// What to do after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep this long, then try again.
    RetryAfter(Duration),
    GiveUp,
}

/// Attempt counter and next backoff delay for one judge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    delay: Duration,
}

impl RetryState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            attempt: 0,
            delay: base_delay,
        }
    }

    /// Zero-based index of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Advance after a failed attempt.
    ///
    /// Only transient failures with attempts left are retried; the delay
    /// doubles after every retry.
    pub fn on_failure(&mut self, transient: bool, max_attempts: u32) -> RetryDecision {
        if !transient || self.attempt + 1 >= max_attempts {
            return RetryDecision::GiveUp;
        }
        let wait = self.delay;
        self.delay = self.delay.saturating_mul(2);
        self.attempt += 1;
        RetryDecision::RetryAfter(wait)
    }
}

/// Solicits structured evaluations from a judge model.
///
/// Holds no state between calls; every [`evaluate`](Self::evaluate) runs its
/// own [`RetryState`].
pub struct JudgeExecutor {
    client: Arc<dyn LlmClient>,
    config: JudgeConfig,
}

impl JudgeExecutor {
    pub fn new(client: Arc<dyn LlmClient>, config: &JudgeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Resolve the model and attempt budget for a call.
    ///
    /// Callers can run this up front to surface configuration errors before
    /// any pipeline or network work starts.
    pub fn check(&self, overrides: &JudgeOverrides) -> Result<String> {
        let model = overrides
            .model
            .as_ref()
            .or(self.config.model.as_ref())
            .ok_or_else(|| {
                EvalError::Config(
                    "No judge model specified. Set judge.model in the config file or JUDGE_MODEL."
                        .to_string(),
                )
            })?;

        if !self.client.supports(model) {
            return Err(EvalError::Config(format!(
                "Judge model '{}' does not resolve to a configured provider",
                model
            )));
        }

        if overrides.max_attempts.unwrap_or(self.config.max_attempts) == 0 {
            return Err(EvalError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(model.clone())
    }

    /// Grade one answer.
    ///
    /// Returns `Err` only for configuration problems. Every provider or
    /// parsing failure is folded into an [`Evaluation::Failure`].
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        overrides: &JudgeOverrides,
    ) -> Result<Evaluation> {
        let model = self.check(overrides)?;
        let temperature = overrides.temperature.unwrap_or(self.config.temperature);
        let max_attempts = overrides.max_attempts.unwrap_or(self.config.max_attempts);

        info!(system = %request.system_label, %model, "evaluating answer with judge");

        let completion = CompletionRequest::user(model, request.prompt())
            .with_response_mode(ResponseMode::Json)
            .with_temperature(temperature);

        let mut state = RetryState::new(self.config.base_delay());
        loop {
            match self.client.complete(&completion).await {
                Ok(reply) => {
                    let cleaned = strip_code_fence(&reply.text);
                    let evaluation = Evaluation::from_reply(cleaned);
                    match &evaluation {
                        Evaluation::Success { .. } => {
                            info!(system = %request.system_label, "judge evaluation complete");
                        }
                        Evaluation::Failure { reason, .. } => {
                            error!(system = %request.system_label, %reason, "judge reply unusable");
                            debug!(raw = cleaned, "raw judge reply");
                        }
                    }
                    return Ok(evaluation);
                }
                Err(err) => {
                    error!(system = %request.system_label, error = %err, "judge call failed");
                    match state.on_failure(err.is_transient(), max_attempts) {
                        RetryDecision::RetryAfter(wait) => {
                            warn!(
                                attempt = state.attempt(),
                                max_attempts,
                                wait_secs = wait.as_secs_f64(),
                                "judge provider overloaded, backing off"
                            );
                            tokio::time::sleep(wait).await;
                        }
                        RetryDecision::GiveUp => break,
                    }
                }
            }
        }

        Ok(Evaluation::failure(FailureReason::Exhausted, None))
    }
}
