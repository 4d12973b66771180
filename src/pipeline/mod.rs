//! The two answer-generation pipelines under comparison.
//!
//! Both sit behind small traits so the orchestrator can run them, and tests
//! can replace them, without knowing how retrieval works.

mod file_search;
mod manual;

pub use file_search::FileSearchClient;
pub use manual::{ChunkConfig, KeywordIndex, ManualRag};

use crate::error::Result;
use crate::judge::Evaluation;
use crate::llm::Prompts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Retrieve, augment, generate.
#[async_trait]
pub trait RetrievalPipeline: Send + Sync {
    /// Top-k chunks for a query, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>>;

    /// Build the generation prompt from the retrieved chunks.
    fn generate_prompt(&self, query: &str, chunks: &[String]) -> String {
        Prompts::rag_answer(query, chunks)
    }

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Answer from a provider-hosted search tool.
#[derive(Debug, Clone)]
pub struct HostedAnswer {
    pub answer: String,
    /// Texts of the grounding chunks, in the order the provider returned them.
    pub grounding_chunks: Vec<String>,
    /// Grounding chunks the provider reported, including ones without text.
    pub reported_chunks: usize,
    pub time_to_first_token: f64,
}

/// A provider-hosted retrieval + generation service.
#[async_trait]
pub trait HostedSearch: Send + Sync {
    async fn ask(&self, query: &str, corpus_id: &str) -> Result<HostedAnswer>;
}

/// Output of one pipeline run, plus the judge's grade once attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub answer: String,
    pub context: Vec<String>,
    pub latency_seconds: f64,
    pub num_chunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl PipelineRun {
    pub fn new(answer: String, context: Vec<String>, latency_seconds: f64) -> Self {
        Self {
            answer,
            num_chunks: context.len(),
            context,
            latency_seconds: latency_seconds.max(0.0),
            grounding_chunks: None,
            evaluation: None,
        }
    }

    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    /// The evaluation, if present and successful.
    pub fn successful_evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref().filter(|e| e.is_success())
    }
}

/// Run the manual pipeline, timing search + prompt + generation.
pub async fn run_manual(
    pipeline: &dyn RetrievalPipeline,
    query: &str,
    top_k: usize,
) -> Result<PipelineRun> {
    info!("running manual RAG pipeline");
    let start = Instant::now();

    let chunks = pipeline.search(query, top_k).await?;
    let prompt = pipeline.generate_prompt(query, &chunks);
    let answer = pipeline.generate(&prompt).await?;

    Ok(PipelineRun::new(answer, chunks, start.elapsed().as_secs_f64()))
}

/// Run the hosted pipeline; latency is the provider's time to first token.
pub async fn run_file_search(
    search: &dyn HostedSearch,
    query: &str,
    corpus_id: &str,
) -> Result<PipelineRun> {
    info!(corpus = corpus_id, "running file search RAG pipeline");
    let hosted = search.ask(query, corpus_id).await?;

    let mut run = PipelineRun::new(hosted.answer, hosted.grounding_chunks, hosted.time_to_first_token);
    if hosted.reported_chunks > 0 {
        run.grounding_chunks = Some(hosted.reported_chunks);
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use std::sync::Mutex;

    struct FixedPipeline {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RetrievalPipeline for FixedPipeline {
        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<String>> {
            Ok((1..=top_k).map(|i| format!("chunk {}", i)).collect())
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("generated".to_string())
        }
    }

    struct FailingHosted;

    #[async_trait]
    impl HostedSearch for FailingHosted {
        async fn ask(&self, _query: &str, _corpus_id: &str) -> Result<HostedAnswer> {
            Err(EvalError::Pipeline("store not found".to_string()))
        }
    }

    struct FixedHosted;

    #[async_trait]
    impl HostedSearch for FixedHosted {
        async fn ask(&self, _query: &str, _corpus_id: &str) -> Result<HostedAnswer> {
            Ok(HostedAnswer {
                answer: "hosted".to_string(),
                grounding_chunks: vec!["g1".to_string()],
                reported_chunks: 2,
                time_to_first_token: 1.25,
            })
        }
    }

    #[tokio::test]
    async fn test_run_manual_builds_prompt_from_chunks() {
        let pipeline = FixedPipeline {
            prompts: Mutex::new(Vec::new()),
        };
        let run = run_manual(&pipeline, "Q?", 3).await.unwrap();

        assert_eq!(run.answer, "generated");
        assert_eq!(run.num_chunks, 3);
        assert!(run.latency_seconds >= 0.0);
        assert!(run.evaluation.is_none());
        assert!(pipeline.prompts.lock().unwrap()[0].contains("[3] chunk 3"));
    }

    #[tokio::test]
    async fn test_run_file_search_uses_ttft() {
        let run = run_file_search(&FixedHosted, "Q?", "corpus").await.unwrap();
        assert_eq!(run.latency_seconds, 1.25);
        assert_eq!(run.num_chunks, 1);
        assert_eq!(run.grounding_chunks, Some(2));

        tokio_test::assert_err!(run_file_search(&FailingHosted, "Q?", "corpus").await);
    }
}
