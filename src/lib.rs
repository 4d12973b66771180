//! RAG judge evaluation - compare two answer-generation pipelines with an LLM judge.
//!
//! A manual retrieval pipeline and a provider-hosted file-search pipeline
//! answer the same question. A third model grades each answer on five fixed
//! criteria, the grades are compared, and the result is written as a JSON
//! record plus a Markdown report.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_judge_eval::{
//!     config::Config,
//!     judge::JudgeExecutor,
//!     llm::{GeminiClient, LlmClient, ProviderRouter},
//!     orchestrator::Evaluator,
//!     persistence::FileReportSink,
//!     pipeline::{FileSearchClient, ManualRag},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let router: Arc<dyn LlmClient> = Arc::new(ProviderRouter::from_config(&config.providers));
//!     let manual = ManualRag::open(
//!         &config.retrieval.corpus_dir,
//!         &config.dataset,
//!         router.clone(),
//!         config.retrieval.generation_model.clone(),
//!     );
//!     let hosted = FileSearchClient::new(
//!         GeminiClient::new(config.providers.gemini.clone()),
//!         config.file_search.model.clone(),
//!     );
//!
//!     let evaluator = Evaluator::new(
//!         &config,
//!         Arc::new(manual),
//!         Arc::new(hosted),
//!         JudgeExecutor::new(router, &config.judge),
//!         Arc::new(FileReportSink::new(config.output_dir.clone())),
//!     );
//!
//!     let outcome = evaluator.evaluate_question(1, false).await?;
//!     if let Some(comparison) = outcome.comparison {
//!         println!("{:?}", comparison.tally());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **JudgeExecutor**: judge call with response cleanup and bounded backoff
//! - **compare**: per-criterion score differences and win tally
//! - **report**: structured record and Markdown rendering
//! - **Evaluator**: per-question sequencing with per-pipeline failure isolation
//! - **ReportSink**: where finished reports go

pub mod compare;
pub mod config;
pub mod console;
pub mod error;
pub mod judge;
pub mod llm;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use compare::{ScoreComparison, compare};
pub use config::Config;
pub use error::{EvalError, Result};
pub use judge::{Evaluation, JudgeExecutor};
pub use llm::{LlmClient, ProviderRouter};
pub use orchestrator::{Evaluator, QuestionOutcome};
pub use persistence::{FileReportSink, ReportSink};
pub use report::QuestionReport;
