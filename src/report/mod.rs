//! Per-question reports.
//!
//! [`QuestionReport`] is the unit handed to persistence. [`synthesize`]
//! turns it into a structured JSON record and a Markdown document.

mod markdown;

pub use markdown::render_markdown;

use crate::compare::{ScoreComparison, compare};
use crate::error::{EvalError, Result};
use crate::pipeline::PipelineRun;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Stage that failed while evaluating a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    ManualRag,
    FileSearchRag,
    Persistence,
}

impl Component {
    pub fn label(self) -> &'static str {
        match self {
            Component::ManualRag => "Manual RAG",
            Component::FileSearchRag => "File Search RAG",
            Component::Persistence => "Persistence",
        }
    }
}

/// A failure caught at a pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFailure {
    pub component: Component,
    pub message: String,
}

/// Everything recorded for one evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub question_id: u32,
    pub question: String,
    pub category: String,
    pub timestamp: DateTime<Local>,
    pub manual_rag: Option<PipelineRun>,
    pub file_search_rag: Option<PipelineRun>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ComponentFailure>,
}

impl QuestionReport {
    /// Both runs, when both pipelines ran and both carry successful evaluations.
    pub fn comparable_runs(&self) -> Option<(&PipelineRun, &PipelineRun)> {
        let manual = self.manual_rag.as_ref()?;
        let file_search = self.file_search_rag.as_ref()?;
        (manual.successful_evaluation().is_some() && file_search.successful_evaluation().is_some())
            .then_some((manual, file_search))
    }

    /// Per-criterion comparison of the two evaluations, if comparable.
    pub fn comparison(&self) -> Option<ScoreComparison> {
        let (manual, file_search) = self.comparable_runs()?;
        compare(
            manual.successful_evaluation()?,
            file_search.successful_evaluation()?,
        )
    }
}

/// The two serializable forms of a report.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub json: serde_json::Value,
    pub markdown: String,
}

/// Render a report. `generated_at` only feeds the Markdown footer.
pub fn synthesize(report: &QuestionReport, generated_at: DateTime<Local>) -> Result<RenderedReport> {
    let json =
        serde_json::to_value(report).map_err(|e| EvalError::Serialization(e.to_string()))?;

    Ok(RenderedReport {
        json,
        markdown: render_markdown(report, generated_at),
    })
}
