//! Persistence layer for evaluation reports.
//!
//! Each evaluated question produces two artifacts that share a base name:
//! a pretty-printed JSON record and a Markdown document.

use crate::error::{EvalError, Result};
use crate::report::{QuestionReport, RenderedReport};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Timestamp layout used in artifact file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where the two artifacts of a report were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Destination for rendered reports.
pub trait ReportSink: Send + Sync {
    fn persist(&self, report: &QuestionReport, rendered: &RenderedReport) -> Result<ArtifactPaths>;
}

/// Writes reports as files under one output directory.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    output_dir: PathBuf,
}

impl FileReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// `evaluation_single_q{id}_{YYYYmmdd_HHMMSS}`, taken from the report timestamp.
    pub fn base_name(report: &QuestionReport) -> String {
        format!(
            "evaluation_single_q{}_{}",
            report.question_id,
            report.timestamp.format(FILE_TIMESTAMP_FORMAT)
        )
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir).map_err(|e| EvalError::io(&self.output_dir, e))?;
        }
        Ok(())
    }
}

impl ReportSink for FileReportSink {
    fn persist(&self, report: &QuestionReport, rendered: &RenderedReport) -> Result<ArtifactPaths> {
        self.ensure_dir()?;

        let base = Self::base_name(report);
        let paths = ArtifactPaths {
            json: self.output_dir.join(format!("{}.json", base)),
            markdown: self.output_dir.join(format!("{}.md", base)),
        };

        let json = serde_json::to_string_pretty(&rendered.json)
            .map_err(|e| EvalError::Serialization(e.to_string()))?;
        fs::write(&paths.json, json).map_err(|e| EvalError::io(&paths.json, e))?;
        fs::write(&paths.markdown, &rendered.markdown)
            .map_err(|e| EvalError::io(&paths.markdown, e))?;

        info!(
            json = %paths.json.display(),
            markdown = %paths.markdown.display(),
            "report saved"
        );
        Ok(paths)
    }
}
