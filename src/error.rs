//! Error types for the evaluation harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while running an evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file error or unresolvable setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested question is not part of the configured set.
    #[error("Question {0} not found in the configured question set")]
    QuestionNotFound(u32),

    /// LLM API error (non-success status or provider-reported failure).
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Retrieval, generation or hosted search failure.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Markers a provider puts in its failure text when it is temporarily out of capacity.
const TRANSIENT_MARKERS: [&str; 3] = ["overloaded", "503", "service unavailable"];

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this failure looks like transient provider overload.
    ///
    /// Only transport-level failures qualify; a delivered response that
    /// fails to parse is never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            EvalError::LlmApi(msg) | EvalError::Http(msg) => {
                let msg = msg.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker))
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::LlmParse(err.to_string())
    }
}
