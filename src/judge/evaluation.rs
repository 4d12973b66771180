//! Judge evaluation records.
//!
//! An [`Evaluation`] is either a full five-criterion scorecard or a failure.
//! On the wire it keeps the flat JSON shape the judge is asked to produce,
//! with failures carrying an `error` key and every criterion scored 0.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Score written into every criterion of a failure record.
pub const FAILURE_SCORE: u8 = 0;

const FAILURE_JUSTIFICATION: &str = "evaluation failed";
const INVALID_JSON: &str = "invalid_json";
const INVALID_SCHEMA: &str = "invalid_schema";
const EXHAUSTED: &str = "all judge attempts failed";

/// The five fixed rubric dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    FactualConsistency,
    InstructionFollowing,
    DomainKnowledge,
    ContextPrecision,
    ContextRecall,
}

impl Criterion {
    /// All criteria in rubric order.
    pub const ALL: [Criterion; 5] = [
        Criterion::FactualConsistency,
        Criterion::InstructionFollowing,
        Criterion::DomainKnowledge,
        Criterion::ContextPrecision,
        Criterion::ContextRecall,
    ];

    /// JSON key used in judge replies and reports.
    pub fn key(self) -> &'static str {
        match self {
            Criterion::FactualConsistency => "factual_consistency",
            Criterion::InstructionFollowing => "instruction_following",
            Criterion::DomainKnowledge => "domain_knowledge",
            Criterion::ContextPrecision => "context_precision",
            Criterion::ContextRecall => "context_recall",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Criterion::FactualConsistency => "Factual Consistency",
            Criterion::InstructionFollowing => "Instruction Following",
            Criterion::DomainKnowledge => "Domain Knowledge",
            Criterion::ContextPrecision => "Context Precision",
            Criterion::ContextRecall => "Context Recall",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Score and justification for one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: u8,
    #[serde(default)]
    pub justification: String,
}

impl CriterionScore {
    pub fn new(score: u8, justification: impl Into<String>) -> Self {
        Self {
            score,
            justification: justification.into(),
        }
    }

    fn failed() -> Self {
        Self::new(FAILURE_SCORE, FAILURE_JUSTIFICATION)
    }
}

/// Scores for all five criteria. Every score is in 1..=5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scorecard([CriterionScore; 5]);

impl Scorecard {
    /// Build a scorecard, rejecting any score outside 1..=5.
    pub fn from_fn<F>(mut f: F) -> Result<Self, String>
    where
        F: FnMut(Criterion) -> CriterionScore,
    {
        let scores = Criterion::ALL.map(&mut f);
        for (criterion, entry) in Criterion::ALL.iter().zip(&scores) {
            if !(1..=5).contains(&entry.score) {
                return Err(format!(
                    "{} score {} is outside 1..=5",
                    criterion, entry.score
                ));
            }
        }
        Ok(Self(scores))
    }

    pub fn get(&self, criterion: Criterion) -> &CriterionScore {
        &self.0[criterion.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, &CriterionScore)> {
        Criterion::ALL.into_iter().zip(self.0.iter())
    }
}

/// Why a judge call produced no scorecard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The model replied but the reply was not JSON.
    InvalidJson,
    /// The reply was JSON but did not match the rubric contract.
    InvalidSchema(String),
    /// No usable reply: retries exhausted or a non-transient provider error.
    Exhausted,
}

impl FailureReason {
    /// Text stored in the record's `error` key.
    pub fn error_text(&self) -> String {
        match self {
            FailureReason::InvalidJson => INVALID_JSON.to_string(),
            FailureReason::InvalidSchema(detail) => format!("{}: {}", INVALID_SCHEMA, detail),
            FailureReason::Exhausted => EXHAUSTED.to_string(),
        }
    }

    /// Inverse of [`error_text`](Self::error_text). Unknown text reads as exhaustion.
    fn from_error_text(text: &str) -> Self {
        if text == INVALID_JSON {
            FailureReason::InvalidJson
        } else if let Some(detail) = text.strip_prefix(INVALID_SCHEMA) {
            FailureReason::InvalidSchema(detail.trim_start_matches(':').trim().to_string())
        } else {
            FailureReason::Exhausted
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error_text())
    }
}

/// Outcome of one judge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EvaluationRecord", try_from = "EvaluationRecord")]
pub enum Evaluation {
    Success {
        scores: Scorecard,
        overall_assessment: Option<String>,
    },
    Failure {
        reason: FailureReason,
        raw_response: Option<String>,
    },
}

impl Evaluation {
    pub fn failure(reason: FailureReason, raw_response: Option<String>) -> Self {
        Evaluation::Failure {
            reason,
            raw_response,
        }
    }

    /// Interpret a sanitized judge reply.
    ///
    /// Text that is not JSON yields `invalid_json`; JSON that lacks a
    /// criterion or scores outside 1..=5 yields `invalid_schema`. Both keep
    /// the text for diagnosis.
    pub fn from_reply(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return Self::failure(FailureReason::InvalidJson, Some(text.to_string())),
        };

        match Self::from_value(&value) {
            Ok(evaluation) => evaluation,
            Err(detail) => Self::failure(
                FailureReason::InvalidSchema(detail),
                Some(text.to_string()),
            ),
        }
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "reply is not a JSON object".to_string())?;

        let mut problem = None;
        let scores = Scorecard::from_fn(|criterion| {
            let entry = object.get(criterion.key());
            match entry.and_then(|e| parse_score(&e["score"])) {
                Some(score) => CriterionScore::new(
                    score,
                    entry
                        .and_then(|e| e["justification"].as_str())
                        .unwrap_or_default(),
                ),
                None => {
                    problem.get_or_insert_with(|| {
                        format!("missing or non-integer {} score", criterion)
                    });
                    CriterionScore::failed()
                }
            }
        });
        if let Some(problem) = problem {
            return Err(problem);
        }

        Ok(Evaluation::Success {
            scores: scores?,
            overall_assessment: object
                .get("overall_assessment")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Evaluation::Success { .. })
    }

    pub fn scorecard(&self) -> Option<&Scorecard> {
        match self {
            Evaluation::Success { scores, .. } => Some(scores),
            Evaluation::Failure { .. } => None,
        }
    }

    /// Score for a criterion; failures read as [`FAILURE_SCORE`].
    pub fn score(&self, criterion: Criterion) -> u8 {
        self.scorecard()
            .map(|s| s.get(criterion).score)
            .unwrap_or(FAILURE_SCORE)
    }

    pub fn error(&self) -> Option<String> {
        match self {
            Evaluation::Success { .. } => None,
            Evaluation::Failure { reason, .. } => Some(reason.error_text()),
        }
    }
}

/// Accept integral JSON numbers, including `4.0`.
fn parse_score(value: &Value) -> Option<u8> {
    if let Some(n) = value.as_u64() {
        return u8::try_from(n).ok();
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && (0.0..=255.0).contains(&f)).then_some(f as u8)
}

/// Remove one optional code fence around a reply (```json ... ``` or ``` ... ```).
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let inner = if let Some(rest) = text.strip_prefix("```json") {
        rest
    } else if let Some(rest) = text.strip_prefix("```") {
        rest
    } else {
        return text;
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Flat serialized form shared by success and failure records.
#[derive(Debug, Serialize, Deserialize)]
struct EvaluationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_response: Option<String>,
    #[serde(default)]
    factual_consistency: Option<CriterionScore>,
    #[serde(default)]
    instruction_following: Option<CriterionScore>,
    #[serde(default)]
    domain_knowledge: Option<CriterionScore>,
    #[serde(default)]
    context_precision: Option<CriterionScore>,
    #[serde(default)]
    context_recall: Option<CriterionScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overall_assessment: Option<String>,
}

impl EvaluationRecord {
    fn slot(&mut self, criterion: Criterion) -> &mut Option<CriterionScore> {
        match criterion {
            Criterion::FactualConsistency => &mut self.factual_consistency,
            Criterion::InstructionFollowing => &mut self.instruction_following,
            Criterion::DomainKnowledge => &mut self.domain_knowledge,
            Criterion::ContextPrecision => &mut self.context_precision,
            Criterion::ContextRecall => &mut self.context_recall,
        }
    }
}

impl From<Evaluation> for EvaluationRecord {
    fn from(evaluation: Evaluation) -> Self {
        let mut record = EvaluationRecord {
            error: None,
            raw_response: None,
            factual_consistency: None,
            instruction_following: None,
            domain_knowledge: None,
            context_precision: None,
            context_recall: None,
            overall_assessment: None,
        };

        match evaluation {
            Evaluation::Success {
                scores,
                overall_assessment,
            } => {
                for (criterion, entry) in scores.iter() {
                    *record.slot(criterion) = Some(entry.clone());
                }
                record.overall_assessment = overall_assessment;
            }
            Evaluation::Failure {
                reason,
                raw_response,
            } => {
                record.error = Some(reason.error_text());
                record.raw_response = raw_response;
                for criterion in Criterion::ALL {
                    *record.slot(criterion) = Some(CriterionScore::failed());
                }
            }
        }
        record
    }
}

impl TryFrom<EvaluationRecord> for Evaluation {
    type Error = String;

    fn try_from(mut record: EvaluationRecord) -> Result<Self, Self::Error> {
        if let Some(error) = record.error.take() {
            return Ok(Evaluation::failure(
                FailureReason::from_error_text(&error),
                record.raw_response,
            ));
        }

        let mut missing = None;
        let scores = Scorecard::from_fn(|criterion| match record.slot(criterion).take() {
            Some(entry) => entry,
            None => {
                missing.get_or_insert(criterion);
                CriterionScore::failed()
            }
        });
        if let Some(criterion) = missing {
            return Err(format!("evaluation is missing criterion {}", criterion));
        }

        Ok(Evaluation::Success {
            scores: scores?,
            overall_assessment: record.overall_assessment,
        })
    }
}
