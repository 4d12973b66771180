//! LLM-as-judge evaluation.
//!
//! - [`EvaluationRequest`] bundles the question, retrieved context and answer
//! - [`JudgeExecutor`] runs the judge call with bounded backoff on overload
//! - [`Evaluation`] is the tagged success/failure result

mod evaluation;
mod executor;

pub use evaluation::{
    Criterion, CriterionScore, Evaluation, FAILURE_SCORE, FailureReason, Scorecard,
    strip_code_fence,
};
pub use executor::{EvaluationRequest, JudgeExecutor, JudgeOverrides, RetryDecision, RetryState};
