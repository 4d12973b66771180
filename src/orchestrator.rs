//! Per-question evaluation flow.
//!
//! Runs the manual pipeline, then the hosted pipeline, grades each answer,
//! compares the grades and hands the finished report to a [`ReportSink`].
//! The two pipelines run one after the other with configurable pauses in
//! between to stay inside provider rate limits.

use crate::compare::{ChunkVolumeCheck, ScoreComparison};
use crate::config::{Config, Question, ScheduleConfig};
use crate::error::{EvalError, Result};
use crate::judge::{Evaluation, EvaluationRequest, JudgeExecutor, JudgeOverrides};
use crate::persistence::{ArtifactPaths, ReportSink};
use crate::pipeline::{HostedSearch, PipelineRun, RetrievalPipeline, run_file_search, run_manual};
use crate::report::{Component, ComponentFailure, QuestionReport, synthesize};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Where a question's evaluation got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    ManualRun,
    ManualJudged,
    FileSearchRun,
    FileSearchJudged,
    Compared,
    Persisted,
    Done,
    /// A component failed; the remaining stages still run.
    Failed(Component),
}

/// Hooks for following an evaluation as it happens. Every method defaults to a no-op.
pub trait Progress: Send + Sync {
    fn question_started(&self, _question: &Question) {}
    fn pipeline_started(&self, _component: Component) {}
    fn pipeline_finished(&self, _component: Component, _run: &PipelineRun) {}
    fn judge_started(&self, _request: &EvaluationRequest) {}
    fn judge_finished(&self, _component: Component, _evaluation: &Evaluation) {}
    fn waiting(&self, _delay: Duration, _reason: &str) {}
    fn component_failed(&self, _failure: &ComponentFailure) {}
    fn compared(&self, _comparison: &ScoreComparison, _chunks: &ChunkVolumeCheck) {}
    fn persisted(&self, _paths: &ArtifactPaths) {}
}

/// Progress sink that ignores everything.
pub struct Silent;

impl Progress for Silent {}

/// Result of evaluating one question.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub report: QuestionReport,
    pub comparison: Option<ScoreComparison>,
    /// Absent when persisting failed.
    pub artifacts: Option<ArtifactPaths>,
    /// Stages in the order they were reached.
    pub stages: Vec<Stage>,
}

/// Sequences pipelines, judge calls, comparison and persistence.
pub struct Evaluator {
    manual: Arc<dyn RetrievalPipeline>,
    file_search: Arc<dyn HostedSearch>,
    judge: JudgeExecutor,
    sink: Arc<dyn ReportSink>,
    progress: Arc<dyn Progress>,
    overrides: JudgeOverrides,
    config: Config,
}

impl Evaluator {
    pub fn new(
        config: &Config,
        manual: Arc<dyn RetrievalPipeline>,
        file_search: Arc<dyn HostedSearch>,
        judge: JudgeExecutor,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            manual,
            file_search,
            judge,
            sink,
            progress: Arc::new(Silent),
            overrides: JudgeOverrides::default(),
            config: config.clone(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_overrides(mut self, overrides: JudgeOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.config.schedule = schedule;
        self
    }

    /// Evaluate one question from the configured set.
    ///
    /// Returns `Err` only for an unknown question id or an unusable judge
    /// configuration, both detected before any pipeline runs. Pipeline,
    /// judge and persistence failures are recorded in the outcome instead.
    pub async fn evaluate_question(&self, id: u32, skip_judge: bool) -> Result<QuestionOutcome> {
        let question = self.config.question(id)?.clone();

        if !skip_judge {
            self.judge.check(&self.overrides)?;
        }

        info!(question_id = id, category = %question.category, skip_judge, "evaluating question");
        self.progress.question_started(&question);

        let timestamp = Local::now();
        let mut stages = vec![Stage::NotStarted];
        let mut failures = Vec::new();

        let manual_rag = match self.manual_stage(&question, skip_judge, &mut stages).await {
            Ok(run) => Some(run),
            Err(err) => {
                self.record_failure(Component::ManualRag, &err, &mut failures, &mut stages);
                None
            }
        };

        self.pause(
            self.config.schedule.inter_pipeline_delay(),
            "before running the file search pipeline",
        )
        .await;

        let file_search_rag = match self.file_search_stage(&question, skip_judge, &mut stages).await
        {
            Ok(run) => Some(run),
            Err(err) => {
                self.record_failure(Component::FileSearchRag, &err, &mut failures, &mut stages);
                None
            }
        };

        let report = QuestionReport {
            question_id: question.id,
            question: question.question,
            category: question.category,
            timestamp,
            manual_rag,
            file_search_rag,
            failures,
        };

        let comparison = self.compare_stage(&report);
        if comparison.is_some() {
            stages.push(Stage::Compared);
        }

        let artifacts = match self.persist(&report) {
            Ok(paths) => {
                stages.push(Stage::Persisted);
                self.progress.persisted(&paths);
                Some(paths)
            }
            Err(err) => {
                let failure = ComponentFailure {
                    component: Component::Persistence,
                    message: err.to_string(),
                };
                error!(error = %err, "failed to persist report");
                self.progress.component_failed(&failure);
                stages.push(Stage::Failed(Component::Persistence));
                None
            }
        };

        stages.push(Stage::Done);
        info!(question_id = id, ?stages, "question evaluation finished");

        Ok(QuestionOutcome {
            report,
            comparison,
            artifacts,
            stages,
        })
    }

    async fn manual_stage(
        &self,
        question: &Question,
        skip_judge: bool,
        stages: &mut Vec<Stage>,
    ) -> Result<PipelineRun> {
        self.progress.pipeline_started(Component::ManualRag);
        let run = run_manual(self.manual.as_ref(), &question.question, self.config.retrieval.top_k)
            .await?;
        stages.push(Stage::ManualRun);
        self.progress.pipeline_finished(Component::ManualRag, &run);

        if skip_judge {
            return Ok(run);
        }

        let evaluation = self.grade(question, &run, Component::ManualRag).await?;
        stages.push(Stage::ManualJudged);
        Ok(run.with_evaluation(evaluation))
    }

    async fn file_search_stage(
        &self,
        question: &Question,
        skip_judge: bool,
        stages: &mut Vec<Stage>,
    ) -> Result<PipelineRun> {
        self.progress.pipeline_started(Component::FileSearchRag);
        let run = run_file_search(
            self.file_search.as_ref(),
            &question.question,
            &self.config.dataset,
        )
        .await?;
        stages.push(Stage::FileSearchRun);
        self.progress.pipeline_finished(Component::FileSearchRag, &run);

        if skip_judge {
            return Ok(run);
        }

        self.pause(self.config.schedule.pre_judge_delay(), "before calling the judge")
            .await;
        let evaluation = self.grade(question, &run, Component::FileSearchRag).await?;
        stages.push(Stage::FileSearchJudged);
        Ok(run.with_evaluation(evaluation))
    }

    async fn grade(
        &self,
        question: &Question,
        run: &PipelineRun,
        component: Component,
    ) -> Result<Evaluation> {
        let request = EvaluationRequest::new(
            question.question.as_str(),
            &run.context,
            run.answer.as_str(),
            component.label(),
        );
        self.progress.judge_started(&request);

        let evaluation = self.judge.evaluate(&request, &self.overrides).await?;
        self.progress.judge_finished(component, &evaluation);
        Ok(evaluation)
    }

    fn compare_stage(&self, report: &QuestionReport) -> Option<ScoreComparison> {
        let (manual, file_search) = report.comparable_runs()?;
        let comparison = report.comparison()?;

        let chunks = ChunkVolumeCheck::new(&manual.context, &file_search.context);
        self.progress.compared(&comparison, &chunks);
        Some(comparison)
    }

    fn persist(&self, report: &QuestionReport) -> Result<ArtifactPaths> {
        let rendered = synthesize(report, Local::now())?;
        self.sink.persist(report, &rendered)
    }

    fn record_failure(
        &self,
        component: Component,
        err: &EvalError,
        failures: &mut Vec<ComponentFailure>,
        stages: &mut Vec<Stage>,
    ) {
        error!(component = component.label(), error = %err, "pipeline failed");
        let failure = ComponentFailure {
            component,
            message: err.to_string(),
        };
        self.progress.component_failed(&failure);
        failures.push(failure);
        stages.push(Stage::Failed(component));
    }

    async fn pause(&self, delay: Duration, reason: &str) {
        if delay.is_zero() {
            return;
        }
        self.progress.waiting(delay, reason);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JudgeConfig;
    use crate::judge::Criterion;
    use crate::llm::{Completion, CompletionRequest, LlmClient};
    use crate::pipeline::HostedAnswer;
    use crate::report::RenderedReport;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeManual {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RetrievalPipeline for FakeManual {
        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EvalError::Pipeline("vector store unavailable".into()));
            }
            Ok((1..=top_k).map(|i| format!("manual chunk {}", i)).collect())
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("manual answer".to_string())
        }
    }

    struct FakeHosted;

    #[async_trait]
    impl HostedSearch for FakeHosted {
        async fn ask(&self, _query: &str, _corpus_id: &str) -> Result<HostedAnswer> {
            Ok(HostedAnswer {
                answer: "hosted answer".to_string(),
                grounding_chunks: vec!["hosted chunk".to_string()],
                reported_chunks: 1,
                time_to_first_token: 0.9,
            })
        }
    }

    /// Grades the manual answer 4 and the hosted answer 5 on every criterion.
    #[derive(Default)]
    struct FakeJudge {
        calls: AtomicUsize,
    }

    fn uniform_reply(score: u8) -> String {
        let mut body = serde_json::Map::new();
        for criterion in Criterion::ALL {
            body.insert(
                criterion.key().to_string(),
                serde_json::json!({"score": score, "justification": "ok"}),
            );
        }
        body.insert("overall_assessment".into(), "fine".into());
        serde_json::Value::Object(body).to_string()
    }

    #[async_trait]
    impl LlmClient for FakeJudge {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = &request.messages[0].content;
            let score = if prompt.contains("hosted answer") { 5 } else { 4 };
            Ok(Completion {
                text: uniform_reply(score),
                raw: serde_json::Value::Null,
            })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        fail: bool,
        saved: Mutex<Vec<(QuestionReport, String)>>,
    }

    impl ReportSink for MemorySink {
        fn persist(&self, report: &QuestionReport, rendered: &RenderedReport) -> Result<ArtifactPaths> {
            if self.fail {
                return Err(EvalError::io(
                    "/readonly",
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.saved
                .lock()
                .unwrap()
                .push((report.clone(), rendered.markdown.clone()));
            Ok(ArtifactPaths {
                json: PathBuf::from("memory.json"),
                markdown: PathBuf::from("memory.md"),
            })
        }
    }

    fn config() -> Config {
        Config {
            dataset: "direito_constitucional".to_string(),
            questions: vec![Question {
                id: 1,
                category: "constitutional".to_string(),
                question: "X?".to_string(),
            }],
            judge: JudgeConfig {
                model: Some("fake/judge".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    struct Harness {
        evaluator: Evaluator,
        manual: Arc<FakeManual>,
        judge: Arc<FakeJudge>,
        sink: Arc<MemorySink>,
    }

    fn harness(config: &Config, manual_fails: bool, sink_fails: bool) -> Harness {
        let manual = Arc::new(FakeManual {
            fail: manual_fails,
            calls: AtomicUsize::new(0),
        });
        let judge = Arc::new(FakeJudge::default());
        let sink = Arc::new(MemorySink {
            fail: sink_fails,
            ..Default::default()
        });
        let evaluator = Evaluator::new(
            config,
            manual.clone(),
            Arc::new(FakeHosted),
            JudgeExecutor::new(judge.clone(), &config.judge),
            sink.clone(),
        )
        .with_schedule(ScheduleConfig::immediate());

        Harness {
            evaluator,
            manual,
            judge,
            sink,
        }
    }

    #[tokio::test]
    async fn test_full_run_compares_and_persists() {
        let h = harness(&config(), false, false);
        let outcome = h.evaluator.evaluate_question(1, false).await.unwrap();

        assert_eq!(
            outcome.stages,
            vec![
                Stage::NotStarted,
                Stage::ManualRun,
                Stage::ManualJudged,
                Stage::FileSearchRun,
                Stage::FileSearchJudged,
                Stage::Compared,
                Stage::Persisted,
                Stage::Done,
            ]
        );

        let comparison = outcome.comparison.unwrap();
        assert!(comparison.deltas.iter().all(|d| d.difference == 1));
        let tally = comparison.tally();
        assert_eq!((tally.manual_wins, tally.file_search_wins, tally.ties), (0, 5, 0));

        assert_eq!(h.judge.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.report.manual_rag.as_ref().unwrap().num_chunks, 5);
        assert!(outcome.artifacts.is_some());

        let saved = h.sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, outcome.report);
        assert!(saved[0].1.contains("## Score Comparison"));
    }

    #[tokio::test]
    async fn test_manual_failure_does_not_stop_file_search() {
        let h = harness(&config(), true, false);
        let outcome = h.evaluator.evaluate_question(1, false).await.unwrap();

        assert!(outcome.report.manual_rag.is_none());
        let hosted = outcome.report.file_search_rag.as_ref().unwrap();
        assert!(hosted.successful_evaluation().is_some());
        assert!(outcome.comparison.is_none());

        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.failures[0].component, Component::ManualRag);
        assert!(outcome.report.failures[0].message.contains("vector store unavailable"));
        assert!(outcome.stages.contains(&Stage::Failed(Component::ManualRag)));
        assert!(!outcome.stages.contains(&Stage::Compared));

        let saved = h.sink.saved.lock().unwrap();
        assert!(!saved[0].1.contains("## Manual RAG"));
        assert!(saved[0].1.contains("## File Search RAG"));
        assert!(!saved[0].1.contains("## Score Comparison"));
    }

    #[tokio::test]
    async fn test_skip_judge_runs_pipelines_only() {
        let h = harness(&config(), false, false);
        let outcome = h.evaluator.evaluate_question(1, true).await.unwrap();

        assert_eq!(h.judge.calls.load(Ordering::SeqCst), 0);
        assert!(outcome.report.manual_rag.unwrap().evaluation.is_none());
        assert!(outcome.report.file_search_rag.unwrap().evaluation.is_none());
        assert!(outcome.comparison.is_none());
        assert!(!outcome.stages.contains(&Stage::ManualJudged));
        assert_eq!(h.sink.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_pauses_between_calls() {
        let cfg = config();
        let h = harness(&cfg, false, false);
        let evaluator = h.evaluator.with_schedule(ScheduleConfig::default());

        let start = tokio::time::Instant::now();
        evaluator.evaluate_question(1, false).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(8));

        let start = tokio::time::Instant::now();
        evaluator.evaluate_question(1, true).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(5), "pre-judge pause taken: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_unknown_question_and_missing_model_fail_up_front() {
        let h = harness(&config(), false, false);
        let err = h.evaluator.evaluate_question(99, false).await.unwrap_err();
        assert!(matches!(err, EvalError::QuestionNotFound(99)));

        let mut cfg = config();
        cfg.judge.model = None;
        let h = harness(&cfg, false, false);
        let err = h.evaluator.evaluate_question(1, false).await.unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
        assert_eq!(h.manual.calls.load(Ordering::SeqCst), 0);
        assert!(h.sink.saved.lock().unwrap().is_empty());

        // Judging is skipped, so no model is needed.
        assert!(h.evaluator.evaluate_question(1, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_recorded() {
        let h = harness(&config(), false, true);
        let outcome = h.evaluator.evaluate_question(1, false).await.unwrap();

        assert!(outcome.artifacts.is_none());
        assert!(outcome.comparison.is_some());
        assert_eq!(
            &outcome.stages[outcome.stages.len() - 2..],
            &[Stage::Failed(Component::Persistence), Stage::Done]
        );
    }
}
