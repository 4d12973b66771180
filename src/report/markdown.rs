//! Markdown rendering of a [`QuestionReport`].
//!
//! Section order is fixed: header, question, manual pipeline, file-search
//! pipeline, comparison (only when both evaluations succeeded), footer.

use super::QuestionReport;
use crate::compare::{ChunkVolumeCheck, ScoreComparison, Winner};
use crate::judge::Evaluation;
use crate::pipeline::PipelineRun;
use chrono::{DateTime, Local};

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Clone, Copy)]
enum PipelineKind {
    Manual,
    FileSearch,
}

impl PipelineKind {
    fn title(self) -> &'static str {
        match self {
            PipelineKind::Manual => "Manual RAG",
            PipelineKind::FileSearch => "File Search RAG",
        }
    }

    fn latency_label(self) -> &'static str {
        match self {
            PipelineKind::Manual => "Latency",
            PipelineKind::FileSearch => "Latency (TTFT)",
        }
    }
}

/// Render the Markdown document. Identical input renders identically.
pub fn render_markdown(report: &QuestionReport, generated_at: DateTime<Local>) -> String {
    let mut sections = vec![header(report), question_section(report)];

    if let Some(run) = &report.manual_rag {
        sections.push(pipeline_section(run, PipelineKind::Manual));
    }
    if let Some(run) = &report.file_search_rag {
        sections.push(pipeline_section(run, PipelineKind::FileSearch));
    }

    if let (Some((manual, file_search)), Some(comparison)) =
        (report.comparable_runs(), report.comparison())
    {
        sections.push(comparison_section(&comparison, manual, file_search));
    }

    sections.push(footer(generated_at));
    sections.join("\n")
}

fn header(report: &QuestionReport) -> String {
    format!(
        "# Evaluation: Question {}\n\n**Date:** {}\n\n**Category:** {}\n",
        report.question_id,
        report.timestamp.format(DATE_FORMAT),
        report.category
    )
}

fn question_section(report: &QuestionReport) -> String {
    format!("## Question\n\n{}\n\n---\n", report.question)
}

fn pipeline_section(run: &PipelineRun, kind: PipelineKind) -> String {
    let mut lines = vec![
        format!("## {}\n", kind.title()),
        format!("**{}:** {:.2}s\n", kind.latency_label(), run.latency_seconds),
        format!("**Chunks Retrieved:** {}\n", run.num_chunks),
        "### Answer\n".to_string(),
        format!("{}\n", run.answer),
    ];

    match &run.evaluation {
        Some(evaluation @ Evaluation::Success { .. }) => lines.push(evaluation_table(evaluation)),
        Some(failed) => lines.push(format!(
            "**Judge evaluation failed:** {}\n",
            failed.error().unwrap_or_default()
        )),
        None => {}
    }

    lines.push("---\n".to_string());
    lines.join("\n")
}

fn evaluation_table(evaluation: &Evaluation) -> String {
    let mut lines = vec![
        "### Judge Evaluation\n".to_string(),
        "| Criterion | Score | Justification |".to_string(),
        "|-----------|-------|---------------|".to_string(),
    ];

    if let Some(scores) = evaluation.scorecard() {
        for (criterion, entry) in scores.iter() {
            lines.push(format!(
                "| {} | {}/5 | {} |",
                criterion.label(),
                entry.score,
                table_cell(&entry.justification)
            ));
        }
    }

    if let Evaluation::Success {
        overall_assessment: Some(overall),
        ..
    } = evaluation
    {
        lines.push(format!("\n**Overall Assessment:** {}\n", overall));
    }

    lines.join("\n")
}

fn comparison_section(
    comparison: &ScoreComparison,
    manual: &PipelineRun,
    file_search: &PipelineRun,
) -> String {
    let mut lines = vec![
        "## Score Comparison\n".to_string(),
        "| Criterion | Manual RAG | File Search RAG | Difference |".to_string(),
        "|-----------|------------|-----------------|------------|".to_string(),
    ];

    for delta in &comparison.deltas {
        lines.push(format!(
            "| {} | {}/5 | {}/5 | {} |",
            delta.criterion.label(),
            delta.manual_score,
            delta.file_search_score,
            signed(delta.difference as i64)
        ));
    }

    lines.push(winner_summary(comparison));
    lines.push(chunk_analysis(&ChunkVolumeCheck::new(
        &manual.context,
        &file_search.context,
    )));
    lines.join("\n")
}

fn winner_summary(comparison: &ScoreComparison) -> String {
    let mut lines = vec!["\n### Winner per Criterion\n".to_string()];

    for delta in &comparison.deltas {
        let winner = match delta.winner() {
            Winner::Manual => "Manual RAG",
            Winner::FileSearch => "File Search RAG",
            Winner::Tie => "Tie",
        };
        lines.push(format!("- **{}:** {}", delta.criterion.label(), winner));
    }

    let tally = comparison.tally();
    lines.push(format!(
        "\n**Summary:** Manual RAG ({}) | File Search RAG ({}) | Ties ({})\n",
        tally.manual_wins, tally.file_search_wins, tally.ties
    ));
    lines.join("\n")
}

fn chunk_analysis(check: &ChunkVolumeCheck) -> String {
    let verdict = if check.counts_match() {
        "consistent"
    } else {
        "differs"
    };

    [
        "---\n".to_string(),
        "## Chunk Analysis\n".to_string(),
        "| Metric | Manual RAG | File Search RAG |".to_string(),
        "|--------|------------|-----------------|".to_string(),
        format!(
            "| Chunks sent | {} | {} |",
            check.manual.chunks, check.file_search.chunks
        ),
        format!(
            "| Total characters | {} | {} |",
            check.manual.total_chars, check.file_search.total_chars
        ),
        format!(
            "| Average size/chunk | {} chars | {} chars |",
            check.manual.average_chars(),
            check.file_search.average_chars()
        ),
        format!("\n**Character difference:** {}", signed(check.char_delta())),
        format!(
            "\n**Chunk count (diagnostic only):** {} ({})\n",
            verdict,
            signed(check.chunk_delta())
        ),
    ]
    .join("\n")
}

fn footer(generated_at: DateTime<Local>) -> String {
    format!(
        "---\n\n*Report generated automatically at {}*\n",
        generated_at.format(DATE_FORMAT)
    )
}

/// `+N` for positive values, `N` otherwise.
fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{}", value)
    } else {
        value.to_string()
    }
}

/// Keep free text from breaking a table row.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{CriterionScore, FailureReason, Scorecard};
    use crate::report::{Component, ComponentFailure};
    use chrono::TimeZone;

    fn uniform(score: u8) -> Evaluation {
        Evaluation::Success {
            scores: Scorecard::from_fn(|c| CriterionScore::new(score, format!("{} ok", c))).unwrap(),
            overall_assessment: Some(format!("all {}", score)),
        }
    }

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 20, hour, 0, 0).unwrap()
    }

    fn report() -> QuestionReport {
        QuestionReport {
            question_id: 1,
            question: "X?".to_string(),
            category: "constitutional".to_string(),
            timestamp: at(9),
            manual_rag: Some(
                PipelineRun::new("manual answer".into(), vec!["abcd".into(), "ef".into()], 2.345)
                    .with_evaluation(uniform(4)),
            ),
            file_search_rag: Some(
                PipelineRun::new("hosted answer".into(), vec!["abcdefgh".into()], 0.5)
                    .with_evaluation(uniform(5)),
            ),
            failures: vec![],
        }
    }

    fn position(doc: &str, needle: &str) -> usize {
        doc.find(needle).unwrap_or_else(|| panic!("missing {needle:?}"))
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let doc = render_markdown(&report(), at(10));

        let order = [
            "# Evaluation: Question 1",
            "## Question",
            "## Manual RAG",
            "## File Search RAG",
            "## Score Comparison",
            "## Chunk Analysis",
            "*Report generated automatically at 20/11/2025 10:00:00*",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(&doc, n)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{doc}");

        assert!(doc.contains("**Latency:** 2.35s") || doc.contains("**Latency:** 2.34s"));
        assert!(doc.contains("**Latency (TTFT):** 0.50s"));
        assert!(doc.contains("**Category:** constitutional"));
    }

    #[test]
    fn test_comparison_table_and_tally() {
        let doc = render_markdown(&report(), at(10));

        assert!(doc.contains("| Factual Consistency | 4/5 | 5/5 | +1 |"));
        assert_eq!(doc.matches("| +1 |").count(), 5);
        assert!(doc.contains("**Summary:** Manual RAG (0) | File Search RAG (5) | Ties (0)"));
        assert!(doc.contains("| Chunks sent | 2 | 1 |"));
        assert!(doc.contains("| Total characters | 6 | 8 |"));
        assert!(doc.contains("**Character difference:** +2"));
        assert!(doc.contains("**Chunk count (diagnostic only):** differs (-1)"));
    }

    #[test]
    fn test_rendering_is_stable_apart_from_footer() {
        let r = report();
        assert_eq!(render_markdown(&r, at(10)), render_markdown(&r, at(10)));

        let a = render_markdown(&r, at(10));
        let b = render_markdown(&r, at(11));
        let strip = |s: &str| s.rsplit_once("*Report generated").map(|(head, _)| head.to_string());
        assert_eq!(strip(&a), strip(&b));
    }

    #[test]
    fn test_missing_manual_run_omits_section_and_comparison() {
        let mut r = report();
        r.manual_rag = None;
        r.failures.push(ComponentFailure {
            component: Component::ManualRag,
            message: "retrieval failed".into(),
        });
        let doc = render_markdown(&r, at(10));

        assert!(!doc.contains("## Manual RAG"));
        assert!(doc.contains("## File Search RAG"));
        assert!(!doc.contains("## Score Comparison"));
        assert!(!doc.contains("## Chunk Analysis"));
    }

    #[test]
    fn test_judge_failure_omits_table_and_comparison() {
        let mut r = report();
        r.file_search_rag = r.file_search_rag.map(|run| {
            run.with_evaluation(Evaluation::failure(FailureReason::Exhausted, None))
        });
        let doc = render_markdown(&r, at(10));

        assert_eq!(doc.matches("### Judge Evaluation").count(), 1);
        assert!(doc.contains("**Judge evaluation failed:** all judge attempts failed"));
        assert!(!doc.contains("## Score Comparison"));
    }

    #[test]
    fn test_signed_and_table_cell() {
        assert_eq!(signed(3), "+3");
        assert_eq!(signed(0), "0");
        assert_eq!(signed(-2), "-2");
        assert_eq!(table_cell("a | b\nc"), "a \\| b c");
    }
}
