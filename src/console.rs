//! Console output for interactive runs.
//!
//! [`ConsoleProgress`] prints each step of an evaluation to stdout as it
//! happens. Logs go to stderr through `tracing`, so the two never mix.

use crate::compare::{ChunkVolume, ChunkVolumeCheck, ScoreComparison, Winner};
use crate::config::Question;
use crate::judge::{Evaluation, EvaluationRequest};
use crate::llm::{MAX_JUDGE_CHUNKS, count_chunks};
use crate::orchestrator::Progress;
use crate::persistence::ArtifactPaths;
use crate::pipeline::PipelineRun;
use crate::report::{Component, ComponentFailure};
use std::time::Duration;

const WIDE: usize = 80;
const PREVIEW_CHARS: usize = 200;

/// First [`PREVIEW_CHARS`] characters of a chunk on one line.
pub fn preview(chunk: &str) -> String {
    chunk
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn rule(ch: char) -> String {
    ch.to_string().repeat(WIDE)
}

pub fn print_question_header(question: &Question) {
    println!("\n{}", rule('='));
    println!("Evaluating question {}", question.id);
    println!("{}", rule('='));
    println!("Category: {}", question.category);
    println!("Question: {}", question.question);
    println!("{}\n", rule('='));
}

pub fn print_pipeline_header(component: Component) {
    println!("\n{}", component.label().to_uppercase());
    println!("{}", rule('-'));
}

pub fn print_pipeline_result(component: Component, run: &PipelineRun) {
    let ttft = if component == Component::FileSearchRag {
        " (TTFT)"
    } else {
        ""
    };
    println!("Answer generated in {:.2}s{}", run.latency_seconds, ttft);
    println!("Chunks retrieved: {}", run.num_chunks);
    if let Some(reported) = run.grounding_chunks {
        println!("Grounding chunks reported: {}", reported);
    }
    println!("\nAnswer:\n{}\n", run.answer);
}

pub fn print_chunk_analysis(component: Component, context: &[String]) {
    println!("\nChunks - {}:", component.label());
    println!("{}", rule('-'));

    for (i, chunk) in context.iter().take(MAX_JUDGE_CHUNKS).enumerate() {
        println!("Chunk {}:", i + 1);
        println!("  Size:    {} chars", chunk.chars().count());
        println!("  Preview: {}...", preview(chunk));
        println!();
    }
}

pub fn print_judge_info(request: &EvaluationRequest) {
    let context = request.joined_context();
    println!("Characters sent to judge: {}", context.chars().count());
    println!("Chunks sent to judge: {}\n", count_chunks(&context));
}

pub fn print_evaluation(component: Component, evaluation: &Evaluation) {
    let Some(scores) = evaluation.scorecard() else {
        println!(
            "\nJudge evaluation failed for {}: {}",
            component.label(),
            evaluation.error().unwrap_or_default()
        );
        return;
    };

    println!("\nJudge evaluation ({}):", component.label());
    for (criterion, entry) in scores.iter() {
        println!("  {}: {}/5 - {}", criterion.key(), entry.score, entry.justification);
    }
}

pub fn print_comparison(comparison: &ScoreComparison) {
    println!("\n{}", rule('='));
    println!("SCORE COMPARISON");
    println!("{}", rule('='));

    println!(
        "\n{:<25} {:<10} {:<15} Difference",
        "Criterion", "Manual", "File Search"
    );
    println!("{}", rule('-'));
    for delta in &comparison.deltas {
        let marker = match delta.winner() {
            Winner::Manual => " <",
            Winner::FileSearch => " >",
            Winner::Tie => "",
        };
        println!(
            "{:<25} {:<10} {:<15} {:+}{}",
            delta.criterion.key(),
            format!("{}/5", delta.manual_score),
            format!("{}/5", delta.file_search_score),
            delta.difference,
            marker
        );
    }

    let tally = comparison.tally();
    println!(
        "\nWins: manual {} | file search {} | ties {}",
        tally.manual_wins, tally.file_search_wins, tally.ties
    );
}

fn print_volume(label: &str, volume: &ChunkVolume) {
    println!("\n{}:", label);
    println!("  Chunks sent to judge: {}", volume.chunks);
    println!("  Total characters:     {}", volume.total_chars);
    println!("  Average per chunk:    {} chars", volume.average_chars());
}

pub fn print_chunk_volume(check: &ChunkVolumeCheck) {
    println!("\n{}", rule('='));
    println!("CHUNK VOLUME (diagnostic)");
    println!("{}", rule('='));

    print_volume(Component::ManualRag.label(), &check.manual);
    print_volume(Component::FileSearchRag.label(), &check.file_search);

    println!("\nDifference:");
    println!("  Chunks:     {:+}", check.chunk_delta());
    println!("  Characters: {:+}", check.char_delta());
    let verdict = if check.counts_match() {
        "consistent"
    } else {
        "differs (retrieval strategies are independent; informational only)"
    };
    println!("  Chunk count: {}", verdict);
}

pub fn print_wait(delay: Duration, reason: &str) {
    println!("\nWaiting {}s {}...", delay.as_secs(), reason);
}

pub fn print_error(failure: &ComponentFailure) {
    println!("Error in {}: {}", failure.component.label(), failure.message);
}

pub fn print_saved(paths: &ArtifactPaths) {
    println!("\nReport saved:");
    println!("  JSON:     {}", paths.json.display());
    println!("  Markdown: {}", paths.markdown.display());
}

pub fn print_questions(questions: &[Question]) {
    println!("\n{}", rule('='));
    println!("AVAILABLE QUESTIONS");
    println!("{}\n", rule('='));

    for q in questions {
        println!("[{}] Category: {}", q.id, q.category);
        println!("    Question: {}", q.question);
        println!();
    }
}

/// Prints evaluation progress to stdout.
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn question_started(&self, question: &Question) {
        print_question_header(question);
    }

    fn pipeline_started(&self, component: Component) {
        print_pipeline_header(component);
    }

    fn pipeline_finished(&self, component: Component, run: &PipelineRun) {
        print_pipeline_result(component, run);
        print_chunk_analysis(component, &run.context);
    }

    fn judge_started(&self, request: &EvaluationRequest) {
        print_judge_info(request);
    }

    fn judge_finished(&self, component: Component, evaluation: &Evaluation) {
        print_evaluation(component, evaluation);
    }

    fn waiting(&self, delay: Duration, reason: &str) {
        print_wait(delay, reason);
    }

    fn component_failed(&self, failure: &ComponentFailure) {
        print_error(failure);
    }

    fn compared(&self, comparison: &ScoreComparison, chunks: &ChunkVolumeCheck) {
        print_comparison(comparison);
        print_chunk_volume(chunks);
    }

    fn persisted(&self, paths: &ArtifactPaths) {
        print_saved(paths);
    }
}
