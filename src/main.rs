//! RAG judge evaluation CLI
//!
//! Runs one question through both pipelines, grades the answers with an
//! LLM judge and writes a JSON + Markdown report.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_judge_eval::{
    config::Config,
    console::{ConsoleProgress, print_questions},
    judge::{JudgeExecutor, strip_code_fence},
    llm::{CompletionRequest, GeminiClient, LlmClient, ProviderRouter, ResponseMode},
    orchestrator::Evaluator,
    persistence::FileReportSink,
    pipeline::{FileSearchClient, ManualRag},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Compare a manual RAG pipeline against a hosted file-search pipeline with an LLM judge
#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one question from the configured set
    Evaluate {
        /// Question id
        id: u32,

        /// Run both pipelines but skip the judge
        #[arg(long)]
        skip_judge: bool,

        /// Path to the config file (JSON or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for the report artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List the configured questions
    List {
        /// Path to the config file (JSON or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that a model answers, in text and JSON mode
    TestProvider {
        /// Model id to test (defaults to the judge model)
        #[arg(short, long)]
        model: Option<String>,

        /// Path to the config file (JSON or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            id,
            skip_judge,
            config,
            output_dir,
        } => cmd_evaluate(id, skip_judge, config, output_dir).await,
        Commands::List { config } => cmd_list(config),
        Commands::TestProvider { model, config } => cmd_test_provider(model, config).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn cmd_evaluate(
    id: u32,
    skip_judge: bool,
    config_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());

    let router: Arc<dyn LlmClient> = Arc::new(ProviderRouter::from_config(&config.providers));

    let manual = ManualRag::open(
        &config.retrieval.corpus_dir,
        &config.dataset,
        router.clone(),
        config.retrieval.generation_model.clone(),
    );
    let file_search = FileSearchClient::new(
        GeminiClient::new(config.providers.gemini.clone()),
        config.file_search.model.clone(),
    );

    let evaluator = Evaluator::new(
        &config,
        Arc::new(manual),
        Arc::new(file_search),
        JudgeExecutor::new(router, &config.judge),
        Arc::new(FileReportSink::new(output_dir)),
    )
    .with_progress(Arc::new(ConsoleProgress));

    let start = Instant::now();
    let outcome = evaluator
        .evaluate_question(id, skip_judge)
        .await
        .with_context(|| format!("Failed to evaluate question {}", id))?;

    if !outcome.report.failures.is_empty() {
        println!(
            "\nCompleted with {} degraded component(s).",
            outcome.report.failures.len()
        );
    }
    println!("\nEvaluation finished in {:.2?}", start.elapsed());

    Ok(())
}

fn cmd_list(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    print_questions(&config.questions);
    Ok(())
}

async fn cmd_test_provider(model: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    println!("Testing provider connection...\n");

    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    let Some(model) = model.or_else(|| config.judge.model.clone()) else {
        anyhow::bail!("No model given. Pass --model or set judge.model / JUDGE_MODEL.");
    };

    let router = ProviderRouter::from_config(&config.providers);

    println!("Configuration:");
    println!("  Model:            {}", model);
    println!("  Default provider: {}", config.providers.default_provider);
    println!("  OpenAI key:       {}", mask(&config.providers.openai.api_key));
    println!("  Gemini key:       {}", mask(&config.providers.gemini.api_key));
    println!();

    if !router.supports(&model) {
        println!("Model '{}' does not resolve to a configured provider.", model);
        return Ok(());
    }

    println!("Sending text request...");
    let start = Instant::now();
    let basic = CompletionRequest::user(model.clone(), "Reply with exactly: OK");
    match router.complete(&basic).await {
        Ok(reply) => println!(
            "  Reply in {:.2?}: {}",
            start.elapsed(),
            reply.text.trim()
        ),
        Err(e) => println!("  Request failed: {}", e),
    }

    println!("Sending JSON-mode request...");
    let start = Instant::now();
    let json = CompletionRequest::user(
        model,
        r#"Reply with a JSON object of the form {"status": "ok"}."#,
    )
    .with_response_mode(ResponseMode::Json)
    .with_temperature(config.judge.temperature);
    match router.complete(&json).await {
        Ok(reply) => {
            let parsed =
                serde_json::from_str::<serde_json::Value>(strip_code_fence(&reply.text)).is_ok();
            println!(
                "  Reply in {:.2?}, valid JSON: {}",
                start.elapsed(),
                if parsed { "yes" } else { "no" }
            );
        }
        Err(e) => println!("  Request failed: {}", e),
    }

    Ok(())
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        "(not set)".to_string()
    } else {
        format!("{}...", key.chars().take(8).collect::<String>())
    }
}
