//! `opro` command-line driver.
//!
//! Thin plumbing over the application layer: runs the optimization loop
//! against a live OpenAI-compatible endpoint, scores ad-hoc instructions,
//! and lists stored sessions. Endpoint configuration comes from flags or
//! the `OPRO_API_BASE` / `OPRO_API_KEY` environment variables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opro_application::{BatchOutcome, OproUseCase};
use opro_core::meta_prompt::ranked_pool;
use opro_core::metrics::UsageMetrics;
use opro_core::session::{OproConfig, PromptState, SessionRepository};
use opro_engine::{OpenAiCompatClient, Scorer};
use opro_infrastructure::{TomlSessionRepository, load_questions};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "opro")]
#[command(about = "OPRO - optimize instruction prompts against a benchmark", long_about = None)]
struct Cli {
    /// API base URL (default: $OPRO_API_BASE, then https://api.openai.com)
    #[arg(long)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the optimization loop for a number of steps
    Run {
        /// Benchmark JSON file ([{"question": ..., "answer": ...}])
        #[arg(long)]
        benchmark: PathBuf,
        /// Session name
        #[arg(long, default_value = "opro run")]
        name: String,
        /// Number of optimization steps
        #[arg(long, default_value_t = 5)]
        steps: u32,
        /// Candidates requested per step (1-16)
        #[arg(long, default_value_t = 8)]
        k: u8,
        /// Top-scoring candidates shown to the proposer
        #[arg(long, default_value_t = 20)]
        top_x: usize,
        /// Prompts scored concurrently
        #[arg(long, default_value_t = 4)]
        batch_size: usize,
        #[arg(long, default_value = "gpt-4o")]
        optimizer_model: String,
        #[arg(long, default_value_t = 1.0)]
        optimizer_temperature: f32,
        #[arg(long, default_value = "gpt-4o-mini")]
        scorer_model: String,
        #[arg(long, default_value_t = 0.0)]
        scorer_temperature: f32,
    },
    /// Score one ad-hoc instruction against the benchmark
    Score {
        /// Instruction text to evaluate
        text: String,
        #[arg(long)]
        benchmark: PathBuf,
        #[arg(long, default_value = "gpt-4o-mini")]
        scorer_model: String,
        #[arg(long, default_value_t = 0.0)]
        scorer_temperature: f32,
    },
    /// List stored sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let metrics = UsageMetrics::shared();
    let client = build_client(cli.api_base, metrics.clone());

    match cli.command {
        Commands::Run {
            benchmark,
            name,
            steps,
            k,
            top_x,
            batch_size,
            optimizer_model,
            optimizer_temperature,
            scorer_model,
            scorer_temperature,
        } => {
            let config = OproConfig {
                k,
                top_x,
                optimizer_model,
                optimizer_temperature,
                scorer_model,
                scorer_temperature,
            };
            run_loop(client, benchmark, name, steps, batch_size, config, &metrics).await?;
        }
        Commands::Score {
            text,
            benchmark,
            scorer_model,
            scorer_temperature,
        } => {
            let questions = load_questions(&benchmark)?;
            let scorer = Scorer::new(Arc::new(client));
            let outcome = scorer
                .score(&text, &questions, scorer_temperature, &scorer_model)
                .await?;
            println!(
                "accuracy: {:.2}% ({}/{} correct, {} grading failures)",
                outcome.accuracy, outcome.correct, outcome.total, outcome.failed
            );
        }
        Commands::Sessions => {
            let repo = TomlSessionRepository::default_location()?;
            let sessions = repo.list_all().await?;
            if sessions.is_empty() {
                println!("no stored sessions");
            }
            for session in sessions {
                let best = ranked_pool(&session, 1)
                    .last()
                    .map(|(_, score)| format!("{score:.2}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  step {}  best {}",
                    session.id, session.name, session.current_step, best
                );
            }
        }
    }

    Ok(())
}

fn build_client(api_base: Option<String>, metrics: Arc<UsageMetrics>) -> OpenAiCompatClient {
    let base = api_base
        .or_else(|| env::var("OPRO_API_BASE").ok())
        .unwrap_or_else(|| "https://api.openai.com".to_string());
    let mut client = OpenAiCompatClient::new(base).with_metrics(metrics);
    if let Ok(key) = env::var("OPRO_API_KEY") {
        client = client.with_api_key(key);
    }
    client
}

async fn run_loop(
    client: OpenAiCompatClient,
    benchmark_path: PathBuf,
    name: String,
    steps: u32,
    batch_size: usize,
    config: OproConfig,
    metrics: &UsageMetrics,
) -> Result<()> {
    let benchmark = load_questions(&benchmark_path)
        .with_context(|| format!("loading benchmark from {}", benchmark_path.display()))?;
    let repository = Arc::new(TomlSessionRepository::default_location()?);
    let usecase = OproUseCase::new(repository, Arc::new(client), benchmark);

    let session = usecase.create_session(name, config).await?;
    println!("session {}", session.id);

    for step in 0..steps {
        let prompts = usecase.generate(&session.id).await?;
        println!("step {step}: generated {} candidates", prompts.len());

        loop {
            let reports = usecase.score_batch(&session.id, batch_size).await?;
            if reports.is_empty() {
                break;
            }
            if reports
                .iter()
                .all(|r| matches!(r.outcome, BatchOutcome::Failed(_)))
            {
                anyhow::bail!("every prompt in the batch failed to score; aborting run");
            }
            for report in &reports {
                match &report.outcome {
                    BatchOutcome::Scored(score) => {
                        println!("  {} -> {score:.2}", report.prompt_id)
                    }
                    BatchOutcome::Discarded => println!("  {} discarded", report.prompt_id),
                    BatchOutcome::Failed(err) => println!("  {} failed: {err}", report.prompt_id),
                }
            }
            // failed prompts were reverted to pending and will be picked
            // up by the next batch
            let current = usecase.get_session(&session.id).await?;
            if !current
                .current_step()
                .prompts
                .iter()
                .any(|p| p.state == PromptState::Pending)
            {
                break;
            }
        }

        let current = usecase.get_session(&session.id).await?;
        let best = ranked_pool(&current, 1);
        if let Some((text, score)) = best.last() {
            println!("step {step}: best so far {score:.2} - {text}");
        }

        if step + 1 < steps {
            usecase.advance(&session.id).await?;
        }
    }

    let usage = metrics.read();
    println!(
        "done: {} model calls, {} failures",
        usage.requests, usage.request_failures
    );
    Ok(())
}
