mod adapters;
mod config;
mod core;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adapters::llm::ModelConfig;
use adapters::{GitHubClient, OpenAIAdapter};
use core::pipeline::{ReviewPipeline, RunOutcome};

/// Reviews one pull request trigger event and exits.
#[derive(Parser)]
#[command(name = "prscope")]
#[command(about = "LLM-backed pull request reviewer: diffs in, ranked inline comments out", long_about = None)]
#[command(version)]
struct Cli {
    /// LLM model identifier
    #[arg(long, default_value = "gpt-4o")]
    model: String,

    /// Comma-separated glob patterns for files to skip
    #[arg(long, default_value = "")]
    exclude: String,

    /// Trigger event payload path (defaults to GITHUB_EVENT_PATH)
    #[arg(long)]
    event_path: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::Config::resolve(cli.model, &cli.exclude, cli.event_path)?;
    let event = core::load_event(&config.event_path)?;
    info!(
        "Reviewing {}/{}#{} (action: {})",
        event.owner(),
        event.repo(),
        event.number,
        event.action
    );

    let host = GitHubClient::new(config.github_token.clone(), None)?;
    let llm = OpenAIAdapter::new(ModelConfig {
        model_name: config.model.clone(),
        api_key: Some(config.openai_api_key.clone()),
        ..ModelConfig::default()
    })?;

    let pipeline = ReviewPipeline::new(Box::new(host), Box::new(llm), config.exclude_globs);
    match pipeline.run(&event).await? {
        RunOutcome::Skipped => info!("Run skipped: unsupported trigger action"),
        RunOutcome::NoChanges => info!("Run finished: no diff to review"),
        RunOutcome::NoFindings => info!("Run finished: no findings, no review created"),
        RunOutcome::Submitted(n) => info!("Run finished: submitted {} comments", n),
    }

    Ok(())
}
