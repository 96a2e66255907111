use anyhow::{Context, Result};
use glob::Pattern;
use std::path::PathBuf;

use crate::core::filter::parse_exclude_globs;

/// Everything the run needs, resolved once at startup. Tokens come from the
/// environment; the rest from CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub openai_api_key: String,
    pub model: String,
    pub exclude_globs: Vec<Pattern>,
    pub event_path: PathBuf,
}

impl Config {
    pub fn resolve(model: String, exclude: &str, event_path: Option<PathBuf>) -> Result<Self> {
        let github_token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN not set. Export the host API token before running")?;
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY not set. Export the LLM API token before running")?;
        let event_path = match event_path {
            Some(path) => path,
            None => PathBuf::from(
                std::env::var("GITHUB_EVENT_PATH")
                    .context("No --event-path given and GITHUB_EVENT_PATH not set")?,
            ),
        };

        Ok(Self {
            github_token,
            openai_api_key,
            model,
            exclude_globs: parse_exclude_globs(exclude),
            event_path,
        })
    }
}
