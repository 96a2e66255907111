use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// The trigger payload delivered by the CI environment, one per run.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerEvent {
    pub repository: Repository,
    pub number: u64,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub owner: Owner,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

impl TriggerEvent {
    pub fn owner(&self) -> &str {
        &self.repository.owner.login
    }

    pub fn repo(&self) -> &str {
        &self.repository.name
    }
}

/// Read and decode the trigger event payload. Unreadable or undecodable
/// payloads are fatal for the run.
pub fn load_event(path: &Path) -> Result<TriggerEvent> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload at {}", path.display()))?;
    let event: TriggerEvent = serde_json::from_str(&content)
        .with_context(|| format!("Failed to decode event payload at {}", path.display()))?;
    Ok(event)
}
