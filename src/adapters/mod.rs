pub mod github;
pub mod llm;
pub mod openai;

pub use github::{GitHubClient, HostClient};
pub use openai::OpenAIAdapter;
