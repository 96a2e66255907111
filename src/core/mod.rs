pub mod diff_parser;
pub mod event;
pub mod filter;
pub mod pipeline;
pub mod prompt;
pub mod protocol;
pub mod review;

pub use diff_parser::{DiffParser, FileChange};
pub use event::{load_event, TriggerEvent};
pub use pipeline::{ReviewPipeline, RunOutcome};
pub use prompt::{PrContext, PromptBuilder};
pub use review::{ReviewComment, ReviewSynthesizer};
