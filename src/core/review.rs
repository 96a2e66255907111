use crate::core::diff_parser::FileChange;
use crate::core::protocol::ReviewFinding;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard cap on comments submitted in one review.
pub const MAX_REVIEW_COMMENTS: usize = 15;

/// Marker prepended to every comment body so readers can tell the comment
/// was machine-generated.
pub const ATTRIBUTION_PREFIX: &str = "\u{1f916} prscope: ";

/// A validated inline comment, ready for submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub path: String,
    pub line: u64,
    pub body: String,
    pub importance: i64,
}

pub struct ReviewSynthesizer;

impl ReviewSynthesizer {
    /// Turn raw findings for one file into submittable comments.
    ///
    /// A finding whose line number does not coerce to an integer is dropped
    /// on its own; its siblings are still kept. Importance is taken as the
    /// model gave it, with absent/zero values defaulting to 1 - there is no
    /// clamping to the documented 1-20 range.
    pub fn synthesize(file: &FileChange, findings: Vec<ReviewFinding>) -> Vec<ReviewComment> {
        let path = file.path.to_string_lossy().into_owned();

        findings
            .into_iter()
            .filter_map(|finding| {
                // Comment lines are 1-based; zero is as unanchorable as text.
                let line = match finding.line_number.trim().parse::<u64>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        warn!(
                            "Dropping finding for {} with invalid line '{}'",
                            path, finding.line_number
                        );
                        return None;
                    }
                };
                let importance = if finding.importance == 0 {
                    1
                } else {
                    finding.importance
                };
                Some(ReviewComment {
                    path: path.clone(),
                    line,
                    body: format!("{}{}", ATTRIBUTION_PREFIX, finding.review_comment),
                    importance,
                })
            })
            .collect()
    }

    /// Rank the aggregated comment set by importance (descending, stable on
    /// ties) and keep only the top [`MAX_REVIEW_COMMENTS`].
    pub fn rank_and_cap(mut comments: Vec<ReviewComment>) -> Vec<ReviewComment> {
        comments.sort_by(|a, b| b.importance.cmp(&a.importance));
        comments.truncate(MAX_REVIEW_COMMENTS);
        comments
    }
}
