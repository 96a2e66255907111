use crate::core::diff_parser::FileChange;
use glob::Pattern;
use tracing::info;

/// Drop file changes that cannot or should not be reviewed.
///
/// Pure deletions have no new-file lines to anchor comments on, binary files
/// have no reviewable text, and anything matching an exclude glob is skipped
/// outright. Input order is preserved for everything retained.
pub fn filter_files(files: Vec<FileChange>, exclude_globs: &[Pattern]) -> Vec<FileChange> {
    files
        .into_iter()
        .filter(|file| {
            if file.is_deleted {
                info!("Skipping deleted file: {}", file.path.display());
                return false;
            }
            if file.is_binary || file.hunks.is_empty() {
                info!("Skipping non-text diff: {}", file.path.display());
                return false;
            }
            if is_excluded(file, exclude_globs) {
                info!("Skipping excluded file: {}", file.path.display());
                return false;
            }
            true
        })
        .collect()
}

fn is_excluded(file: &FileChange, exclude_globs: &[Pattern]) -> bool {
    let path = file.path.to_string_lossy();
    exclude_globs.iter().any(|glob| glob.matches(&path))
}

/// Parse a comma-separated exclude list into glob patterns, skipping blanks.
pub fn parse_exclude_globs(raw: &str) -> Vec<Pattern> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Pattern::new(s) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                tracing::warn!("Ignoring invalid exclude pattern '{}': {}", s, err);
                None
            }
        })
        .collect()
}
