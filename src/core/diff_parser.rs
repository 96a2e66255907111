use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file's worth of changes, as parsed from a unified diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub is_deleted: bool,
    pub is_binary: bool,
    pub hunks: Vec<Hunk>,
}

/// A contiguous changed region of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    pub header: String,
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub changes: Vec<ChangeLine>,
}

/// A single diff line. `new_line` is the line's position in the post-change
/// file; it is the only valid anchor for review comments and is `None` for
/// removed lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLine {
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
    pub kind: ChangeKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Context,
}

pub struct DiffParser;

impl DiffParser {
    /// Parse raw unified-diff text into per-file change records.
    ///
    /// Handles both `diff --git` style and bare `---`/`+++` style diffs.
    /// A malformed hunk header is a fatal error; there is no partial recovery.
    pub fn parse_unified_diff(diff_content: &str) -> Result<Vec<FileChange>> {
        let mut files = Vec::new();
        let lines: Vec<&str> = diff_content.lines().collect();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].starts_with("diff --git") {
                let file = Self::parse_git_file_diff(&lines, &mut i)?;
                files.push(file);
            } else if lines[i].starts_with("--- ")
                && i + 1 < lines.len()
                && lines[i + 1].starts_with("+++ ")
            {
                let file = Self::parse_bare_file_diff(&lines, &mut i)?;
                files.push(file);
            } else {
                i += 1;
            }
        }

        Ok(files)
    }

    fn parse_git_file_diff(lines: &[&str], i: &mut usize) -> Result<FileChange> {
        let file_path = Self::extract_file_path(lines[*i])?;
        *i += 1;

        let mut is_binary = false;
        let mut is_deleted = false;
        while *i < lines.len()
            && !lines[*i].starts_with("@@")
            && !lines[*i].starts_with("diff --git")
        {
            if lines[*i].starts_with("Binary files") || lines[*i].starts_with("GIT binary patch") {
                is_binary = true;
            }
            if lines[*i].starts_with("deleted file mode") || lines[*i].starts_with("+++ /dev/null")
            {
                is_deleted = true;
            }
            *i += 1;
        }

        let mut hunks = Vec::new();
        while *i < lines.len() && lines[*i].starts_with("@@") {
            hunks.push(Self::parse_hunk(lines, i)?);
        }

        Ok(FileChange {
            path: PathBuf::from(file_path),
            is_deleted,
            is_binary,
            hunks,
        })
    }

    fn parse_bare_file_diff(lines: &[&str], i: &mut usize) -> Result<FileChange> {
        let old_line = lines[*i];
        let new_line = lines.get(*i + 1).unwrap_or(&"");

        let old_path = Self::extract_path_from_header(old_line, "--- ")?;
        let new_path = Self::extract_path_from_header(new_line, "+++ ")?;

        let is_deleted = new_path == "/dev/null";
        let file_path = if is_deleted { old_path } else { new_path };

        *i += 2;

        let mut hunks = Vec::new();
        let mut is_binary = false;

        while *i < lines.len()
            && !lines[*i].starts_with("diff --git")
            && !(lines[*i].starts_with("--- ")
                && *i + 1 < lines.len()
                && lines[*i + 1].starts_with("+++ "))
        {
            if lines[*i].starts_with("Binary files") || lines[*i].starts_with("GIT binary patch") {
                is_binary = true;
            }
            if lines[*i].starts_with("@@") {
                hunks.push(Self::parse_hunk(lines, i)?);
            } else {
                *i += 1;
            }
        }

        Ok(FileChange {
            path: PathBuf::from(file_path),
            is_deleted,
            is_binary,
            hunks,
        })
    }

    fn extract_file_path(line: &str) -> Result<String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            Ok(parts[3].trim_start_matches("b/").to_string())
        } else {
            anyhow::bail!("Invalid diff header: {}", line)
        }
    }

    fn extract_path_from_header(line: &str, prefix: &str) -> Result<String> {
        let raw = line
            .strip_prefix(prefix)
            .ok_or_else(|| anyhow::anyhow!("Invalid file header: {}", line))?
            .trim();
        let path = raw.split_whitespace().next().unwrap_or(raw);
        Ok(path
            .trim_start_matches("a/")
            .trim_start_matches("b/")
            .to_string())
    }

    fn parse_hunk(lines: &[&str], i: &mut usize) -> Result<Hunk> {
        let header = lines[*i];
        let (old_start, old_lines, new_start, new_lines) = Self::parse_hunk_header(header)?;
        *i += 1;

        let mut changes = Vec::new();
        let mut old_line = old_start;
        let mut new_line = new_start;

        while *i < lines.len()
            && !lines[*i].starts_with("@@")
            && !lines[*i].starts_with("diff --git")
            && !lines[*i].starts_with("--- ")
            && !lines[*i].starts_with("+++ ")
        {
            let line = lines[*i];
            if line.is_empty() {
                *i += 1;
                continue;
            }

            // "\ No newline at end of file" is metadata, not file content;
            // counting it would shift every later line number in the hunk.
            if line.starts_with('\\') {
                *i += 1;
                continue;
            }

            let (kind, content) = match line.chars().next() {
                Some('+') => (ChangeKind::Added, &line[1..]),
                Some('-') => (ChangeKind::Removed, &line[1..]),
                Some(' ') => (ChangeKind::Context, &line[1..]),
                _ => (ChangeKind::Context, line),
            };

            let change = match kind {
                ChangeKind::Added => {
                    let line_no = new_line;
                    new_line += 1;
                    ChangeLine {
                        old_line: None,
                        new_line: Some(line_no),
                        kind,
                        content: content.to_string(),
                    }
                }
                ChangeKind::Removed => {
                    let line_no = old_line;
                    old_line += 1;
                    ChangeLine {
                        old_line: Some(line_no),
                        new_line: None,
                        kind,
                        content: content.to_string(),
                    }
                }
                ChangeKind::Context => {
                    let old_no = old_line;
                    let new_no = new_line;
                    old_line += 1;
                    new_line += 1;
                    ChangeLine {
                        old_line: Some(old_no),
                        new_line: Some(new_no),
                        kind,
                        content: content.to_string(),
                    }
                }
            };

            changes.push(change);
            *i += 1;
        }

        Ok(Hunk {
            header: header.to_string(),
            old_start,
            old_lines,
            new_start,
            new_lines,
            changes,
        })
    }

    fn parse_hunk_header(header: &str) -> Result<(usize, usize, usize, usize)> {
        let re = regex::Regex::new(r"@@ -(\d+),?(\d*) \+(\d+),?(\d*) @@")?;
        let caps = re
            .captures(header)
            .ok_or_else(|| anyhow::anyhow!("Invalid hunk header: {}", header))?;

        let old_start = caps.get(1).unwrap().as_str().parse()?;
        let old_lines = caps.get(2).map_or(1, |m| m.as_str().parse().unwrap_or(1));
        let new_start = caps.get(3).unwrap().as_str().parse()?;
        let new_lines = caps.get(4).map_or(1, |m| m.as_str().parse().unwrap_or(1));

        Ok((old_start, old_lines, new_start, new_lines))
    }
}
