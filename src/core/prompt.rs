use crate::core::diff_parser::{ChangeKind, FileChange, Hunk};

/// Read-only pull request context threaded through prompt construction.
#[derive(Debug, Clone)]
pub struct PrContext {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub description: String,
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Build one self-contained review request for a single hunk.
    ///
    /// Each added/context line is prefixed with its resolved line number in
    /// the new file so the model can address comments without any line
    /// bookkeeping of its own. Removed lines keep their `-` marker but carry
    /// no number; they are not valid comment anchors.
    pub fn build_hunk_prompt(file: &FileChange, hunk: &Hunk, pr: &PrContext) -> String {
        format!(
            "Review the following code change in the file \"{path}\". Take the pull \
             request title and description into account, but comment only on the diff.\n\
             \n\
             Pull request title: {title}\n\
             \n\
             Pull request description:\n\
             ---\n\
             {description}\n\
             ---\n\
             \n\
             Diff to review:\n\
             \n\
             ```diff\n\
             {diff}\
             ```\n",
            path = file.path.display(),
            title = pr.title,
            description = pr.description,
            diff = Self::format_hunk(hunk),
        )
    }

    fn format_hunk(hunk: &Hunk) -> String {
        let mut output = String::new();
        output.push_str(&hunk.header);
        output.push('\n');

        for change in &hunk.changes {
            let marker = match change.kind {
                ChangeKind::Added => '+',
                ChangeKind::Removed => '-',
                ChangeKind::Context => ' ',
            };
            match change.new_line {
                Some(n) => output.push_str(&format!("{}. {}{}\n", n, marker, change.content)),
                None => output.push_str(&format!("{}{}\n", marker, change.content)),
            }
        }

        output
    }
}
