use crate::adapters::github::{DraftComment, HostClient};
use crate::adapters::llm::{LLMAdapter, LLMRequest};
use crate::core::diff_parser::{DiffParser, FileChange};
use crate::core::event::TriggerEvent;
use crate::core::filter::filter_files;
use crate::core::prompt::{PrContext, PromptBuilder};
use crate::core::protocol;
use crate::core::review::{ReviewComment, ReviewSynthesizer};
use anyhow::Result;
use glob::Pattern;
use tracing::{debug, info};

/// Why a run ended the way it did. Logged at the end of every run so CI
/// output explains a missing review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The trigger action is not one we review.
    Skipped,
    /// The diff was empty or unobtainable.
    NoChanges,
    /// The pipeline ran but produced no comments; no review is created.
    NoFindings,
    /// A review with this many comments was submitted.
    Submitted(usize),
}

/// Sequences the whole diff-to-comment pipeline for one trigger event.
///
/// Owns its collaborators for the lifetime of the run; nothing here survives
/// process exit. Files are reviewed strictly sequentially, one batched LLM
/// call per file.
pub struct ReviewPipeline {
    host: Box<dyn HostClient>,
    llm: Box<dyn LLMAdapter>,
    exclude_globs: Vec<Pattern>,
}

impl ReviewPipeline {
    pub fn new(
        host: Box<dyn HostClient>,
        llm: Box<dyn LLMAdapter>,
        exclude_globs: Vec<Pattern>,
    ) -> Self {
        Self {
            host,
            llm,
            exclude_globs,
        }
    }

    pub async fn run(&self, event: &TriggerEvent) -> Result<RunOutcome> {
        // Unsupported actions exit before any API call is made.
        if event.action != "opened" && event.action != "synchronize" {
            info!("Unsupported trigger action '{}', nothing to do", event.action);
            return Ok(RunOutcome::Skipped);
        }

        let owner = event.owner();
        let repo = event.repo();

        let details = self.host.get_pull_request(owner, repo, event.number).await?;
        let pr = PrContext {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number: event.number,
            title: details.title,
            description: details.body.unwrap_or_default(),
        };

        let diff_content = match event.action.as_str() {
            "opened" => {
                self.host
                    .get_pull_request_diff(owner, repo, event.number)
                    .await?
            }
            // An update reviews only what changed between the two heads.
            _ => {
                self.host
                    .compare_revisions(owner, repo, &event.before, &event.after)
                    .await?
            }
        };

        if diff_content.trim().is_empty() {
            info!("No diff content for PR #{}, nothing to review", event.number);
            return Ok(RunOutcome::NoChanges);
        }

        let files = DiffParser::parse_unified_diff(&diff_content)?;
        info!("Parsed {} file diffs", files.len());
        let files = filter_files(files, &self.exclude_globs);

        let mut all_comments = Vec::new();
        for file in &files {
            let comments = self.review_file(file, &pr).await?;
            all_comments.extend(comments);
        }

        let ranked = ReviewSynthesizer::rank_and_cap(all_comments);
        if ranked.is_empty() {
            info!("No findings for PR #{}, no review submitted", event.number);
            return Ok(RunOutcome::NoFindings);
        }

        let drafts = strip_importance(&ranked);
        self.host
            .create_review(owner, repo, event.number, &drafts)
            .await?;
        info!(
            "Submitted review with {} comments on PR #{}",
            drafts.len(),
            event.number
        );

        Ok(RunOutcome::Submitted(drafts.len()))
    }

    /// Review one file: batch all its hunk prompts into a single LLM call and
    /// synthesize whatever the model sends back.
    async fn review_file(&self, file: &FileChange, pr: &PrContext) -> Result<Vec<ReviewComment>> {
        let user_prompt = file
            .hunks
            .iter()
            .map(|hunk| PromptBuilder::build_hunk_prompt(file, hunk, pr))
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(
            "Requesting review for {} from {}",
            file.path.display(),
            self.llm.model_name()
        );
        let response = self
            .llm
            .complete(LLMRequest {
                system_prompt: protocol::system_instruction(),
                user_prompt,
            })
            .await?;

        let findings = protocol::parse_findings(&response.content);
        debug!(
            "{} findings for {}",
            findings.len(),
            file.path.display()
        );

        Ok(ReviewSynthesizer::synthesize(file, findings))
    }
}

/// Importance drives ranking only; it is not part of the submission schema.
fn strip_importance(comments: &[ReviewComment]) -> Vec<DraftComment> {
    comments
        .iter()
        .map(|c| DraftComment {
            body: c.body.clone(),
            path: c.path.clone(),
            line: c.line,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::github::PullRequestInfo;
    use crate::adapters::llm::LLMResponse;
    use crate::core::review::ATTRIBUTION_PREFIX;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct MockHost {
        diff: String,
        calls: Mutex<Vec<String>>,
        submitted: Mutex<Option<Vec<DraftComment>>>,
    }

    impl MockHost {
        fn new(diff: &str) -> Self {
            Self {
                diff: diff.to_string(),
                calls: Mutex::new(Vec::new()),
                submitted: Mutex::new(None),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn submitted(&self) -> Option<Vec<DraftComment>> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HostClient for Arc<MockHost> {
        async fn get_pull_request(
            &self,
            _owner: &str,
            _repo: &str,
            _number: u64,
        ) -> Result<PullRequestInfo> {
            self.calls.lock().unwrap().push("get_pull_request".into());
            Ok(PullRequestInfo {
                title: "A title".into(),
                body: Some("A description".into()),
            })
        }

        async fn get_pull_request_diff(
            &self,
            _owner: &str,
            _repo: &str,
            _number: u64,
        ) -> Result<String> {
            self.calls.lock().unwrap().push("get_diff".into());
            Ok(self.diff.clone())
        }

        async fn compare_revisions(
            &self,
            _owner: &str,
            _repo: &str,
            _base: &str,
            _head: &str,
        ) -> Result<String> {
            self.calls.lock().unwrap().push("compare".into());
            Ok(self.diff.clone())
        }

        async fn create_review(
            &self,
            _owner: &str,
            _repo: &str,
            _number: u64,
            comments: &[DraftComment],
        ) -> Result<()> {
            self.calls.lock().unwrap().push("create_review".into());
            *self.submitted.lock().unwrap() = Some(comments.to_vec());
            Ok(())
        }
    }

    struct MockLlm {
        responses: Mutex<VecDeque<String>>,
        completions: Mutex<usize>,
    }

    impl MockLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
                completions: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl LLMAdapter for MockLlm {
        async fn complete(&self, _request: LLMRequest) -> Result<LLMResponse> {
            *self.completions.lock().unwrap() += 1;
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(LLMResponse {
                content,
                model: "mock".into(),
            })
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    #[async_trait]
    impl LLMAdapter for Arc<MockLlm> {
        async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
            self.as_ref().complete(request).await
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn event(action: &str) -> TriggerEvent {
        serde_json::from_value(serde_json::json!({
            "repository": {"owner": {"login": "octocat"}, "name": "hello"},
            "number": 1,
            "action": action,
            "before": "aaa",
            "after": "bbb",
        }))
        .unwrap()
    }

    fn one_file_diff() -> String {
        "--- /dev/null\n\
         +++ b/src/new.rs\n\
         @@ -0,0 +1,5 @@\n\
         +fn a() {}\n\
         +fn b() {}\n\
         +fn c() {}\n\
         +fn d() {}\n\
         +fn e() {}\n"
            .to_string()
    }

    fn pipeline(host: &Arc<MockHost>, llm: MockLlm) -> ReviewPipeline {
        ReviewPipeline::new(Box::new(Arc::clone(host)), Box::new(llm), Vec::new())
    }

    #[tokio::test]
    async fn single_finding_is_submitted_with_attribution() {
        let host = Arc::new(MockHost::new(&one_file_diff()));
        let llm = MockLlm::new(vec![
            r#"{"lineNumber":"5","reviewComment":"x","importance":3}"#,
        ]);
        let pipeline = pipeline(&host, llm);

        let outcome = pipeline.run(&event("opened")).await.unwrap();
        assert_eq!(outcome, RunOutcome::Submitted(1));

        let submitted = host.submitted().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].path, "src/new.rs");
        assert_eq!(submitted[0].line, 5);
        assert_eq!(submitted[0].body, format!("{}x", ATTRIBUTION_PREFIX));
    }

    #[tokio::test]
    async fn empty_llm_response_submits_nothing() {
        let host = Arc::new(MockHost::new(&one_file_diff()));
        let llm = MockLlm::new(vec![""]);
        let pipeline = pipeline(&host, llm);

        let outcome = pipeline.run(&event("opened")).await.unwrap();
        assert_eq!(outcome, RunOutcome::NoFindings);
        assert!(host.submitted().is_none());
    }

    #[tokio::test]
    async fn unsupported_action_makes_no_api_calls() {
        let host = Arc::new(MockHost::new(&one_file_diff()));
        let llm = MockLlm::new(vec![]);
        let pipeline = pipeline(&host, llm);

        let outcome = pipeline.run(&event("closed")).await.unwrap();
        assert_eq!(outcome, RunOutcome::Skipped);
        assert_eq!(host.call_count(), 0);
    }

    #[tokio::test]
    async fn synchronize_uses_revision_compare() {
        let host = Arc::new(MockHost::new(&one_file_diff()));
        let llm = MockLlm::new(vec![""]);
        let pipeline = pipeline(&host, llm);

        pipeline.run(&event("synchronize")).await.unwrap();

        let calls = host.calls.lock().unwrap().clone();
        assert!(calls.contains(&"compare".to_string()));
        assert!(!calls.contains(&"get_diff".to_string()));
    }

    #[tokio::test]
    async fn empty_diff_ends_run_without_review() {
        let host = Arc::new(MockHost::new(""));
        let llm = MockLlm::new(vec![]);
        let pipeline = pipeline(&host, llm);

        let outcome = pipeline.run(&event("opened")).await.unwrap();
        assert_eq!(outcome, RunOutcome::NoChanges);
        assert!(host.submitted().is_none());
    }

    #[tokio::test]
    async fn twenty_findings_across_three_files_cap_at_fifteen() {
        let mut diff = String::new();
        for file_idx in 0..3 {
            diff.push_str(&format!(
                "--- /dev/null\n+++ b/file{}.rs\n@@ -0,0 +1,10 @@\n",
                file_idx
            ));
            for line in 1..=10 {
                diff.push_str(&format!("+line {}\n", line));
            }
        }

        // Distinct importances 1..=20, spread over the three per-file batches.
        let batch = |range: std::ops::RangeInclusive<i64>| {
            range
                .map(|i| {
                    format!(
                        r#"{{"lineNumber":"{}","reviewComment":"c{}","importance":{}}}"#,
                        (i % 10) + 1,
                        i,
                        i
                    )
                })
                .collect::<Vec<_>>()
                .join(protocol::SEPARATOR)
        };
        let responses = [batch(1..=7), batch(8..=14), batch(15..=20)];
        let llm = MockLlm::new(responses.iter().map(String::as_str).collect());
        let host = Arc::new(MockHost::new(&diff));
        let pipeline = pipeline(&host, llm);

        let outcome = pipeline.run(&event("opened")).await.unwrap();
        assert_eq!(outcome, RunOutcome::Submitted(15));

        let submitted = host.submitted().unwrap();
        assert_eq!(submitted.len(), 15);
        // Top 15 of importances 1..=20 are 6..=20, highest first.
        assert_eq!(
            submitted[0].body,
            format!("{}c20", ATTRIBUTION_PREFIX)
        );
        assert_eq!(
            submitted[14].body,
            format!("{}c6", ATTRIBUTION_PREFIX)
        );
    }

    #[tokio::test]
    async fn malformed_batch_for_one_file_does_not_stop_others() {
        let diff = "\
--- /dev/null\n\
+++ b/good.rs\n\
@@ -0,0 +1,2 @@\n\
+fn g() {}\n\
+fn h() {}\n\
--- /dev/null\n\
+++ b/bad.rs\n\
@@ -0,0 +1,1 @@\n\
+fn b() {}\n";

        let llm = MockLlm::new(vec![
            r#"{"lineNumber":"2","reviewComment":"fine","importance":4}"#,
            "this is not the grammar",
        ]);
        let host = Arc::new(MockHost::new(diff));
        let pipeline = pipeline(&host, llm);

        let outcome = pipeline.run(&event("opened")).await.unwrap();
        assert_eq!(outcome, RunOutcome::Submitted(1));

        let submitted = host.submitted().unwrap();
        assert_eq!(submitted[0].path, "good.rs");
    }

    #[tokio::test]
    async fn excluded_files_are_never_sent_to_the_model() {
        let host = Arc::new(MockHost::new(&one_file_diff()));
        let llm = Arc::new(MockLlm::new(vec![]));
        let globs = vec![Pattern::new("src/*").unwrap()];
        let pipeline =
            ReviewPipeline::new(Box::new(Arc::clone(&host)), Box::new(Arc::clone(&llm)), globs);

        let outcome = pipeline.run(&event("opened")).await.unwrap();
        assert_eq!(outcome, RunOutcome::NoFindings);
        assert_eq!(*llm.completions.lock().unwrap(), 0);
    }
}
