use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const JSON_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = "prscope";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// An inline comment in the shape the host's review API expects.
/// Importance is internal ranking state and never crosses this boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftComment {
    pub body: String,
    pub path: String,
    pub line: u64,
}

/// Source-control host API, as consumed by the pipeline.
#[async_trait]
pub trait HostClient: Send + Sync {
    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestInfo>;

    async fn get_pull_request_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String>;

    async fn compare_revisions(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<String>;

    async fn create_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        comments: &[DraftComment],
    ) -> Result<()>;
}

pub struct GitHubClient {
    client: Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            token,
            base_url: base_url.unwrap_or_else(|| "https://api.github.com".to_string()),
        })
    }

    fn get(&self, url: String, accept: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Accept", accept)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
    }

    async fn fetch_text(&self, url: String, accept: &str, what: &str) -> Result<String> {
        let response = self
            .get(url, accept)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error {} fetching {}: {}", status, what, body);
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response", what))
    }
}

#[async_trait]
impl HostClient for GitHubClient {
    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestInfo> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.base_url);
        let body = self.fetch_text(url, JSON_MEDIA_TYPE, "pull request").await?;
        serde_json::from_str(&body).context("Failed to decode pull request")
    }

    async fn get_pull_request_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.base_url);
        self.fetch_text(url, DIFF_MEDIA_TYPE, "pull request diff")
            .await
    }

    async fn compare_revisions(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/repos/{owner}/{repo}/compare/{base}...{head}",
            self.base_url
        );
        self.fetch_text(url, DIFF_MEDIA_TYPE, "revision comparison")
            .await
    }

    async fn create_review(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        comments: &[DraftComment],
    ) -> Result<()> {
        let url = format!(
            "{}/repos/{owner}/{repo}/pulls/{number}/reviews",
            self.base_url
        );
        let body = serde_json::json!({
            "event": "COMMENT",
            "comments": comments,
        });

        let response = self
            .client
            .post(url)
            .header("Accept", JSON_MEDIA_TYPE)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .context("Failed to submit review")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error {} submitting review: {}", status, body);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> GitHubClient {
        GitHubClient::new("test-token".to_string(), Some(server.url())).unwrap()
    }

    #[tokio::test]
    async fn fetches_pull_request_title_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octocat/hello/pulls/7")
            .match_header("accept", JSON_MEDIA_TYPE)
            .with_status(200)
            .with_body(r#"{"title": "Fix things", "body": "A description"}"#)
            .create_async()
            .await;

        let pr = client_for(&server)
            .get_pull_request("octocat", "hello", 7)
            .await
            .unwrap();

        assert_eq!(pr.title, "Fix things");
        assert_eq!(pr.body.as_deref(), Some("A description"));
    }

    #[tokio::test]
    async fn null_body_decodes_to_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/pulls/1")
            .with_status(200)
            .with_body(r#"{"title": "t", "body": null}"#)
            .create_async()
            .await;

        let pr = client_for(&server)
            .get_pull_request("o", "r", 1)
            .await
            .unwrap();
        assert!(pr.body.is_none());
    }

    #[tokio::test]
    async fn diff_is_fetched_with_diff_media_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/pulls/3")
            .match_header("accept", DIFF_MEDIA_TYPE)
            .with_status(200)
            .with_body("diff --git a/x b/x\n")
            .create_async()
            .await;

        let diff = client_for(&server)
            .get_pull_request_diff("o", "r", 3)
            .await
            .unwrap();

        assert!(diff.starts_with("diff --git"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn compare_hits_three_dot_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/compare/aaa...bbb")
            .with_status(200)
            .with_body("diff text")
            .create_async()
            .await;

        let diff = client_for(&server)
            .compare_revisions("o", "r", "aaa", "bbb")
            .await
            .unwrap();

        assert_eq!(diff, "diff text");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_review_posts_comment_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/o/r/pulls/5/reviews")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "event": "COMMENT",
                "comments": [{"body": "b", "path": "p.rs", "line": 4}],
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client_for(&server)
            .create_review(
                "o",
                "r",
                5,
                &[DraftComment {
                    body: "b".into(),
                    path: "p.rs".into(),
                    line: 4,
                }],
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_failure_propagates_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/pulls/9")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let result = client_for(&server).get_pull_request_diff("o", "r", 9).await;
        assert!(result.is_err());
    }
}
