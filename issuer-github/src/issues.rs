//! Repository issues over REST, plus sub-issue links over GraphQL

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::graphql::ADD_SUB_ISSUE_MUTATION;
use crate::http::HttpMethod;
use crate::{GitHubClient, Result};

/// An issue as returned by the REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub number: u64,
    pub node_id: String,
    pub title: String,
    /// `open` or `closed`
    pub state: String,
    pub html_url: String,
    /// Present when the entry is a pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<Value>,
}

impl RemoteIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub node_id: String,
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
}

impl GitHubClient {
    /// Create an issue in `owner/repo`
    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<RemoteIssue> {
        debug!(repo = %format!("{owner}/{repo}"), title, "Creating issue");

        let mut payload = json!({ "title": title, "body": body });
        if !labels.is_empty() {
            payload["labels"] = json!(labels);
        }

        self.request(
            HttpMethod::Post,
            &format!("/repos/{owner}/{repo}/issues"),
            Some(&payload),
        )
        .await
    }

    /// Every issue of `owner/repo`, open and closed
    ///
    /// Pull requests are included as the REST API returns them; see
    /// [`RemoteIssue::is_pull_request`].
    pub async fn list_issues(&self, owner: &str, repo: &str) -> Result<Vec<RemoteIssue>> {
        let mut issues = Vec::new();
        let mut page = 1;

        loop {
            let batch: Vec<RemoteIssue> = self
                .request(
                    HttpMethod::Get,
                    &format!("/repos/{owner}/{repo}/issues?state=all&per_page=100&page={page}"),
                    None,
                )
                .await?;
            if batch.is_empty() {
                break;
            }
            issues.extend(batch);
            page += 1;
        }

        debug!(repo = %format!("{owner}/{repo}"), count = issues.len(), "Listed issues");
        Ok(issues)
    }

    pub async fn close_issue(&self, owner: &str, repo: &str, number: u64) -> Result<RemoteIssue> {
        self.request(
            HttpMethod::Patch,
            &format!("/repos/{owner}/{repo}/issues/{number}"),
            Some(&json!({ "state": "closed" })),
        )
        .await
    }

    /// Fetch repository metadata; doubles as a connection and token check
    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository> {
        let repository: Repository = self
            .request(HttpMethod::Get, &format!("/repos/{owner}/{repo}"), None)
            .await?;
        info!(repo = %repository.full_name, "GitHub connection successful");
        Ok(repository)
    }

    /// Make `child` a sub-issue of `parent`, both given as node ids
    pub async fn add_sub_issue(&self, parent: &str, child: &str) -> Result<()> {
        let _: Value = self
            .graphql(
                ADD_SUB_ISSUE_MUTATION,
                json!({ "issue": parent, "sub": child }),
            )
            .await?;
        Ok(())
    }
}
