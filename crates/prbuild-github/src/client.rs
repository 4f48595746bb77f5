//! GitHub API client for pull requests and commit statuses.

use prbuild_config::Credentials;
use prbuild_core::{BranchRef, ChangeRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{GitHubError, RepoSlug};

const USER_AGENT: &str = "prbuild";
const PAGE_SIZE: usize = 100;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    credentials: Credentials,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Deadline for each request, from connecting until the body is read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.api_url, path))
            .timeout(self.timeout)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");

        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::Basic { login, password } => builder.basic_auth(login, Some(password)),
            Credentials::Anonymous => builder,
        }
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, GitHubError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api { status, message });
        }

        Ok(response)
    }

    /// Get a repository; succeeds only if it is visible with our credentials.
    pub async fn get_repo(&self, slug: &RepoSlug) -> Result<GitHubRepo, GitHubError> {
        let path = format!("/repos/{}/{}", slug.owner, slug.name);
        Self::send(self.request(reqwest::Method::GET, &path))
            .await?
            .json()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))
    }

    /// List all open pull requests, following pagination.
    pub async fn list_open_pulls(&self, slug: &RepoSlug) -> Result<Vec<GitHubPull>, GitHubError> {
        let mut pulls = Vec::new();

        for page in 1.. {
            let path = format!(
                "/repos/{}/{}/pulls?state=open&sort=created&direction=asc&per_page={}&page={}",
                slug.owner, slug.name, PAGE_SIZE, page
            );
            let batch: Vec<GitHubPull> = Self::send(self.request(reqwest::Method::GET, &path))
                .await?
                .json()
                .await
                .map_err(|e| GitHubError::Parse(e.to_string()))?;

            let last_page = batch.len() < PAGE_SIZE;
            pulls.extend(batch);
            if last_page {
                break;
            }
        }

        Ok(pulls)
    }

    /// Create a commit status.
    pub async fn create_status(
        &self,
        slug: &RepoSlug,
        sha: &str,
        status: &StatusPayload,
    ) -> Result<(), GitHubError> {
        let path = format!("/repos/{}/{}/statuses/{}", slug.owner, slug.name, sha);
        Self::send(self.request(reqwest::Method::POST, &path).json(status)).await?;
        Ok(())
    }
}

/// GitHub repository information.
#[derive(Debug, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub full_name: String,
    pub private: bool,
    pub default_branch: String,
}

/// Pull request as returned by the pulls endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPull {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub html_url: Option<String>,
    pub head: GitHubPullRef,
    pub base: GitHubPullRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub label: String,
    pub sha: String,
}

impl From<GitHubPull> for ChangeRequest {
    fn from(pull: GitHubPull) -> Self {
        ChangeRequest {
            id: pull.id,
            number: pull.number,
            title: pull.title,
            head_sha: pull.head.sha,
            head: BranchRef::with_label(pull.head.ref_name, pull.head.label),
            base: BranchRef::with_label(pull.base.ref_name, pull.base.label),
            url: pull.html_url,
        }
    }
}

/// Commit status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

/// Body of a create-status request.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub state: CommitState,
    pub description: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}
