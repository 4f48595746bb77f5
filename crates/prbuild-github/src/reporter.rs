//! Commit status reporting.

use async_trait::async_trait;
use prbuild_core::{ChangeRequest, StatusReporter};
use tracing::{debug, warn};

use crate::client::{CommitState, StatusPayload};
use crate::{GitHubClient, RepoSlug};

/// Posts build state as a commit status on the request's head commit.
pub struct GitHubReporter {
    client: GitHubClient,
    slug: RepoSlug,
    context: String,
}

impl GitHubReporter {
    pub fn new(client: GitHubClient, slug: RepoSlug, context: impl Into<String>) -> Self {
        Self {
            client,
            slug,
            context: context.into(),
        }
    }

    pub(crate) fn payload(&self, state: CommitState) -> StatusPayload {
        let description = match state {
            CommitState::Pending => "Build pending",
            CommitState::Success => "Build succeeded",
            CommitState::Failure => "Build failed",
            CommitState::Error => "Build errored",
        };
        StatusPayload {
            state,
            description: description.to_string(),
            context: self.context.clone(),
            target_url: None,
        }
    }

    async fn report(&self, request: &ChangeRequest, state: CommitState) {
        let payload = self.payload(state);
        match self
            .client
            .create_status(&self.slug, &request.head_sha, &payload)
            .await
        {
            Ok(()) => debug!(pr = request.number, ?state, "Reported status"),
            Err(e) => warn!(pr = request.number, ?state, error = %e, "Failed to report status"),
        }
    }
}

#[async_trait]
impl StatusReporter for GitHubReporter {
    async fn report_pending(&self, request: &ChangeRequest) {
        self.report(request, CommitState::Pending).await;
    }

    async fn report_success(&self, request: &ChangeRequest) {
        self.report(request, CommitState::Success).await;
    }

    async fn report_failure(&self, request: &ChangeRequest) {
        self.report(request, CommitState::Failure).await;
    }
}
