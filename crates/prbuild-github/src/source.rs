//! Open pull requests as a change request source.

use async_trait::async_trait;
use prbuild_core::{ChangeRequest, ChangeRequestSource, SourceError};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::{GitHubClient, RepoSlug};

/// Head commits of the pull requests already handed out for building.
#[derive(Debug, Default)]
pub struct SeenHeads {
    heads: HashMap<u64, String>,
}

impl SeenHeads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only requests that are new or whose head moved, and remember them.
    ///
    /// Requests missing from `open` are forgotten, so a reopened request
    /// builds again.
    pub fn retain_unbuilt(&mut self, open: Vec<ChangeRequest>) -> Vec<ChangeRequest> {
        self.heads
            .retain(|number, _| open.iter().any(|r| r.number == *number));

        open.into_iter()
            .filter(|request| {
                let previous = self.heads.insert(request.number, request.head_sha.clone());
                previous.as_deref() != Some(request.head_sha.as_str())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

/// Change request source backed by the GitHub pulls API.
///
/// Lives for the whole process; its [`SeenHeads`] cache is never reset.
pub struct GitHubSource {
    client: GitHubClient,
    slug: RepoSlug,
    seen: SeenHeads,
}

impl GitHubSource {
    pub fn new(client: GitHubClient, slug: RepoSlug) -> Self {
        Self {
            client,
            slug,
            seen: SeenHeads::new(),
        }
    }

    pub fn slug(&self) -> &RepoSlug {
        &self.slug
    }
}

#[async_trait]
impl ChangeRequestSource for GitHubSource {
    async fn validate(&self) -> Result<(), SourceError> {
        let repo = self
            .client
            .get_repo(&self.slug)
            .await
            .map_err(|e| e.into_source_error(false))?;
        debug!(repo = %repo.full_name, private = repo.private, "Repository is reachable");
        Ok(())
    }

    async fn fetch(&mut self) -> Result<Vec<ChangeRequest>, SourceError> {
        let pulls = self
            .client
            .list_open_pulls(&self.slug)
            .await
            .map_err(|e| e.into_source_error(true))?;

        let open = pulls.len();
        let requests = self
            .seen
            .retain_unbuilt(pulls.into_iter().map(ChangeRequest::from).collect());

        info!(repo = %self.slug, open, to_build = requests.len(), "Fetched pull requests");
        Ok(requests)
    }
}
