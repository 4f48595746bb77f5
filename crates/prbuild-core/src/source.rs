//! Change request sources.

use async_trait::async_trait;
use thiserror::Error;

use crate::ChangeRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("repository unreachable: {0}")]
    Connectivity(String),

    #[error("not authorized: {0}")]
    Auth(String),

    #[error("fetch failed: {0}")]
    Fetch(String),
}

/// Supplies the open change requests of one repository.
///
/// Sources may keep state between calls (for example a cache of requests
/// already seen), hence `fetch` takes `&mut self`.
#[async_trait]
pub trait ChangeRequestSource: Send + Sync {
    /// Check that the repository is reachable with the configured credentials.
    async fn validate(&self) -> Result<(), SourceError>;

    /// Return the change requests that should be built now.
    async fn fetch(&mut self) -> Result<Vec<ChangeRequest>, SourceError>;
}
