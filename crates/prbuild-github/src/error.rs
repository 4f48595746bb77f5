//! GitHub API errors.

use prbuild_core::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not a GitHub repository: {0}")]
    InvalidRepository(String),
}

impl GitHubError {
    /// Classify for the change request source.
    ///
    /// `fetching` selects the error reported for failures that are neither
    /// transport nor authorization problems.
    pub fn into_source_error(self, fetching: bool) -> SourceError {
        let message = self.to_string();
        match self {
            GitHubError::Api {
                status: 401 | 403, ..
            } => SourceError::Auth(message),
            GitHubError::Request(_) | GitHubError::InvalidRepository(_) => {
                SourceError::Connectivity(message)
            }
            GitHubError::Api { status: 404, .. } if !fetching => SourceError::Connectivity(message),
            _ if fetching => SourceError::Fetch(message),
            _ => SourceError::Connectivity(message),
        }
    }
}
