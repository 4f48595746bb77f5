//! GitHub integration for prbuild.
//!
//! - [`GitHubClient`]: thin REST client for the few endpoints prbuild needs
//! - [`GitHubSource`]: open pull requests as [`prbuild_core::ChangeRequestSource`]
//! - [`GitHubReporter`]: commit statuses as [`prbuild_core::StatusReporter`]

pub mod client;
pub mod error;
pub mod reporter;
pub mod slug;
pub mod source;

pub use client::GitHubClient;
pub use error::GitHubError;
pub use reporter::GitHubReporter;
pub use slug::RepoSlug;
pub use source::GitHubSource;
