//! Owner/name extraction from repository references.

use std::fmt;
use std::str::FromStr;

use crate::GitHubError;

/// `owner/name` of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    fn from_path(path: &str, original: &str) -> Result<Self, GitHubError> {
        let mut parts = path
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty());

        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => {
                let name = name.strip_suffix(".git").unwrap_or(name);
                if name.is_empty() {
                    return Err(GitHubError::InvalidRepository(original.to_string()));
                }
                Ok(Self::new(owner, name))
            }
            _ => Err(GitHubError::InvalidRepository(original.to_string())),
        }
    }
}

impl FromStr for RepoSlug {
    type Err = GitHubError;

    /// Accepts `https://host/owner/name[.git]`, `git@host:owner/name[.git]`
    /// and bare `owner/name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("git@") {
            let (_, path) = rest
                .split_once(':')
                .ok_or_else(|| GitHubError::InvalidRepository(s.to_string()))?;
            return Self::from_path(path, s);
        }

        match url::Url::parse(s) {
            Ok(url) if url.has_host() => Self::from_path(url.path(), s),
            Ok(_) => Err(GitHubError::InvalidRepository(s.to_string())),
            Err(url::ParseError::RelativeUrlWithoutBase) => Self::from_path(s, s),
            Err(_) => Err(GitHubError::InvalidRepository(s.to_string())),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
