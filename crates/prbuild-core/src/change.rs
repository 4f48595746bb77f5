//! Change requests (pull requests) and the repository they target.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Opaque reference to the repository under test, usually its clone URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct RepositoryRef(String);

impl RepositoryRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RepositoryRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One side of a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name, e.g. `feature/x`.
    pub name: String,
    /// Qualified label, e.g. `octocat:feature/x`.
    pub label: String,
}

impl BranchRef {
    /// A branch whose label is just its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
        }
    }

    pub fn with_label(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// An open pull/merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Stable identifier assigned by the hosting service.
    pub id: u64,
    /// Human-facing number (`#42`).
    pub number: u64,
    pub title: String,
    /// Branch being merged.
    pub head: BranchRef,
    /// Branch merged into.
    pub base: BranchRef,
    /// Commit the build runs against and the status is attached to.
    pub head_sha: String,
    /// Web URL of the request, if known.
    pub url: Option<String>,
}

impl ChangeRequest {
    pub fn new(
        number: u64,
        title: impl Into<String>,
        head: BranchRef,
        base: BranchRef,
        head_sha: impl Into<String>,
    ) -> Self {
        Self {
            id: number,
            number,
            title: title.into(),
            head,
            base,
            head_sha: head_sha.into(),
            url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_ref_defaults_label_to_name() {
        let branch = BranchRef::new("feature/x");
        assert_eq!(branch.name, "feature/x");
        assert_eq!(branch.label, "feature/x");
    }

    #[test]
    fn test_change_request_deserializes() {
        let json = r#"{
            "id": 991,
            "number": 7,
            "title": "Add widgets",
            "head": {"name": "feature/x", "label": "octo:feature/x"},
            "base": {"name": "main", "label": "octo:main"},
            "head_sha": "abc123",
            "url": null
        }"#;

        let request: ChangeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, 991);
        assert_eq!(request.head.label, "octo:feature/x");
        assert!(request.url.is_none());
    }

    #[test]
    fn test_repository_ref_display() {
        let repo = RepositoryRef::new("https://github.com/acme/widgets");
        assert_eq!(repo.to_string(), "https://github.com/acme/widgets");
    }
}
