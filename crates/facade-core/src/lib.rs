//! # VCS Facade Core
//!
//! Domain types shared by every VCS Facade crate: the normalized
//! repository/ref/commit/pull-request model, deterministic document ids,
//! issue-key extraction and the error taxonomy.
//!
//! ## Example
//!
//! ```
//! use facade_core::{Repository, Ref, RefType};
//!
//! let repo = Repository::new(
//!     "gitea",
//!     "platform",
//!     "billing",
//!     "ssh://git@gitea.example.com/platform/billing.git",
//!     "https://gitea.example.com/platform/billing",
//! );
//! let branch = Ref::new(&repo.id, RefType::Branch, "main", "a1b2c3", "");
//! assert_eq!(branch.repository_id, repo.id);
//! ```

pub mod document;
pub mod error;
pub mod id;
pub mod issue;
pub mod model;

pub use document::Document;
pub use error::{FacadeError, Result};
pub use issue::{ISSUE_KEY_PATTERN, is_issue_key, issue_keys};
pub use model::{
    Commit, PullRequest, PullRequestReviewer, PullRequestStatus, Ref, RefType, Repository,
    RepositoryCoordinates, RepositoryInfo, User,
};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_defined() {
        assert!(!version().is_empty());
    }

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}
