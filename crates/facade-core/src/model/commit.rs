//! Commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::id::document_id;

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            avatar: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A commit in a repository's graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// `hash(repositoryId, hash)`.
    pub id: String,
    pub repository_id: String,
    /// Full commit hash.
    pub hash: String,
    pub message: String,
    /// Author timestamp.
    pub date: DateTime<Utc>,
    pub author: User,
    /// Hashes of the parent commits.
    pub parents: Vec<String>,
    pub link: String,
}

impl Commit {
    /// Creates a commit, deriving its id from the repository and hash.
    pub fn new(
        repository_id: impl Into<String>,
        hash: impl Into<String>,
        message: impl Into<String>,
        date: DateTime<Utc>,
        author: User,
        parents: Vec<String>,
        link: impl Into<String>,
    ) -> Self {
        let repository_id = repository_id.into();
        let hash = hash.into();
        Self {
            id: Self::id_for(&repository_id, &hash),
            repository_id,
            hash,
            message: message.into(),
            date,
            author,
            parents,
            link: link.into(),
        }
    }

    /// Computes the id of the commit with the given identity.
    pub fn id_for(repository_id: &str, hash: &str) -> String {
        document_id(&[repository_id, hash])
    }

    /// Returns true if `hash` is one of this commit's parents.
    pub fn has_parent(&self, hash: &str) -> bool {
        self.parents.iter().any(|p| p == hash)
    }
}

impl Document for Commit {
    const FAMILY: &'static str = "commit";

    fn id(&self) -> &str {
        &self.id
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }

    fn searchable_text(&self) -> Vec<&str> {
        vec![&self.message]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash: &str, parents: &[&str]) -> Commit {
        Commit::new(
            "repo",
            hash,
            "BILL-1 initial",
            Utc::now(),
            User::new("dev").with_email("dev@example.com"),
            parents.iter().map(|p| p.to_string()).collect(),
            "",
        )
    }

    #[test]
    fn test_id_is_repository_scoped() {
        assert_eq!(commit("abc", &[]).id, Commit::id_for("repo", "abc"));
        assert_ne!(Commit::id_for("repo", "abc"), Commit::id_for("other", "abc"));
    }

    #[test]
    fn test_has_parent() {
        let c = commit("c2", &["c1", "c0"]);
        assert!(c.has_parent("c0"));
        assert!(!c.has_parent("c2"));
    }

    #[test]
    fn test_serialization_field_names() {
        let json = serde_json::to_value(commit("abc", &["p"])).unwrap();
        assert_eq!(json["repositoryId"], "repo");
        assert_eq!(json["parents"][0], "p");
        assert_eq!(json["author"]["email"], "dev@example.com");
    }

    #[test]
    fn test_mentions_issue() {
        assert!(commit("abc", &[]).mentions_issue("BILL-1"));
    }
}
