//! Branch and tag references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::id::document_id;

/// Kind of a named reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    /// A branch reference (e.g., "main", "develop").
    Branch,
    /// A tag reference (e.g., "v1.0.0").
    Tag,
}

impl RefType {
    /// Returns the full Git reference prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Branch => "refs/heads/",
            Self::Tag => "refs/tags/",
        }
    }

    /// Returns the full Git reference path for `name`.
    pub fn full_ref(self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Splits a full Git reference into its type and short name.
    ///
    /// Returns `None` for anything that is neither `refs/heads/*` nor
    /// `refs/tags/*`.
    pub fn parse_full(full_ref: &str) -> Option<(Self, &str)> {
        let full_ref = full_ref.trim();
        if let Some(name) = full_ref.strip_prefix("refs/heads/") {
            return Some((Self::Branch, name));
        }
        if let Some(name) = full_ref.strip_prefix("refs/tags/") {
            return Some((Self::Tag, name));
        }
        None
    }

    /// Parses provider spellings such as `branch`, `BRANCH` or `tag`.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "branch" | "branches" | "heads" => Some(Self::Branch),
            "tag" | "tags" => Some(Self::Tag),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "BRANCH",
            Self::Tag => "TAG",
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named pointer into a repository's commit graph.
///
/// Equality covers identity, target hash and link, which is what
/// reconciliation compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    /// `hash(repositoryId, type, name)`.
    pub id: String,
    pub repository_id: String,
    #[serde(rename = "type")]
    pub ref_type: RefType,
    pub name: String,
    /// Hash of the commit the reference points to.
    pub commit_id: String,
    pub link: String,
}

impl Ref {
    /// Creates a reference, deriving its id from the identifying fields.
    pub fn new(
        repository_id: impl Into<String>,
        ref_type: RefType,
        name: impl Into<String>,
        commit_id: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        let repository_id = repository_id.into();
        let name = name.into();
        Self {
            id: Self::id_for(&repository_id, ref_type, &name),
            repository_id,
            ref_type,
            name,
            commit_id: commit_id.into(),
            link: link.into(),
        }
    }

    /// Computes the id of the reference with the given identity.
    pub fn id_for(repository_id: &str, ref_type: RefType, name: &str) -> String {
        document_id(&[repository_id, ref_type.as_str(), name])
    }

    /// Returns true if this is a branch reference.
    pub fn is_branch(&self) -> bool {
        self.ref_type == RefType::Branch
    }

    /// Returns true if this is a tag reference.
    pub fn is_tag(&self) -> bool {
        self.ref_type == RefType::Tag
    }
}

impl Document for Ref {
    const FAMILY: &'static str = "ref";

    fn id(&self) -> &str {
        &self.id
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }

    fn searchable_text(&self) -> Vec<&str> {
        vec![&self.name]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        assert_eq!(
            RefType::parse_full("refs/heads/feature/test"),
            Some((RefType::Branch, "feature/test"))
        );
        assert_eq!(
            RefType::parse_full("refs/tags/v1.0.0"),
            Some((RefType::Tag, "v1.0.0"))
        );
        assert_eq!(RefType::parse_full("refs/pull/1/head"), None);
        assert_eq!(RefType::parse_full("main"), None);
    }

    #[test]
    fn test_full_ref() {
        assert_eq!(RefType::Branch.full_ref("main"), "refs/heads/main");
        assert_eq!(RefType::Tag.full_ref("v1.0.0"), "refs/tags/v1.0.0");
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(RefType::from_kind("BRANCH"), Some(RefType::Branch));
        assert_eq!(RefType::from_kind("tag"), Some(RefType::Tag));
        assert_eq!(RefType::from_kind("repository"), None);
    }

    #[test]
    fn test_id_ignores_target() {
        let a = Ref::new("repo", RefType::Branch, "main", "aaa", "link-a");
        let b = Ref::new("repo", RefType::Branch, "main", "bbb", "link-b");
        assert_eq!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn test_branch_and_tag_with_same_name_differ() {
        let branch = Ref::new("repo", RefType::Branch, "v1", "aaa", "");
        let tag = Ref::new("repo", RefType::Tag, "v1", "aaa", "");
        assert_ne!(branch.id, tag.id);
        assert!(branch.is_branch());
        assert!(tag.is_tag());
    }

    #[test]
    fn test_mentions_issue() {
        let branch = Ref::new("repo", RefType::Branch, "feature/BILL-12", "aaa", "");
        assert!(branch.mentions_issue("BILL-12"));
        assert!(!branch.mentions_issue("BILL-1"));
    }
}
