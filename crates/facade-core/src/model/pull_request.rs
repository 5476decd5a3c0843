//! Pull requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::id::document_id;
use crate::model::commit::User;

/// Lifecycle status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
    Declined,
}

/// A reviewer and whether they approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestReviewer {
    pub user: User,
    pub approved: bool,
}

/// A pull (merge) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// `hash(repositoryId, index)`.
    pub id: String,
    pub repository_id: String,
    /// Provider-side number of the pull request.
    pub index: u64,
    pub title: String,
    pub description: String,
    pub author: User,
    /// Short name of the source branch.
    pub source: String,
    /// Short name of the target branch.
    pub target: String,
    pub assignees: Vec<User>,
    pub reviewers: Vec<PullRequestReviewer>,
    pub status: PullRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub link: String,
}

impl PullRequest {
    /// Computes the id of the pull request with the given identity.
    pub fn id_for(repository_id: &str, index: u64) -> String {
        document_id(&[repository_id, &index.to_string()])
    }

    /// Returns true once every reviewer approved and there is at least one.
    pub fn is_approved(&self) -> bool {
        !self.reviewers.is_empty() && self.reviewers.iter().all(|r| r.approved)
    }
}

impl Document for PullRequest {
    const FAMILY: &'static str = "pull_request";

    fn id(&self) -> &str {
        &self.id
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }

    fn searchable_text(&self) -> Vec<&str> {
        vec![&self.title, &self.description, &self.source]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_request(reviewers: Vec<PullRequestReviewer>) -> PullRequest {
        PullRequest {
            id: PullRequest::id_for("repo", 7),
            repository_id: "repo".to_string(),
            index: 7,
            title: "Rounding fix".to_string(),
            description: "Closes BILL-9".to_string(),
            author: User::new("dev"),
            source: "feature/rounding".to_string(),
            target: "main".to_string(),
            assignees: Vec::new(),
            reviewers,
            status: PullRequestStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            link: String::new(),
        }
    }

    #[test]
    fn test_id_uses_index() {
        assert_ne!(PullRequest::id_for("repo", 7), PullRequest::id_for("repo", 8));
    }

    #[test]
    fn test_is_approved() {
        assert!(!pull_request(Vec::new()).is_approved());
        let approved = PullRequestReviewer {
            user: User::new("a"),
            approved: true,
        };
        let pending = PullRequestReviewer {
            user: User::new("b"),
            approved: false,
        };
        assert!(pull_request(vec![approved.clone()]).is_approved());
        assert!(!pull_request(vec![approved, pending]).is_approved());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PullRequestStatus::Declined).unwrap();
        assert_eq!(json, "\"DECLINED\"");
    }

    #[test]
    fn test_mentions_issue_in_description() {
        assert!(pull_request(Vec::new()).mentions_issue("BILL-9"));
    }
}
