//! Backend adapter trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use facade_core::{
    Commit, FacadeError, PullRequest, PullRequestReviewer, Ref, RefType, Repository,
    RepositoryCoordinates, Result,
};

use crate::range::{RangeStart, RangeStrategy};
use crate::webhook::{WebhookEvent, WebhookHeaders};

/// Provider family of a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Bitbucket,
    Gitea,
    Gitlab,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bitbucket => f.write_str("bitbucket"),
            Self::Gitea => f.write_str("gitea"),
            Self::Gitlab => f.write_str("gitlab"),
        }
    }
}

/// Parameters of a pull request to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPullRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A client for one VCS backend instance.
///
/// Adapters translate these generic operations into provider calls and map
/// every provider failure into [`FacadeError`]: a missing entity becomes
/// `NotFound`, anything else `Unexpected`.
///
/// # Implementors
///
/// - `BitbucketClient` - Bitbucket Server REST API 1.0
/// - `GiteaClient` - Gitea API v1 (no native range query)
/// - `GitlabClient` - GitLab API v4
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Id of the backend instance, stamped on every repository it returns.
    fn service_id(&self) -> &str;

    /// Provider family.
    fn kind(&self) -> BackendKind;

    /// How commit ranges are computed against this backend.
    fn range_strategy(&self) -> RangeStrategy;

    /// Header carrying the webhook HMAC-SHA256 signature.
    fn signature_header(&self) -> &'static str;

    /// Resolves a repository by group and name.
    ///
    /// # Errors
    ///
    /// - `FacadeError::NotFound` if the repository does not exist
    async fn get_repository(&self, coordinates: &RepositoryCoordinates) -> Result<Repository>;

    /// Lists every repository visible to the configured credentials.
    async fn list_repositories(&self) -> Result<Vec<Repository>>;

    /// Lists all branches.
    async fn get_branches(&self, repository: &Repository) -> Result<Vec<Ref>>;

    /// Lists all tags.
    async fn get_tags(&self, repository: &Repository) -> Result<Vec<Ref>>;

    /// Resolves one branch or tag.
    ///
    /// The default implementation scans the full listing.
    async fn get_ref(&self, repository: &Repository, ref_type: RefType, name: &str) -> Result<Ref> {
        let refs = match ref_type {
            RefType::Branch => self.get_branches(repository).await?,
            RefType::Tag => self.get_tags(repository).await?,
        };
        refs.into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| {
                FacadeError::not_found(format!(
                    "{} '{}' in repository {}",
                    ref_type, name, repository
                ))
            })
    }

    /// Returns a single commit by hash or ref name.
    async fn get_commit(&self, repository: &Repository, commit_id: &str) -> Result<Commit>;

    /// Lists commits reachable from `to`, newest first.
    ///
    /// `page` is 1-based. An empty page means the history is exhausted.
    async fn list_commits(
        &self,
        repository: &Repository,
        to: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Commit>>;

    /// Native "commits between" query.
    ///
    /// Only backends reporting [`RangeStrategy::Native`] implement this.
    async fn get_commits_between(
        &self,
        repository: &Repository,
        from: Option<&RangeStart>,
        to: &str,
    ) -> Result<Vec<Commit>> {
        let _ = (from, to);
        Err(FacadeError::unexpected(format!(
            "backend '{}' has no native range query for {}",
            self.service_id(),
            repository
        )))
    }

    /// Creates a pull request.
    async fn create_pull_request(
        &self,
        repository: &Repository,
        request: &NewPullRequest,
    ) -> Result<PullRequest>;

    /// Lists pull requests in every state.
    async fn get_pull_requests(&self, repository: &Repository) -> Result<Vec<PullRequest>>;

    /// Returns one pull request with reviewer approvals filled in.
    async fn get_pull_request(&self, repository: &Repository, index: u64) -> Result<PullRequest>;

    /// Returns the reviewers of a pull request and whether each approved.
    async fn get_pull_request_reviews(
        &self,
        repository: &Repository,
        index: u64,
    ) -> Result<Vec<PullRequestReviewer>>;

    /// Normalizes a webhook delivery into index events.
    ///
    /// Unknown event kinds yield an empty list.
    fn parse_webhook(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<Vec<WebhookEvent>>;
}
