//! GitLab API v4 adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use facade_core::{
    Commit, FacadeError, PullRequest, PullRequestReviewer, PullRequestStatus, Ref, RefType,
    Repository, RepositoryCoordinates, Result, User,
};

use crate::adapters::http::HttpApi;
use crate::client::{BackendKind, NewPullRequest, VcsClient};
use crate::range::{RangeStart, RangeStrategy};
use crate::registry::BackendConfig;
use crate::webhook::{WebhookEvent, WebhookHeaders, parse_body};

const EVENT_HEADER: &str = "X-Gitlab-Event";
const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// Client for one GitLab instance.
pub struct GitlabClient {
    api: HttpApi,
    page_size: u32,
}

impl GitlabClient {
    /// Creates a client from a backend entry.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            api: HttpApi::new(&config.id, &config.url, "private-token", &config.token)?,
            page_size: config.page_size,
        })
    }

    fn project_path(group: &str, name: &str) -> String {
        let full = format!("{}/{}", group, name);
        format!("/api/v4/projects/{}", urlencoding::encode(&full))
    }

    fn repo_path(repository: &Repository) -> String {
        Self::project_path(&repository.group, &repository.name)
    }

    async fn all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ];
            query.extend_from_slice(extra);
            let batch: Vec<T> = self.api.get(path, &query).await?;
            let fetched = batch.len();
            items.extend(batch);
            if fetched < self.page_size as usize {
                return Ok(items);
            }
            page += 1;
        }
    }

    fn to_repository(&self, project: GitlabProject) -> Result<Repository> {
        let coordinates = project.coordinates()?;
        let repository = Repository::new(
            self.service_id(),
            coordinates.group,
            coordinates.name,
            project.ssh_url_to_repo,
            project.web_url,
        );
        Ok(match project.avatar_url.filter(|a| !a.is_empty()) {
            Some(avatar) => repository.with_avatar(avatar),
            None => repository,
        })
    }

    fn to_commit(repository: &Repository, commit: GitlabCommit) -> Commit {
        let author = User {
            name: commit.author_name,
            email: commit.author_email.filter(|e| !e.is_empty()),
            avatar: None,
        };
        Commit::new(
            &repository.id,
            commit.id,
            commit.message,
            commit.authored_date,
            author,
            commit.parent_ids,
            commit.web_url,
        )
    }

    fn to_pull_request(
        repository: &Repository,
        mr: GitlabMergeRequest,
        approvals: Option<GitlabApprovals>,
    ) -> PullRequest {
        let status = match mr.state.as_str() {
            "merged" => PullRequestStatus::Merged,
            "opened" | "locked" => PullRequestStatus::Open,
            _ => PullRequestStatus::Declined,
        };
        let reviewers = merge_approvals(mr.reviewers.unwrap_or_default(), approvals);
        PullRequest {
            id: PullRequest::id_for(&repository.id, mr.iid),
            repository_id: repository.id.clone(),
            index: mr.iid,
            title: mr.title,
            description: mr.description.unwrap_or_default(),
            author: mr.author.into(),
            source: mr.source_branch,
            target: mr.target_branch,
            assignees: mr
                .assignees
                .unwrap_or_default()
                .into_iter()
                .map(User::from)
                .collect(),
            reviewers,
            status,
            created_at: mr.created_at,
            updated_at: mr.updated_at,
            link: mr.web_url,
        }
    }

    async fn approvals(&self, repository: &Repository, iid: u64) -> Result<GitlabApprovals> {
        let path = format!("{}/merge_requests/{}/approvals", Self::repo_path(repository), iid);
        self.api.get(&path, &[]).await
    }
}

/// Combines assigned reviewers with the users who approved.
fn merge_approvals(reviewers: Vec<GitlabUser>, approvals: Option<GitlabApprovals>) -> Vec<PullRequestReviewer> {
    let approved_by: Vec<GitlabUser> = approvals
        .map(|a| a.approved_by.into_iter().map(|entry| entry.user).collect())
        .unwrap_or_default();

    let mut result: Vec<PullRequestReviewer> = reviewers
        .into_iter()
        .map(|user| PullRequestReviewer {
            approved: approved_by.iter().any(|a| a.username == user.username),
            user: user.into(),
        })
        .collect();

    for user in approved_by {
        if !result.iter().any(|r| r.user.name == user.username) {
            result.push(PullRequestReviewer {
                user: user.into(),
                approved: true,
            });
        }
    }
    result
}

#[async_trait]
impl VcsClient for GitlabClient {
    fn service_id(&self) -> &str {
        self.api.service_id()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gitlab
    }

    fn range_strategy(&self) -> RangeStrategy {
        RangeStrategy::Native
    }

    fn signature_header(&self) -> &'static str {
        "X-Gitlab-Signature"
    }

    async fn get_repository(&self, coordinates: &RepositoryCoordinates) -> Result<Repository> {
        let path = Self::project_path(&coordinates.group, &coordinates.name);
        let project: GitlabProject = self.api.get(&path, &[]).await?;
        self.to_repository(project)
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let projects: Vec<GitlabProject> = self
            .all_pages("/api/v4/projects", &[("membership", "true".to_string())])
            .await?;
        projects
            .into_iter()
            .map(|p| self.to_repository(p))
            .collect()
    }

    async fn get_branches(&self, repository: &Repository) -> Result<Vec<Ref>> {
        let path = format!("{}/repository/branches", Self::repo_path(repository));
        let branches: Vec<GitlabRef> = self.all_pages(&path, &[]).await?;
        Ok(branches
            .into_iter()
            .map(|b| {
                let link = b
                    .web_url
                    .unwrap_or_else(|| format!("{}/-/tree/{}", repository.web_link, b.name));
                Ref::new(&repository.id, RefType::Branch, b.name, b.commit.id, link)
            })
            .collect())
    }

    async fn get_tags(&self, repository: &Repository) -> Result<Vec<Ref>> {
        let path = format!("{}/repository/tags", Self::repo_path(repository));
        let tags: Vec<GitlabRef> = self.all_pages(&path, &[]).await?;
        Ok(tags
            .into_iter()
            .map(|t| {
                let link = format!("{}/-/tags/{}", repository.web_link, t.name);
                Ref::new(&repository.id, RefType::Tag, t.name, t.commit.id, link)
            })
            .collect())
    }

    async fn get_commit(&self, repository: &Repository, commit_id: &str) -> Result<Commit> {
        let path = format!(
            "{}/repository/commits/{}",
            Self::repo_path(repository),
            urlencoding::encode(commit_id)
        );
        let commit: GitlabCommit = self.api.get(&path, &[]).await?;
        Ok(Self::to_commit(repository, commit))
    }

    async fn list_commits(
        &self,
        repository: &Repository,
        to: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Commit>> {
        let path = format!("{}/repository/commits", Self::repo_path(repository));
        let query = [
            ("ref_name", to.to_string()),
            ("page", page.to_string()),
            ("per_page", page_size.to_string()),
        ];
        let commits: Vec<GitlabCommit> = self.api.get(&path, &query).await?;
        Ok(commits
            .into_iter()
            .map(|c| Self::to_commit(repository, c))
            .collect())
    }

    async fn get_commits_between(
        &self,
        repository: &Repository,
        from: Option<&RangeStart>,
        to: &str,
    ) -> Result<Vec<Commit>> {
        let commits: Vec<GitlabCommit> = match from {
            Some(RangeStart::Ref(from)) => {
                let path = format!("{}/repository/compare", Self::repo_path(repository));
                let query = [("from", from.clone()), ("to", to.to_string())];
                let compare: GitlabCompare = self.api.get(&path, &query).await?;
                compare.commits
            },
            Some(RangeStart::Date(since)) => {
                let path = format!("{}/repository/commits", Self::repo_path(repository));
                self.all_pages(
                    &path,
                    &[("ref_name", to.to_string()), ("since", since.to_rfc3339())],
                )
                .await?
            },
            None => {
                let path = format!("{}/repository/commits", Self::repo_path(repository));
                self.all_pages(&path, &[("ref_name", to.to_string())]).await?
            },
        };
        Ok(commits
            .into_iter()
            .map(|c| Self::to_commit(repository, c))
            .collect())
    }

    async fn create_pull_request(
        &self,
        repository: &Repository,
        request: &NewPullRequest,
    ) -> Result<PullRequest> {
        let path = format!("{}/merge_requests", Self::repo_path(repository));
        let body = GitlabCreateMergeRequest {
            source_branch: &request.source_branch,
            target_branch: &request.target_branch,
            title: &request.title,
            description: &request.description,
        };
        let mr: GitlabMergeRequest = self.api.post(&path, &body).await?;
        Ok(Self::to_pull_request(repository, mr, None))
    }

    async fn get_pull_requests(&self, repository: &Repository) -> Result<Vec<PullRequest>> {
        let path = format!("{}/merge_requests", Self::repo_path(repository));
        let mrs: Vec<GitlabMergeRequest> = self
            .all_pages(&path, &[("state", "all".to_string())])
            .await?;
        let mut pull_requests = Vec::with_capacity(mrs.len());
        for mr in mrs {
            let approvals = self.approvals(repository, mr.iid).await?;
            pull_requests.push(Self::to_pull_request(repository, mr, Some(approvals)));
        }
        Ok(pull_requests)
    }

    async fn get_pull_request(&self, repository: &Repository, index: u64) -> Result<PullRequest> {
        let path = format!("{}/merge_requests/{}", Self::repo_path(repository), index);
        let mr: GitlabMergeRequest = self.api.get(&path, &[]).await?;
        let approvals = self.approvals(repository, index).await?;
        Ok(Self::to_pull_request(repository, mr, Some(approvals)))
    }

    async fn get_pull_request_reviews(
        &self,
        repository: &Repository,
        index: u64,
    ) -> Result<Vec<PullRequestReviewer>> {
        Ok(self.get_pull_request(repository, index).await?.reviewers)
    }

    fn parse_webhook(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<Vec<WebhookEvent>> {
        let payload: GitlabHook = parse_body(body)?;
        let kind = payload
            .object_kind
            .clone()
            .or_else(|| headers.get(EVENT_HEADER).map(hook_kind))
            .unwrap_or_default();
        debug!(backend = %self.service_id(), event = %kind, "Parsing GitLab webhook");

        let Some(project) = payload.project else {
            return Ok(Vec::new());
        };
        let coordinates = project.coordinates()?;

        let events = match kind.as_str() {
            "push" | "tag_push" => {
                let Some((ref_type, name)) = payload.git_ref.as_deref().and_then(RefType::parse_full)
                else {
                    return Ok(Vec::new());
                };
                let name = name.to_string();
                let before = payload.before.as_deref().unwrap_or(ZERO_SHA);
                let after = payload.after.as_deref().unwrap_or(ZERO_SHA);

                if after == ZERO_SHA {
                    vec![WebhookEvent::RefDeleted {
                        coordinates,
                        ref_type,
                        name,
                    }]
                } else {
                    let mut events = Vec::new();
                    if before == ZERO_SHA {
                        events.push(WebhookEvent::RefCreated {
                            coordinates: coordinates.clone(),
                            ref_type,
                            name,
                        });
                    }
                    let commit_ids: Vec<String> = payload.commits.into_iter().map(|c| c.id).collect();
                    if !commit_ids.is_empty() {
                        events.push(WebhookEvent::Pushed {
                            coordinates,
                            commit_ids,
                        });
                    }
                    events
                }
            },
            "merge_request" => match payload.object_attributes {
                Some(attributes) => vec![WebhookEvent::PullRequestChanged {
                    coordinates,
                    index: attributes.iid,
                }],
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(events)
    }
}

/// Maps an `X-Gitlab-Event` header value to the body's `object_kind`.
fn hook_kind(header: &str) -> String {
    match header {
        "Push Hook" => "push",
        "Tag Push Hook" => "tag_push",
        "Merge Request Hook" => "merge_request",
        _ => "",
    }
    .to_string()
}

// ============================================
// Wire types
// ============================================

#[derive(Debug, Clone, Deserialize)]
struct GitlabUser {
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<GitlabUser> for User {
    fn from(user: GitlabUser) -> Self {
        User {
            name: user.username,
            email: user.email.filter(|e| !e.is_empty()),
            avatar: user.avatar_url.filter(|a| !a.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitlabProject {
    path_with_namespace: String,
    #[serde(default)]
    ssh_url_to_repo: String,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl GitlabProject {
    fn coordinates(&self) -> Result<RepositoryCoordinates> {
        match self.path_with_namespace.rsplit_once('/') {
            Some((group, name)) => Ok(RepositoryCoordinates::new(group, name)),
            None => Err(FacadeError::unexpected(format!(
                "project path '{}' has no namespace",
                self.path_with_namespace
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitlabRef {
    name: String,
    commit: GitlabRefCommit,
    #[serde(default)]
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitlabRefCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GitlabCommit {
    id: String,
    message: String,
    authored_date: DateTime<Utc>,
    author_name: String,
    #[serde(default)]
    author_email: Option<String>,
    #[serde(default)]
    parent_ids: Vec<String>,
    #[serde(default)]
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct GitlabCompare {
    #[serde(default)]
    commits: Vec<GitlabCommit>,
}

#[derive(Debug, Deserialize)]
struct GitlabMergeRequest {
    iid: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    author: GitlabUser,
    source_branch: String,
    target_branch: String,
    #[serde(default)]
    assignees: Option<Vec<GitlabUser>>,
    #[serde(default)]
    reviewers: Option<Vec<GitlabUser>>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    web_url: String,
}

#[derive(Debug, Serialize)]
struct GitlabCreateMergeRequest<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitlabApprovals {
    #[serde(default)]
    approved_by: Vec<GitlabApprover>,
}

#[derive(Debug, Deserialize)]
struct GitlabApprover {
    user: GitlabUser,
}

#[derive(Debug, Deserialize)]
struct GitlabHook {
    #[serde(default)]
    object_kind: Option<String>,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    after: Option<String>,
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    commits: Vec<GitlabHookCommit>,
    #[serde(default)]
    project: Option<GitlabProject>,
    #[serde(default)]
    object_attributes: Option<GitlabHookAttributes>,
}

#[derive(Debug, Deserialize)]
struct GitlabHookCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GitlabHookAttributes {
    iid: u64,
}
