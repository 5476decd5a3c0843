//! Gitea API v1 adapter.
//!
//! Gitea has no "commits between" endpoint, so ranges are resolved by
//! walking the graph fetched through `/commits`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use facade_core::{
    Commit, FacadeError, PullRequest, PullRequestReviewer, PullRequestStatus, Ref, RefType, Repository,
    RepositoryCoordinates, Result, User,
};

use crate::adapters::http::HttpApi;
use crate::client::{BackendKind, NewPullRequest, VcsClient};
use crate::range::RangeStrategy;
use crate::registry::BackendConfig;
use crate::webhook::{WebhookEvent, WebhookHeaders, parse_body};

const EVENT_HEADER: &str = "X-Gitea-Event";
const EVENT_TYPE_HEADER: &str = "X-Gitea-Event-Type";

/// Client for one Gitea instance.
pub struct GiteaClient {
    api: HttpApi,
    graph_depth: usize,
    page_size: u32,
}

impl GiteaClient {
    /// Creates a client from a backend entry.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;
        let auth = format!("token {}", config.token);
        Ok(Self {
            api: HttpApi::new(&config.id, &config.url, "authorization", &auth)?,
            graph_depth: config.graph_depth,
            page_size: config.page_size,
        })
    }

    fn repo_path(repository: &Repository) -> String {
        format!(
            "/api/v1/repos/{}/{}",
            urlencoding::encode(&repository.group),
            urlencoding::encode(&repository.name)
        )
    }

    fn page_query(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![("page", page.to_string()), ("limit", self.page_size.to_string())]
    }

    /// Fetches every page of a listing endpoint.
    async fn all_pages<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let mut query = self.page_query(page);
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

    fn to_repository(&self, repo: GiteaRepository) -> Repository {
        let repository = Repository::new(
            self.service_id(),
            repo.owner.login,
            repo.name,
            repo.ssh_url,
            repo.html_url,
        );
        match repo.avatar_url.filter(|a| !a.is_empty()) {
            Some(avatar) => repository.with_avatar(avatar),
            None => repository,
        }
    }

    fn to_commit(repository: &Repository, commit: GiteaCommit) -> Commit {
        let author = User {
            name: commit.commit.author.name,
            email: Some(commit.commit.author.email).filter(|e| !e.is_empty()),
            avatar: commit.author.and_then(|a| a.avatar_url),
        };
        Commit::new(
            &repository.id,
            commit.sha,
            commit.commit.message,
            commit.commit.author.date,
            author,
            commit.parents.into_iter().map(|p| p.sha).collect(),
            commit.html_url,
        )
    }

    fn to_pull_request(
        repository: &Repository,
        pr: GiteaPullRequest,
        reviewers: Vec<PullRequestReviewer>,
    ) -> PullRequest {
        let status = match (pr.state.as_str(), pr.merged) {
            (_, true) => PullRequestStatus::Merged,
            ("open", _) => PullRequestStatus::Open,
            _ => PullRequestStatus::Declined,
        };
        PullRequest {
            id: PullRequest::id_for(&repository.id, pr.number),
            repository_id: repository.id.clone(),
            index: pr.number,
            title: pr.title,
            description: pr.body.unwrap_or_default(),
            author: pr.user.into(),
            source: pr.head.branch,
            target: pr.base.branch,
            assignees: pr.assignees.unwrap_or_default().into_iter().map(User::from).collect(),
            reviewers,
            status,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            link: pr.html_url,
        }
    }

    async fn fetch_reviews(&self, repository: &Repository, index: u64) -> Result<Vec<GiteaReview>> {
        let path = format!("{}/pulls/{}/reviews", Self::repo_path(repository), index);
        self.all_pages(&path, &[]).await
    }

    fn requested_reviewers(pr: &GiteaPullRequest) -> Vec<PullRequestReviewer> {
        pr.requested_reviewers
            .iter()
            .flatten()
            .map(|u| PullRequestReviewer {
                user: u.clone().into(),
                approved: false,
            })
            .collect()
    }
}

/// Folds a review history into one verdict per reviewer.
///
/// The latest non-comment review of each user wins. Users who were asked to
/// review but have not answered are listed as not approved.
fn merge_reviews(requested: Vec<PullRequestReviewer>, reviews: Vec<GiteaReview>) -> Vec<PullRequestReviewer> {
    let mut verdicts: Vec<PullRequestReviewer> = requested;
    let mut positions: HashMap<String, usize> = verdicts
        .iter()
        .enumerate()
        .map(|(i, r)| (r.user.name.clone(), i))
        .collect();

    for review in reviews {
        let Some(user) = review.user else { continue };
        let approved = match review.state.as_str() {
            "APPROVED" => true,
            "REQUEST_CHANGES" | "REQUEST_REVIEW" => false,
            _ => continue,
        };
        match positions.get(&user.login) {
            Some(&i) => verdicts[i].approved = approved,
            None => {
                positions.insert(user.login.clone(), verdicts.len());
                verdicts.push(PullRequestReviewer {
                    user: user.into(),
                    approved,
                });
            },
        }
    }
    verdicts
}

#[async_trait]
impl VcsClient for GiteaClient {
    fn service_id(&self) -> &str {
        self.api.service_id()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gitea
    }

    fn range_strategy(&self) -> RangeStrategy {
        RangeStrategy::GraphWalk {
            depth: self.graph_depth,
            page_size: self.page_size,
        }
    }

    fn signature_header(&self) -> &'static str {
        "X-Gitea-Signature"
    }

    async fn get_repository(&self, coordinates: &RepositoryCoordinates) -> Result<Repository> {
        let path = format!(
            "/api/v1/repos/{}/{}",
            urlencoding::encode(&coordinates.group),
            urlencoding::encode(&coordinates.name)
        );
        let repo: GiteaRepository = self.api.get(&path, &[]).await?;
        Ok(self.to_repository(repo))
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let mut repositories = Vec::new();
        let mut page = 1;
        loop {
            let result: GiteaSearchResult = self
                .api
                .get("/api/v1/repos/search", &self.page_query(page))
                .await?;
            let fetched = result.data.len();
            repositories.extend(result.data.into_iter().map(|r| self.to_repository(r)));
            if fetched < self.page_size as usize {
                return Ok(repositories);
            }
            page += 1;
        }
    }

    async fn get_branches(&self, repository: &Repository) -> Result<Vec<Ref>> {
        let path = format!("{}/branches", Self::repo_path(repository));
        let branches: Vec<GiteaBranch> = self.all_pages(&path, &[]).await?;
        Ok(branches
            .into_iter()
            .map(|b| {
                let link = format!("{}/src/branch/{}", repository.web_link, b.name);
                Ref::new(&repository.id, RefType::Branch, b.name, b.commit.id, link)
            })
            .collect())
    }

    async fn get_tags(&self, repository: &Repository) -> Result<Vec<Ref>> {
        let path = format!("{}/tags", Self::repo_path(repository));
        let tags: Vec<GiteaTag> = self.all_pages(&path, &[]).await?;
        Ok(tags
            .into_iter()
            .map(|t| {
                let link = format!("{}/src/tag/{}", repository.web_link, t.name);
                Ref::new(&repository.id, RefType::Tag, t.name, t.commit.sha, link)
            })
            .collect())
    }

    async fn get_commit(&self, repository: &Repository, commit_id: &str) -> Result<Commit> {
        let path = format!("{}/commits", Self::repo_path(repository));
        let query = [
            ("sha", commit_id.to_string()),
            ("limit", "1".to_string()),
            ("stat", "false".to_string()),
        ];
        let commits: Vec<GiteaCommit> = self.api.get(&path, &query).await?;
        commits
            .into_iter()
            .next()
            .map(|c| Self::to_commit(repository, c))
            .ok_or_else(|| {
                FacadeError::not_found(format!(
                    "commit '{}' in {}",
                    commit_id, repository
                ))
            })
    }

    async fn list_commits(
        &self,
        repository: &Repository,
        to: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Commit>> {
        let path = format!("{}/commits", Self::repo_path(repository));
        let query = [
            ("sha", to.to_string()),
            ("page", page.to_string()),
            ("limit", page_size.to_string()),
            ("stat", "false".to_string()),
        ];
        let commits: Vec<GiteaCommit> = self.api.get(&path, &query).await?;
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
        let path = format!("{}/pulls", Self::repo_path(repository));
        let body = GiteaCreatePullRequest {
            head: &request.source_branch,
            base: &request.target_branch,
            title: &request.title,
            body: &request.description,
        };
        let pr: GiteaPullRequest = self.api.post(&path, &body).await?;
        let reviewers = Self::requested_reviewers(&pr);
        Ok(Self::to_pull_request(repository, pr, reviewers))
    }

    async fn get_pull_requests(&self, repository: &Repository) -> Result<Vec<PullRequest>> {
        let path = format!("{}/pulls", Self::repo_path(repository));
        let prs: Vec<GiteaPullRequest> = self
            .all_pages(&path, &[("state", "all".to_string())])
            .await?;
        let mut pull_requests = Vec::with_capacity(prs.len());
        for pr in prs {
            let reviews = self.fetch_reviews(repository, pr.number).await?;
            let reviewers = merge_reviews(Self::requested_reviewers(&pr), reviews);
            pull_requests.push(Self::to_pull_request(repository, pr, reviewers));
        }
        Ok(pull_requests)
    }

    async fn get_pull_request(&self, repository: &Repository, index: u64) -> Result<PullRequest> {
        let path = format!("{}/pulls/{}", Self::repo_path(repository), index);
        let pr: GiteaPullRequest = self.api.get(&path, &[]).await?;
        let reviews = self.fetch_reviews(repository, index).await?;
        let reviewers = merge_reviews(Self::requested_reviewers(&pr), reviews);
        Ok(Self::to_pull_request(repository, pr, reviewers))
    }

    async fn get_pull_request_reviews(
        &self,
        repository: &Repository,
        index: u64,
    ) -> Result<Vec<PullRequestReviewer>> {
        let reviews = self.fetch_reviews(repository, index).await?;
        Ok(merge_reviews(Vec::new(), reviews))
    }

    fn parse_webhook(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<Vec<WebhookEvent>> {
        let Some(event) = headers
            .get(EVENT_TYPE_HEADER)
            .or_else(|| headers.get(EVENT_HEADER))
        else {
            return Ok(Vec::new());
        };
        debug!(backend = %self.service_id(), event = %event, "Parsing Gitea webhook");

        let event = event.to_string();
        let events = match event.as_str() {
            "create" | "delete" => {
                let payload: GiteaRefPayload = parse_body(body)?;
                let Some(ref_type) = RefType::from_kind(&payload.ref_type) else {
                    return Ok(Vec::new());
                };
                let coordinates = payload.repository.coordinates();
                let name = short_ref(&payload.git_ref).to_string();
                if event == "create" {
                    vec![WebhookEvent::RefCreated {
                        coordinates,
                        ref_type,
                        name,
                    }]
                } else {
                    vec![WebhookEvent::RefDeleted {
                        coordinates,
                        ref_type,
                        name,
                    }]
                }
            },
            "push" => {
                let payload: GiteaPushPayload = parse_body(body)?;
                let commit_ids: Vec<String> = payload.commits.into_iter().map(|c| c.id).collect();
                if commit_ids.is_empty() {
                    Vec::new()
                } else {
                    vec![WebhookEvent::Pushed {
                        coordinates: payload.repository.coordinates(),
                        commit_ids,
                    }]
                }
            },
            kind if kind.starts_with("pull_request") => {
                let payload: GiteaPullRequestPayload = parse_body(body)?;
                let index = payload
                    .pull_request
                    .map(|pr| pr.number)
                    .or(payload.number)
                    .ok_or_else(|| {
                        FacadeError::invalid_argument("pull request webhook without a number")
                    })?;
                vec![WebhookEvent::PullRequestChanged {
                    coordinates: payload.repository.coordinates(),
                    index,
                }]
            },
            _ => Vec::new(),
        };
        Ok(events)
    }
}

fn short_ref(full: &str) -> &str {
    RefType::parse_full(full).map(|(_, name)| name).unwrap_or(full)
}

// ============================================
// Wire types
// ============================================

#[derive(Debug, Clone, Deserialize)]
struct GiteaUser {
    login: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<GiteaUser> for User {
    fn from(user: GiteaUser) -> Self {
        User {
            name: user.login,
            email: user.email.filter(|e| !e.is_empty()),
            avatar: user.avatar_url.filter(|a| !a.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GiteaRepository {
    name: String,
    owner: GiteaUser,
    #[serde(default)]
    ssh_url: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl GiteaRepository {
    fn coordinates(&self) -> RepositoryCoordinates {
        RepositoryCoordinates::new(&self.owner.login, &self.name)
    }
}

#[derive(Debug, Deserialize)]
struct GiteaSearchResult {
    #[serde(default)]
    data: Vec<GiteaRepository>,
}

#[derive(Debug, Deserialize)]
struct GiteaBranch {
    name: String,
    commit: GiteaBranchCommit,
}

#[derive(Debug, Deserialize)]
struct GiteaBranchCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GiteaTag {
    name: String,
    commit: GiteaSha,
}

#[derive(Debug, Deserialize)]
struct GiteaSha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GiteaCommit {
    sha: String,
    #[serde(default)]
    html_url: String,
    commit: GiteaCommitDetail,
    #[serde(default)]
    author: Option<GiteaUser>,
    #[serde(default)]
    parents: Vec<GiteaSha>,
}

#[derive(Debug, Deserialize)]
struct GiteaCommitDetail {
    message: String,
    author: GiteaSignature,
}

#[derive(Debug, Deserialize)]
struct GiteaSignature {
    name: String,
    #[serde(default)]
    email: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GiteaBranchRef {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Deserialize)]
struct GiteaPullRequest {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    user: GiteaUser,
    head: GiteaBranchRef,
    base: GiteaBranchRef,
    #[serde(default)]
    assignees: Option<Vec<GiteaUser>>,
    #[serde(default)]
    requested_reviewers: Option<Vec<GiteaUser>>,
    state: String,
    #[serde(default)]
    merged: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Serialize)]
struct GiteaCreatePullRequest<'a> {
    head: &'a str,
    base: &'a str,
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct GiteaReview {
    #[serde(default)]
    user: Option<GiteaUser>,
    state: String,
}

#[derive(Debug, Deserialize)]
struct GiteaRefPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    ref_type: String,
    repository: GiteaRepository,
}

#[derive(Debug, Deserialize)]
struct GiteaPushPayload {
    #[serde(default)]
    commits: Vec<GiteaPushCommit>,
    repository: GiteaRepository,
}

#[derive(Debug, Deserialize)]
struct GiteaPushCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GiteaPullRequestPayload {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    pull_request: Option<GiteaPullRequestNumber>,
    repository: GiteaRepository,
}

#[derive(Debug, Deserialize)]
struct GiteaPullRequestNumber {
    number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BackendKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> BackendConfig {
        BackendConfig::new("gitea", BackendKind::Gitea, url, "ssh://git@gitea.example.com/*")
            .with_token("secret")
            .with_page_size(2)
    }

    fn repository() -> Repository {
        Repository::new(
            "gitea",
            "team",
            "service",
            "ssh://git@gitea.example.com/team/service.git",
            "https://gitea.example.com/team/service",
        )
    }

    fn commit_json(sha: &str, parents: &[&str]) -> serde_json::Value {
        json!({
            "sha": sha,
            "html_url": format!("https://gitea.example.com/team/service/commit/{}", sha),
            "commit": {
                "message": format!("BILL-1 {}", sha),
                "author": {"name": "dev", "email": "dev@example.com", "date": "2024-03-01T10:00:00Z"}
            },
            "parents": parents.iter().map(|p| json!({"sha": p})).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_get_repository() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/team/service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "service",
                "owner": {"login": "team"},
                "ssh_url": "ssh://git@gitea.example.com/team/service.git",
                "html_url": "https://gitea.example.com/team/service"
            })))
            .mount(&server)
            .await;

        let client = GiteaClient::new(&config(&server.uri())).unwrap();
        let repo = client
            .get_repository(&RepositoryCoordinates::new("team", "service"))
            .await
            .unwrap();

        assert_eq!(repo, repository());
    }

    #[tokio::test]
    async fn test_missing_repository_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/repos/team/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GiteaClient::new(&config(&server.uri())).unwrap();
        let err = client
            .get_repository(&RepositoryCoordinates::new("team", "ghost"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_branches_are_paged() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/repos/team/service/branches"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "main", "commit": {"id": "c2"}},
                {"name": "develop", "commit": {"id": "c1"}}
            ])))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/repos/team/service/branches"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "feature/BILL-1", "commit": {"id": "c3"}}
            ])))
            .mount(&server)
            .await;

        let client = GiteaClient::new(&config(&server.uri())).unwrap();
        let branches = client.get_branches(&repository()).await.unwrap();

        assert_eq!(branches.len(), 3);
        assert_eq!(branches[2].name, "feature/BILL-1");
        assert_eq!(branches[2].commit_id, "c3");
        assert!(branches.iter().all(Ref::is_branch));
    }

    #[tokio::test]
    async fn test_list_commits_maps_parents() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/repos/team/service/commits"))
            .and(query_param("sha", "main"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([commit_json("c2", &["c1"]), commit_json("c1", &[])])),
            )
            .mount(&server)
            .await;

        let client = GiteaClient::new(&config(&server.uri())).unwrap();
        let commits = client.list_commits(&repository(), "main", 1, 2).await.unwrap();

        assert_eq!(commits[0].hash, "c2");
        assert!(commits[0].has_parent("c1"));
        assert_eq!(commits[0].author.email.as_deref(), Some("dev@example.com"));
        assert_eq!(commits[0].id, Commit::id_for(&repository().id, "c2"));
    }

    #[test]
    fn test_graph_walk_strategy() {
        let client = GiteaClient::new(&config("http://localhost")).unwrap();
        assert_eq!(
            client.range_strategy(),
            RangeStrategy::GraphWalk {
                depth: 100,
                page_size: 2
            }
        );
    }

    #[test]
    fn test_latest_review_wins() {
        let requested = vec![PullRequestReviewer {
            user: User::new("carol"),
            approved: false,
        }];
        let review = |login: &str, state: &str| GiteaReview {
            user: Some(GiteaUser {
                login: login.to_string(),
                email: None,
                avatar_url: None,
            }),
            state: state.to_string(),
        };
        let reviews = vec![
            review("alice", "REQUEST_CHANGES"),
            review("bob", "COMMENT"),
            review("alice", "APPROVED"),
        ];

        let verdicts = merge_reviews(requested, reviews);

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].user.name, "carol");
        assert!(!verdicts[0].approved);
        assert_eq!(verdicts[1].user.name, "alice");
        assert!(verdicts[1].approved);
    }

    #[test]
    fn test_parse_create_and_push_webhooks() {
        let client = GiteaClient::new(&config("http://localhost")).unwrap();
        let repository = json!({"name": "service", "owner": {"login": "team"}});

        let headers = WebhookHeaders::new().with(EVENT_HEADER, "create");
        let body = json!({"ref": "v1.0", "ref_type": "tag", "repository": repository});
        let events = client
            .parse_webhook(&headers, body.to_string().as_bytes())
            .unwrap();
        assert_eq!(
            events,
            vec![WebhookEvent::RefCreated {
                coordinates: RepositoryCoordinates::new("team", "service"),
                ref_type: RefType::Tag,
                name: "v1.0".to_string(),
            }]
        );

        let headers = WebhookHeaders::new().with(EVENT_HEADER, "push");
        let body = json!({
            "ref": "refs/heads/main",
            "commits": [{"id": "c1"}, {"id": "c2"}],
            "repository": repository
        });
        let events = client
            .parse_webhook(&headers, body.to_string().as_bytes())
            .unwrap();
        assert!(matches!(
            &events[0],
            WebhookEvent::Pushed { commit_ids, .. } if commit_ids.len() == 2
        ));
    }

    #[test]
    fn test_parse_pull_request_webhook() {
        let client = GiteaClient::new(&config("http://localhost")).unwrap();
        let headers = WebhookHeaders::new().with(EVENT_TYPE_HEADER, "pull_request_review_approved");
        let body = json!({
            "number": 4,
            "pull_request": {"number": 4},
            "repository": {"name": "service", "owner": {"login": "team"}}
        });

        let events = client
            .parse_webhook(&headers, body.to_string().as_bytes())
            .unwrap();

        assert_eq!(
            events,
            vec![WebhookEvent::PullRequestChanged {
                coordinates: RepositoryCoordinates::new("team", "service"),
                index: 4,
            }]
        );
    }

    #[test]
    fn test_pull_request_webhook_without_number_is_rejected() {
        let client = GiteaClient::new(&config("http://localhost")).unwrap();
        let headers = WebhookHeaders::new().with(EVENT_TYPE_HEADER, "pull_request");
        let body = json!({"repository": {"name": "service", "owner": {"login": "team"}}});

        let err = client
            .parse_webhook(&headers, body.to_string().as_bytes())
            .unwrap_err();

        assert!(matches!(err, FacadeError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_listed_pull_requests_carry_approvals() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/repos/team/service/pulls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "number": 7,
                "title": "BILL-9 totals",
                "user": {"login": "dev"},
                "head": {"ref": "feature/BILL-9"},
                "base": {"ref": "main"},
                "requested_reviewers": [{"login": "bob"}],
                "state": "open",
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-02T10:00:00Z"
            }])))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/repos/team/service/pulls/7/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"user": {"login": "alice"}, "state": "APPROVED"}
            ])))
            .mount(&server)
            .await;

        let client = GiteaClient::new(&config(&server.uri())).unwrap();
        let prs = client.get_pull_requests(&repository()).await.unwrap();

        assert_eq!(prs.len(), 1);
        let verdicts: Vec<(&str, bool)> = prs[0]
            .reviewers
            .iter()
            .map(|r| (r.user.name.as_str(), r.approved))
            .collect();
        assert_eq!(verdicts, vec![("bob", false), ("alice", true)]);
    }

    #[test]
    fn test_unknown_webhook_is_ignored() {
        let client = GiteaClient::new(&config("http://localhost")).unwrap();
        let headers = WebhookHeaders::new().with(EVENT_HEADER, "issues");
        assert!(client.parse_webhook(&headers, b"{}").unwrap().is_empty());
        assert!(
            client
                .parse_webhook(&WebhookHeaders::new(), b"{}")
                .unwrap()
                .is_empty()
        );
    }
}
