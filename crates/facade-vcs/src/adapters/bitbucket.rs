//! Bitbucket Server (Data Center) REST API 1.0 adapter.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
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

const EVENT_HEADER: &str = "X-Event-Key";

/// Client for one Bitbucket Server instance.
pub struct BitbucketClient {
    api: HttpApi,
    page_size: u32,
}

impl BitbucketClient {
    /// Creates a client from a backend entry.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;
        let auth = format!("Bearer {}", config.token);
        Ok(Self {
            api: HttpApi::new(&config.id, &config.url, "authorization", &auth)?,
            page_size: config.page_size,
        })
    }

    fn project_path(project: &str, slug: &str) -> String {
        format!(
            "/rest/api/1.0/projects/{}/repos/{}",
            urlencoding::encode(project),
            urlencoding::encode(slug)
        )
    }

    fn repo_path(repository: &Repository) -> String {
        Self::project_path(&repository.group, &repository.name)
    }

    fn page_query(start: u32, limit: u32) -> Vec<(&'static str, String)> {
        vec![("start", start.to_string()), ("limit", limit.to_string())]
    }

    async fn page<T: DeserializeOwned>(
        &self,
        path: &str,
        start: u32,
        limit: u32,
        extra: &[(&'static str, String)],
    ) -> Result<BitbucketPage<T>> {
        let mut query = Self::page_query(start, limit);
        query.extend_from_slice(extra);
        self.api.get(path, &query).await
    }

    /// Follows `nextPageStart` until `isLastPage`.
    async fn all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut start = 0;
        loop {
            let page: BitbucketPage<T> = self.page(path, start, self.page_size, extra).await?;
            items.extend(page.values);
            match page.next_page_start {
                Some(next) if !page.is_last_page => start = next,
                _ => return Ok(items),
            }
        }
    }

    fn to_repository(&self, repo: BitbucketRepository) -> Repository {
        let ssh_url = repo
            .links
            .clone
            .iter()
            .find(|l| l.name.as_deref() == Some("ssh"))
            .map(|l| l.href.clone())
            .unwrap_or_default();
        let web_link = repo
            .links
            .self_links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        Repository::new(self.service_id(), repo.project.key, repo.slug, ssh_url, web_link)
    }

    fn to_commit(&self, repository: &Repository, commit: BitbucketCommit) -> Commit {
        let link = format!("{}/commits/{}", repository.web_link.trim_end_matches("/browse"), commit.id);
        Commit::new(
            &repository.id,
            commit.id,
            commit.message,
            millis(commit.author_timestamp),
            commit.author.into(),
            commit.parents.into_iter().map(|p| p.id).collect(),
            link,
        )
    }

    fn to_ref(repository: &Repository, ref_type: RefType, r: BitbucketRef) -> Ref {
        let link = format!(
            "{}?at={}",
            repository.web_link,
            urlencoding::encode(&r.id)
        );
        Ref::new(&repository.id, ref_type, r.display_id, r.latest_commit, link)
    }

    fn to_pull_request(repository: &Repository, pr: BitbucketPullRequest) -> PullRequest {
        let status = match pr.state.as_str() {
            "MERGED" => PullRequestStatus::Merged,
            "DECLINED" => PullRequestStatus::Declined,
            _ => PullRequestStatus::Open,
        };
        PullRequest {
            id: PullRequest::id_for(&repository.id, pr.id),
            repository_id: repository.id.clone(),
            index: pr.id,
            title: pr.title,
            description: pr.description.unwrap_or_default(),
            author: pr.author.user.into(),
            source: pr.from_ref.display_id,
            target: pr.to_ref.display_id,
            assignees: Vec::new(),
            reviewers: pr
                .reviewers
                .into_iter()
                .map(|r| PullRequestReviewer {
                    user: r.user.into(),
                    approved: r.approved,
                })
                .collect(),
            status,
            created_at: millis(pr.created_date),
            updated_at: millis(pr.updated_date),
            link: pr
                .links
                .self_links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
        }
    }

    /// Lists commits reachable from `to`, stopping at the first one older
    /// than `since`.
    async fn commits_since(
        &self,
        repository: &Repository,
        to: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Commit>> {
        let path = format!("{}/commits", Self::repo_path(repository));
        let extra = [("until", to.to_string())];
        let mut result = Vec::new();
        let mut start = 0;
        loop {
            let page: BitbucketPage<BitbucketCommit> =
                self.page(&path, start, self.page_size, &extra).await?;
            for commit in page.values {
                let commit = self.to_commit(repository, commit);
                if commit.date < since {
                    return Ok(result);
                }
                result.push(commit);
            }
            match page.next_page_start {
                Some(next) if !page.is_last_page => start = next,
                _ => return Ok(result),
            }
        }
    }
}

fn millis(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp)
        .single()
        .unwrap_or_default()
}

#[async_trait]
impl VcsClient for BitbucketClient {
    fn service_id(&self) -> &str {
        self.api.service_id()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Bitbucket
    }

    fn range_strategy(&self) -> RangeStrategy {
        RangeStrategy::Native
    }

    fn signature_header(&self) -> &'static str {
        "X-Hub-Signature"
    }

    async fn get_repository(&self, coordinates: &RepositoryCoordinates) -> Result<Repository> {
        let path = Self::project_path(&coordinates.group, &coordinates.name);
        let repo: BitbucketRepository = self.api.get(&path, &[]).await?;
        Ok(self.to_repository(repo))
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let repos: Vec<BitbucketRepository> = self.all_pages("/rest/api/1.0/repos", &[]).await?;
        Ok(repos.into_iter().map(|r| self.to_repository(r)).collect())
    }

    async fn get_branches(&self, repository: &Repository) -> Result<Vec<Ref>> {
        let path = format!("{}/branches", Self::repo_path(repository));
        let branches: Vec<BitbucketRef> = self.all_pages(&path, &[]).await?;
        Ok(branches
            .into_iter()
            .map(|b| Self::to_ref(repository, RefType::Branch, b))
            .collect())
    }

    async fn get_tags(&self, repository: &Repository) -> Result<Vec<Ref>> {
        let path = format!("{}/tags", Self::repo_path(repository));
        let tags: Vec<BitbucketRef> = self.all_pages(&path, &[]).await?;
        Ok(tags
            .into_iter()
            .map(|t| Self::to_ref(repository, RefType::Tag, t))
            .collect())
    }

    async fn get_commit(&self, repository: &Repository, commit_id: &str) -> Result<Commit> {
        let path = format!(
            "{}/commits/{}",
            Self::repo_path(repository),
            urlencoding::encode(commit_id)
        );
        let commit: BitbucketCommit = self.api.get(&path, &[]).await?;
        Ok(self.to_commit(repository, commit))
    }

    async fn list_commits(
        &self,
        repository: &Repository,
        to: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Commit>> {
        let path = format!("{}/commits", Self::repo_path(repository));
        let start = page.saturating_sub(1) * page_size;
        let page: BitbucketPage<BitbucketCommit> = self
            .page(&path, start, page_size, &[("until", to.to_string())])
            .await?;
        Ok(page
            .values
            .into_iter()
            .map(|c| self.to_commit(repository, c))
            .collect())
    }

    async fn get_commits_between(
        &self,
        repository: &Repository,
        from: Option<&RangeStart>,
        to: &str,
    ) -> Result<Vec<Commit>> {
        let path = format!("{}/commits", Self::repo_path(repository));
        match from {
            Some(RangeStart::Date(since)) => self.commits_since(repository, to, *since).await,
            Some(RangeStart::Ref(from)) => {
                let commits: Vec<BitbucketCommit> = self
                    .all_pages(&path, &[("since", from.clone()), ("until", to.to_string())])
                    .await?;
                Ok(commits
                    .into_iter()
                    .map(|c| self.to_commit(repository, c))
                    .collect())
            },
            None => {
                let commits: Vec<BitbucketCommit> =
                    self.all_pages(&path, &[("until", to.to_string())]).await?;
                Ok(commits
                    .into_iter()
                    .map(|c| self.to_commit(repository, c))
                    .collect())
            },
        }
    }

    async fn create_pull_request(
        &self,
        repository: &Repository,
        request: &NewPullRequest,
    ) -> Result<PullRequest> {
        let path = format!("{}/pull-requests", Self::repo_path(repository));
        let body = BitbucketCreatePullRequest {
            title: &request.title,
            description: &request.description,
            from_ref: BitbucketRefId {
                id: RefType::Branch.full_ref(&request.source_branch),
            },
            to_ref: BitbucketRefId {
                id: RefType::Branch.full_ref(&request.target_branch),
            },
        };
        let pr: BitbucketPullRequest = self.api.post(&path, &body).await?;
        Ok(Self::to_pull_request(repository, pr))
    }

    async fn get_pull_requests(&self, repository: &Repository) -> Result<Vec<PullRequest>> {
        let path = format!("{}/pull-requests", Self::repo_path(repository));
        let prs: Vec<BitbucketPullRequest> = self
            .all_pages(&path, &[("state", "ALL".to_string())])
            .await?;
        Ok(prs
            .into_iter()
            .map(|pr| Self::to_pull_request(repository, pr))
            .collect())
    }

    async fn get_pull_request(&self, repository: &Repository, index: u64) -> Result<PullRequest> {
        let path = format!("{}/pull-requests/{}", Self::repo_path(repository), index);
        let pr: BitbucketPullRequest = self.api.get(&path, &[]).await?;
        Ok(Self::to_pull_request(repository, pr))
    }

    async fn get_pull_request_reviews(
        &self,
        repository: &Repository,
        index: u64,
    ) -> Result<Vec<PullRequestReviewer>> {
        Ok(self.get_pull_request(repository, index).await?.reviewers)
    }

    fn parse_webhook(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<Vec<WebhookEvent>> {
        let Some(key) = headers.get(EVENT_HEADER) else {
            return Ok(Vec::new());
        };
        debug!(backend = %self.service_id(), event = %key, "Parsing Bitbucket webhook");

        let (category, _) = key.split_once(':').unwrap_or((key, ""));
        match (category, key) {
            (_, "repo:refs_changed") => {
                let payload: BitbucketRefsChanged = parse_body(body)?;
                let coordinates = payload.repository.coordinates();
                let events = payload
                    .changes
                    .into_iter()
                    .filter_map(|change| {
                        let ref_type = RefType::from_kind(&change.git_ref.ref_type)?;
                        let name = change.git_ref.display_id;
                        let coordinates = coordinates.clone();
                        match change.change_type.as_str() {
                            "ADD" => Some(WebhookEvent::RefCreated {
                                coordinates,
                                ref_type,
                                name,
                            }),
                            "DELETE" => Some(WebhookEvent::RefDeleted {
                                coordinates,
                                ref_type,
                                name,
                            }),
                            "UPDATE" => Some(WebhookEvent::Pushed {
                                coordinates,
                                commit_ids: vec![change.to_hash],
                            }),
                            _ => None,
                        }
                    })
                    .collect();
                Ok(events)
            },
            ("pr", _) => {
                let payload: BitbucketPullRequestEvent = parse_body(body)?;
                Ok(vec![WebhookEvent::PullRequestChanged {
                    coordinates: payload.pull_request.to_ref.repository.coordinates(),
                    index: payload.pull_request.id,
                }])
            },
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================
// Wire types
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    #[serde(default)]
    next_page_start: Option<u32>,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct BitbucketLink {
    href: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BitbucketLinks {
    #[serde(default)]
    clone: Vec<BitbucketLink>,
    #[serde(default, rename = "self")]
    self_links: Vec<BitbucketLink>,
}

#[derive(Debug, Deserialize)]
struct BitbucketProject {
    key: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketRepository {
    slug: String,
    project: BitbucketProject,
    #[serde(default)]
    links: BitbucketLinks,
}

impl BitbucketRepository {
    fn coordinates(&self) -> RepositoryCoordinates {
        RepositoryCoordinates::new(&self.project.key, &self.slug)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketUser {
    name: String,
    #[serde(default)]
    email_address: Option<String>,
}

impl From<BitbucketUser> for User {
    fn from(user: BitbucketUser) -> Self {
        User {
            name: user.name,
            email: user.email_address.filter(|e| !e.is_empty()),
            avatar: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketRef {
    id: String,
    display_id: String,
    #[serde(default)]
    latest_commit: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketParent {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketCommit {
    id: String,
    #[serde(default)]
    message: String,
    author: BitbucketUser,
    author_timestamp: i64,
    #[serde(default)]
    parents: Vec<BitbucketParent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketParticipant {
    user: BitbucketUser,
    #[serde(default)]
    approved: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketPullRequestRef {
    display_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketPullRequest {
    id: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    author: BitbucketParticipant,
    from_ref: BitbucketPullRequestRef,
    to_ref: BitbucketPullRequestRef,
    #[serde(default)]
    reviewers: Vec<BitbucketParticipant>,
    state: String,
    created_date: i64,
    updated_date: i64,
    #[serde(default)]
    links: BitbucketLinks,
}

#[derive(Debug, Serialize)]
struct BitbucketRefId {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketCreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    from_ref: BitbucketRefId,
    to_ref: BitbucketRefId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketChangedRef {
    display_id: String,
    #[serde(rename = "type")]
    ref_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketRefChange {
    #[serde(rename = "ref")]
    git_ref: BitbucketChangedRef,
    #[serde(rename = "type")]
    change_type: String,
    #[serde(default)]
    to_hash: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketRefsChanged {
    repository: BitbucketRepository,
    #[serde(default)]
    changes: Vec<BitbucketRefChange>,
}

#[derive(Debug, Deserialize)]
struct BitbucketEventRef {
    repository: BitbucketRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketEventPullRequest {
    id: u64,
    to_ref: BitbucketEventRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BitbucketPullRequestEvent {
    pull_request: BitbucketEventPullRequest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> BackendConfig {
        BackendConfig::new("bitbucket", BackendKind::Bitbucket, url, "ssh://git@bitbucket.example.com*")
            .with_token("bbtoken")
            .with_page_size(2)
    }

    fn repository() -> Repository {
        Repository::new(
            "bitbucket",
            "PLAT",
            "billing",
            "ssh://git@bitbucket.example.com:7999/plat/billing.git",
            "https://bitbucket.example.com/projects/PLAT/repos/billing/browse",
        )
    }

    fn commit_json(id: &str, timestamp: i64, parents: &[&str]) -> serde_json::Value {
        json!({
            "id": id,
            "message": "BILL-7 work",
            "author": {"name": "dev", "emailAddress": "dev@example.com"},
            "authorTimestamp": timestamp,
            "parents": parents.iter().map(|p| json!({"id": p})).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_get_repository_picks_ssh_clone_link() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/api/1.0/projects/PLAT/repos/billing"))
            .and(header("authorization", "Bearer bbtoken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "slug": "billing",
                "project": {"key": "PLAT"},
                "links": {
                    "clone": [
                        {"href": "https://bitbucket.example.com/scm/plat/billing.git", "name": "http"},
                        {"href": "ssh://git@bitbucket.example.com:7999/plat/billing.git", "name": "ssh"}
                    ],
                    "self": [{"href": "https://bitbucket.example.com/projects/PLAT/repos/billing/browse"}]
                }
            })))
            .mount(&server)
            .await;

        let client = BitbucketClient::new(&config(&server.uri())).unwrap();
        let repo = client
            .get_repository(&RepositoryCoordinates::new("PLAT", "billing"))
            .await
            .unwrap();

        assert_eq!(repo, repository());
    }

    #[tokio::test]
    async fn test_branches_follow_next_page_start() {
        let server = MockServer::start().await;
        let branches = "/rest/api/1.0/projects/PLAT/repos/billing/branches";
        Mock::given(path(branches))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    {"id": "refs/heads/main", "displayId": "main", "latestCommit": "c2"},
                    {"id": "refs/heads/develop", "displayId": "develop", "latestCommit": "c1"}
                ],
                "isLastPage": false,
                "nextPageStart": 2
            })))
            .mount(&server)
            .await;
        Mock::given(path(branches))
            .and(query_param("start", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [{"id": "refs/heads/hotfix", "displayId": "hotfix", "latestCommit": "c3"}],
                "isLastPage": true
            })))
            .mount(&server)
            .await;

        let client = BitbucketClient::new(&config(&server.uri())).unwrap();
        let refs = client.get_branches(&repository()).await.unwrap();

        let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["main", "develop", "hotfix"]);
    }

    #[tokio::test]
    async fn test_date_range_stops_at_older_commit() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/api/1.0/projects/PLAT/repos/billing/commits"))
            .and(query_param("until", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    commit_json("c3", 1_709_300_000_000, &["c2"]),
                    commit_json("c2", 1_709_200_000_000, &["c1"])
                ],
                "isLastPage": false,
                "nextPageStart": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BitbucketClient::new(&config(&server.uri())).unwrap();
        let since = millis(1_709_250_000_000);
        let commits = client
            .get_commits_between(&repository(), Some(&RangeStart::Date(since)), "main")
            .await
            .unwrap();

        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].hash, "c3");
    }

    #[test]
    fn test_parse_refs_changed() {
        let client = BitbucketClient::new(&config("http://localhost")).unwrap();
        let headers = WebhookHeaders::new().with(EVENT_HEADER, "repo:refs_changed");
        let body = json!({
            "repository": {"slug": "billing", "project": {"key": "PLAT"}},
            "changes": [
                {"ref": {"id": "refs/heads/new", "displayId": "new", "type": "BRANCH"}, "type": "ADD", "toHash": "c9"},
                {"ref": {"id": "refs/tags/v0", "displayId": "v0", "type": "TAG"}, "type": "DELETE", "toHash": "0000"},
                {"ref": {"id": "refs/heads/main", "displayId": "main", "type": "BRANCH"}, "type": "UPDATE", "toHash": "c8"}
            ]
        });

        let events = client
            .parse_webhook(&headers, body.to_string().as_bytes())
            .unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], WebhookEvent::RefCreated { name, .. } if name == "new"));
        assert!(matches!(&events[1], WebhookEvent::RefDeleted { ref_type: RefType::Tag, .. }));
        assert!(matches!(&events[2], WebhookEvent::Pushed { commit_ids, .. } if commit_ids == &["c8"]));
        assert_eq!(events[0].coordinates(), &RepositoryCoordinates::new("PLAT", "billing"));
    }

    #[test]
    fn test_parse_pull_request_event() {
        let client = BitbucketClient::new(&config("http://localhost")).unwrap();
        let headers = WebhookHeaders::new().with(EVENT_HEADER, "pr:reviewer:approved");
        let body = json!({
            "pullRequest": {
                "id": 31,
                "toRef": {"repository": {"slug": "billing", "project": {"key": "PLAT"}}}
            }
        });

        let events = client
            .parse_webhook(&headers, body.to_string().as_bytes())
            .unwrap();

        assert!(matches!(&events[..], [WebhookEvent::PullRequestChanged { index: 31, .. }]));
    }

    #[test]
    fn test_unknown_event_key_is_ignored() {
        let client = BitbucketClient::new(&config("http://localhost")).unwrap();
        let headers = WebhookHeaders::new().with(EVENT_HEADER, "repo:comment:added");
        assert!(client.parse_webhook(&headers, b"{}").unwrap().is_empty());
    }
}
