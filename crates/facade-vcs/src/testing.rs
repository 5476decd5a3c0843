//! In-memory backend for tests and benchmarks.
//!
//! Enabled for this crate's own tests and, for dependents, through the
//! `testing` feature.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;

use facade_core::{
    Commit, FacadeError, PullRequest, PullRequestReviewer, PullRequestStatus, Ref, RefType,
    Repository, RepositoryCoordinates, Result, User,
};

use crate::client::{BackendKind, NewPullRequest, VcsClient};
use crate::range::{RangeStart, RangeStrategy};
use crate::webhook::{WebhookEvent, WebhookHeaders, parse_body};

/// Header the fake backend reads webhook signatures from.
pub const FAKE_SIGNATURE_HEADER: &str = "X-Fake-Signature";

struct FakeRepository {
    repository: Repository,
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    commits: HashMap<String, Commit>,
    pull_requests: BTreeMap<u64, PullRequest>,
}

#[derive(Default)]
struct FakeState {
    repositories: BTreeMap<String, FakeRepository>,
    calls: HashMap<&'static str, usize>,
    failure: Option<FacadeError>,
    clock: i64,
}

/// A scriptable [`VcsClient`] holding repositories in memory.
///
/// Commits get strictly increasing author dates in insertion order. Webhook
/// bodies are a JSON array of [`WebhookEvent`]s.
#[derive(Clone)]
pub struct FakeVcsClient {
    service_id: String,
    strategy: RangeStrategy,
    latency: Option<Duration>,
    state: Arc<RwLock<FakeState>>,
}

impl Default for FakeRepository {
    fn default() -> Self {
        Self {
            repository: Repository::new("", "", "", "", ""),
            branches: BTreeMap::new(),
            tags: BTreeMap::new(),
            commits: HashMap::new(),
            pull_requests: BTreeMap::new(),
        }
    }
}

impl FakeVcsClient {
    /// Creates an empty backend with a native range strategy.
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            strategy: RangeStrategy::Native,
            latency: None,
            state: Arc::new(RwLock::new(FakeState::default())),
        }
    }

    /// Builder-style method to select the range strategy.
    pub fn with_range_strategy(mut self, strategy: RangeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder-style method to delay every backend call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Base time of the fake clock.
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    // ============================================
    // Fixture setup
    // ============================================

    /// Adds (or replaces) a repository.
    pub fn add_repository(&self, group: &str, name: &str) -> Repository {
        let repository = Repository::new(
            &self.service_id,
            group,
            name,
            format!("ssh://git@{}.example.com/{}/{}.git", self.service_id, group, name),
            format!("https://{}.example.com/{}/{}", self.service_id, group, name),
        );
        self.state.write().repositories.insert(
            repository.id.clone(),
            FakeRepository {
                repository: repository.clone(),
                ..FakeRepository::default()
            },
        );
        repository
    }

    /// Deletes a repository and everything in it.
    pub fn remove_repository(&self, repository: &Repository) {
        self.state.write().repositories.remove(&repository.id);
    }

    /// Renames a repository, keeping its content. Returns the new identity.
    pub fn rename_repository(&self, repository: &Repository, name: &str) -> Repository {
        let mut state = self.state.write();
        let renamed = Repository::new(
            &self.service_id,
            &repository.group,
            name,
            format!("ssh://git@{}.example.com/{}/{}.git", self.service_id, repository.group, name),
            format!("https://{}.example.com/{}/{}", self.service_id, repository.group, name),
        );
        if let Some(mut content) = state.repositories.remove(&repository.id) {
            content.repository = renamed.clone();
            state.repositories.insert(renamed.id.clone(), content);
        }
        renamed
    }

    /// Adds a commit authored one minute after the previous one.
    pub fn add_commit(
        &self,
        repository: &Repository,
        hash: &str,
        parents: &[&str],
        message: &str,
    ) -> Commit {
        let mut state = self.state.write();
        state.clock += 1;
        let commit = Commit::new(
            &repository.id,
            hash,
            message,
            Self::epoch() + chrono::Duration::minutes(state.clock),
            User::new("dev").with_email("dev@example.com"),
            parents.iter().map(|p| p.to_string()).collect(),
            format!("{}/commit/{}", repository.web_link, hash),
        );
        if let Some(repo) = state.repositories.get_mut(&repository.id) {
            repo.commits.insert(hash.to_string(), commit.clone());
        }
        commit
    }

    /// Author date of a commit, or the epoch if unknown.
    pub fn commit_date(&self, hash: &str) -> DateTime<Utc> {
        self.state
            .read()
            .repositories
            .values()
            .find_map(|r| r.commits.get(hash).map(|c| c.date))
            .unwrap_or_else(Self::epoch)
    }

    /// Points a branch at a commit, creating it if needed.
    pub fn set_branch(&self, repository: &Repository, name: &str, hash: &str) {
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.branches.insert(name.to_string(), hash.to_string());
        }
    }

    pub fn remove_branch(&self, repository: &Repository, name: &str) {
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.branches.remove(name);
        }
    }

    /// Points a tag at a commit, creating it if needed.
    pub fn set_tag(&self, repository: &Repository, name: &str, hash: &str) {
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.tags.insert(name.to_string(), hash.to_string());
        }
    }

    pub fn remove_tag(&self, repository: &Repository, name: &str) {
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.tags.remove(name);
        }
    }

    /// Adds an open pull request.
    pub fn add_pull_request(
        &self,
        repository: &Repository,
        index: u64,
        title: &str,
        source: &str,
        target: &str,
    ) -> PullRequest {
        let pull_request = PullRequest {
            id: PullRequest::id_for(&repository.id, index),
            repository_id: repository.id.clone(),
            index,
            title: title.to_string(),
            description: String::new(),
            author: User::new("dev"),
            source: source.to_string(),
            target: target.to_string(),
            assignees: Vec::new(),
            reviewers: Vec::new(),
            status: PullRequestStatus::Open,
            created_at: Self::epoch(),
            updated_at: Self::epoch(),
            link: format!("{}/pulls/{}", repository.web_link, index),
        };
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.pull_requests.insert(index, pull_request.clone());
        }
        pull_request
    }

    /// Replaces the reviewers of a pull request.
    pub fn set_reviewers(&self, repository: &Repository, index: u64, reviewers: Vec<PullRequestReviewer>) {
        if let Some(pr) = self
            .state
            .write()
            .repositories
            .get_mut(&repository.id)
            .and_then(|r| r.pull_requests.get_mut(&index))
        {
            pr.reviewers = reviewers;
        }
    }

    pub fn remove_pull_request(&self, repository: &Repository, index: u64) {
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.pull_requests.remove(&index);
        }
    }

    // ============================================
    // Failure injection and call accounting
    // ============================================

    /// Makes every subsequent call fail with `error`.
    pub fn fail_with(&self, error: FacadeError) {
        self.state.write().failure = Some(error);
    }

    /// Clears an injected failure.
    pub fn recover(&self) {
        self.state.write().failure = None;
    }

    /// Total number of backend calls made.
    pub fn call_count(&self) -> usize {
        self.state.read().calls.values().sum()
    }

    /// Number of calls made to one operation, e.g. `"get_repository"`.
    pub fn calls_to(&self, operation: &str) -> usize {
        self.state.read().calls.get(operation).copied().unwrap_or(0)
    }

    async fn enter(&self, operation: &'static str) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.write();
        *state.calls.entry(operation).or_insert(0) += 1;
        match &state.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn with_repo<T>(
        &self,
        repository: &Repository,
        f: impl FnOnce(&FakeRepository) -> Result<T>,
    ) -> Result<T> {
        let state = self.state.read();
        let repo = state
            .repositories
            .get(&repository.id)
            .ok_or_else(|| FacadeError::not_found(format!("repository {}", repository)))?;
        f(repo)
    }
}

impl FakeRepository {
    fn resolve(&self, rev: &str) -> Result<&Commit> {
        let hash = self
            .branches
            .get(rev)
            .or_else(|| self.tags.get(rev))
            .map(String::as_str)
            .unwrap_or(rev);
        self.commits
            .get(hash)
            .ok_or_else(|| FacadeError::not_found(format!("commit '{}' in {}", rev, self.repository)))
    }

    fn reachable(&self, hash: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![hash.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(commit) = self.commits.get(&current)
                && seen.insert(current)
            {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Commits in `hashes`, newest first.
    fn ordered(&self, hashes: &HashSet<String>) -> Vec<Commit> {
        let mut commits: Vec<Commit> = hashes
            .iter()
            .filter_map(|h| self.commits.get(h).cloned())
            .collect();
        commits.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.hash.cmp(&b.hash)));
        commits
    }

    fn refs(&self, ref_type: RefType) -> Vec<Ref> {
        let source = match ref_type {
            RefType::Branch => &self.branches,
            RefType::Tag => &self.tags,
        };
        source
            .iter()
            .map(|(name, hash)| {
                Ref::new(
                    &self.repository.id,
                    ref_type,
                    name,
                    hash,
                    format!("{}/src/{}", self.repository.web_link, name),
                )
            })
            .collect()
    }
}

#[async_trait]
impl VcsClient for FakeVcsClient {
    fn service_id(&self) -> &str {
        &self.service_id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gitea
    }

    fn range_strategy(&self) -> RangeStrategy {
        self.strategy
    }

    fn signature_header(&self) -> &'static str {
        FAKE_SIGNATURE_HEADER
    }

    async fn get_repository(&self, coordinates: &RepositoryCoordinates) -> Result<Repository> {
        self.enter("get_repository").await?;
        self.state
            .read()
            .repositories
            .values()
            .map(|r| &r.repository)
            .find(|r| r.group == coordinates.group && r.name == coordinates.name)
            .cloned()
            .ok_or_else(|| FacadeError::not_found(format!("repository {}", coordinates)))
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.enter("list_repositories").await?;
        Ok(self
            .state
            .read()
            .repositories
            .values()
            .map(|r| r.repository.clone())
            .collect())
    }

    async fn get_branches(&self, repository: &Repository) -> Result<Vec<Ref>> {
        self.enter("get_branches").await?;
        self.with_repo(repository, |r| Ok(r.refs(RefType::Branch)))
    }

    async fn get_tags(&self, repository: &Repository) -> Result<Vec<Ref>> {
        self.enter("get_tags").await?;
        self.with_repo(repository, |r| Ok(r.refs(RefType::Tag)))
    }

    async fn get_commit(&self, repository: &Repository, commit_id: &str) -> Result<Commit> {
        self.enter("get_commit").await?;
        self.with_repo(repository, |r| r.resolve(commit_id).cloned())
    }

    async fn list_commits(
        &self,
        repository: &Repository,
        to: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Commit>> {
        self.enter("list_commits").await?;
        self.with_repo(repository, |r| {
            let head = r.resolve(to)?;
            let skip = page.saturating_sub(1) as usize * page_size as usize;
            Ok(r.ordered(&r.reachable(&head.hash))
                .into_iter()
                .skip(skip)
                .take(page_size as usize)
                .collect())
        })
    }

    async fn get_commits_between(
        &self,
        repository: &Repository,
        from: Option<&RangeStart>,
        to: &str,
    ) -> Result<Vec<Commit>> {
        self.enter("get_commits_between").await?;
        self.with_repo(repository, |r| {
            let head = r.resolve(to)?;
            let mut hashes = r.reachable(&head.hash);
            let mut since = None;
            match from {
                Some(RangeStart::Ref(from)) => {
                    let base = r.resolve(from)?;
                    for released in r.reachable(&base.hash) {
                        hashes.remove(&released);
                    }
                },
                Some(RangeStart::Date(date)) => since = Some(*date),
                None => {},
            }
            let mut commits = r.ordered(&hashes);
            if let Some(since) = since {
                commits.retain(|c| c.date >= since);
            }
            Ok(commits)
        })
    }

    async fn create_pull_request(
        &self,
        repository: &Repository,
        request: &NewPullRequest,
    ) -> Result<PullRequest> {
        self.enter("create_pull_request").await?;
        let index = self.with_repo(repository, |r| {
            if !r.branches.contains_key(&request.source_branch) {
                return Err(FacadeError::not_found(format!(
                    "branch '{}' in {}",
                    request.source_branch, repository
                )));
            }
            Ok(r.pull_requests.keys().next_back().copied().unwrap_or(0) + 1)
        })?;
        let mut pull_request = self.add_pull_request(
            repository,
            index,
            &request.title,
            &request.source_branch,
            &request.target_branch,
        );
        pull_request.description = request.description.clone();
        if let Some(repo) = self.state.write().repositories.get_mut(&repository.id) {
            repo.pull_requests.insert(index, pull_request.clone());
        }
        Ok(pull_request)
    }

    async fn get_pull_requests(&self, repository: &Repository) -> Result<Vec<PullRequest>> {
        self.enter("get_pull_requests").await?;
        self.with_repo(repository, |r| Ok(r.pull_requests.values().cloned().collect()))
    }

    async fn get_pull_request(&self, repository: &Repository, index: u64) -> Result<PullRequest> {
        self.enter("get_pull_request").await?;
        self.with_repo(repository, |r| {
            r.pull_requests.get(&index).cloned().ok_or_else(|| {
                FacadeError::not_found(format!("pull request #{} in {}", index, repository))
            })
        })
    }

    async fn get_pull_request_reviews(
        &self,
        repository: &Repository,
        index: u64,
    ) -> Result<Vec<PullRequestReviewer>> {
        self.enter("get_pull_request_reviews").await?;
        self.with_repo(repository, |r| {
            r.pull_requests
                .get(&index)
                .map(|pr| pr.reviewers.clone())
                .ok_or_else(|| {
                    FacadeError::not_found(format!("pull request #{} in {}", index, repository))
                })
        })
    }

    fn parse_webhook(&self, _headers: &WebhookHeaders, body: &[u8]) -> Result<Vec<WebhookEvent>> {
        parse_body(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_commits_pages_newest_first() {
        let client = FakeVcsClient::new("fake");
        let repo = client.add_repository("team", "service");
        client.add_commit(&repo, "c1", &[], "one");
        client.add_commit(&repo, "c2", &["c1"], "two");
        client.add_commit(&repo, "c3", &["c2"], "three");
        client.set_branch(&repo, "main", "c3");

        let first = client.list_commits(&repo, "main", 1, 2).await.unwrap();
        let second = client.list_commits(&repo, "main", 2, 2).await.unwrap();

        assert_eq!(first.iter().map(|c| c.hash.as_str()).collect::<Vec<_>>(), vec!["c3", "c2"]);
        assert_eq!(second.len(), 1);
        assert_eq!(client.calls_to("list_commits"), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let client = FakeVcsClient::new("fake");
        client.fail_with(FacadeError::unexpected("backend down"));
        assert!(client.list_repositories().await.is_err());
        client.recover();
        assert!(client.list_repositories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_changes_identity() {
        let client = FakeVcsClient::new("fake");
        let repo = client.add_repository("team", "old");
        let renamed = client.rename_repository(&repo, "new");

        assert_ne!(repo.id, renamed.id);
        assert!(
            client
                .get_repository(&RepositoryCoordinates::new("team", "old"))
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(
            client
                .get_repository(&RepositoryCoordinates::new("team", "new"))
                .await
                .unwrap(),
            renamed
        );
    }
}
