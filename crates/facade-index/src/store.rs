//! Cursor-paginated document collections.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use facade_core::{
    Commit, Document, FacadeError, PullRequest, Ref, Repository, RepositoryInfo, Result,
    is_issue_key,
};

/// A collection of one document family.
///
/// Documents are ordered by id; pagination is "first `limit` documents with
/// an id greater than `cursor`", optionally restricted to one repository.
///
/// # Implementors
///
/// - `InMemoryDocumentStore` - ordered map guarded by a lock
#[async_trait]
pub trait DocumentStore<D: Document>: Send + Sync {
    /// Returns up to `limit` documents with ids after `cursor`.
    async fn first_after(
        &self,
        repository_id: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<D>>;

    /// Returns one document by id.
    async fn get(&self, id: &str) -> Result<Option<D>>;

    /// Inserts or overwrites documents by id. Returns the number written.
    async fn upsert_many(&self, documents: Vec<D>) -> Result<usize>;

    /// Deletes documents by id. Returns the number removed.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<usize>;

    /// Deletes every document of a repository. Returns the number removed.
    async fn delete_by_repository(&self, repository_id: &str) -> Result<usize>;

    /// Returns the documents whose searchable text mentions `issue_key`.
    async fn find_mentioning(&self, issue_key: &str) -> Result<Vec<D>>;
}

/// Pages through a collection and returns every matching document id.
pub async fn collect_ids<D: Document>(
    store: &dyn DocumentStore<D>,
    repository_id: Option<&str>,
    batch_size: usize,
) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .first_after(repository_id, cursor.as_deref(), batch_size)
            .await?;
        let fetched = page.len();
        cursor = page.last().map(|d| d.id().to_string());
        ids.extend(page.iter().map(|d| d.id().to_string()));
        if fetched < batch_size || cursor.is_none() {
            return Ok(ids);
        }
    }
}

/// Pages through a collection and returns every matching document.
pub async fn collect_all<D: Document>(
    store: &dyn DocumentStore<D>,
    repository_id: Option<&str>,
    batch_size: usize,
) -> Result<Vec<D>> {
    let mut documents = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .first_after(repository_id, cursor.as_deref(), batch_size)
            .await?;
        let fetched = page.len();
        cursor = page.last().map(|d| d.id().to_string());
        documents.extend(page);
        if fetched < batch_size || cursor.is_none() {
            return Ok(documents);
        }
    }
}

/// In-memory collection ordered by document id.
pub struct InMemoryDocumentStore<D> {
    documents: RwLock<BTreeMap<String, D>>,
}

impl<D: Document> InMemoryDocumentStore<D> {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl<D: Document> Default for InMemoryDocumentStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D: Document> DocumentStore<D> for InMemoryDocumentStore<D> {
    async fn first_after(
        &self,
        repository_id: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<D>> {
        let documents = self.documents.read();
        let lower = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };
        Ok(documents
            .range((lower, Bound::Unbounded))
            .map(|(_, d)| d)
            .filter(|d| repository_id.is_none_or(|r| d.repository_id() == r))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<D>> {
        Ok(self.documents.read().get(id).cloned())
    }

    async fn upsert_many(&self, documents: Vec<D>) -> Result<usize> {
        let count = documents.len();
        let mut store = self.documents.write();
        for document in documents {
            store.insert(document.id().to_string(), document);
        }
        debug!(family = D::FAMILY, count, "Upserted documents");
        Ok(count)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        let mut store = self.documents.write();
        let removed = ids.iter().filter(|id| store.remove(*id).is_some()).count();
        debug!(family = D::FAMILY, removed, "Deleted documents by id");
        Ok(removed)
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<usize> {
        let mut store = self.documents.write();
        let before = store.len();
        store.retain(|_, d| d.repository_id() != repository_id);
        let removed = before - store.len();
        debug!(family = D::FAMILY, repository_id, removed, "Deleted repository documents");
        Ok(removed)
    }

    async fn find_mentioning(&self, issue_key: &str) -> Result<Vec<D>> {
        Ok(self
            .documents
            .read()
            .values()
            .filter(|d| d.mentions_issue(issue_key))
            .cloned()
            .collect())
    }
}

/// Everything indexed about one repository that mentions an issue key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReferences {
    pub repository: Repository,
    pub branches: Vec<Ref>,
    pub commits: Vec<Commit>,
    pub pull_requests: Vec<PullRequest>,
}

/// The four indexed collections.
#[derive(Clone)]
pub struct IndexStore {
    pub repositories: Arc<dyn DocumentStore<RepositoryInfo>>,
    pub refs: Arc<dyn DocumentStore<Ref>>,
    pub commits: Arc<dyn DocumentStore<Commit>>,
    pub pull_requests: Arc<dyn DocumentStore<PullRequest>>,
}

impl IndexStore {
    /// Creates an index backed by in-memory collections.
    pub fn in_memory() -> Self {
        Self {
            repositories: Arc::new(InMemoryDocumentStore::<RepositoryInfo>::new()),
            refs: Arc::new(InMemoryDocumentStore::<Ref>::new()),
            commits: Arc::new(InMemoryDocumentStore::<Commit>::new()),
            pull_requests: Arc::new(InMemoryDocumentStore::<PullRequest>::new()),
        }
    }

    /// Returns the scan record of `repository`, creating one flagged for
    /// scanning on first sighting.
    pub async fn ensure_info(&self, repository: &Repository) -> Result<RepositoryInfo> {
        if let Some(info) = self.repositories.get(&repository.id).await? {
            return Ok(info);
        }
        let info = RepositoryInfo::discovered(repository.clone());
        self.repositories.upsert_many(vec![info.clone()]).await?;
        debug!(repository = %repository, "Discovered repository");
        Ok(info)
    }

    /// Flags `repository` for scanning, creating its record if needed.
    pub async fn require_scan(&self, repository: &Repository) -> Result<RepositoryInfo> {
        let info = self.ensure_info(repository).await?;
        if info.scan_required {
            return Ok(info);
        }
        let info = info.require_scan();
        self.repositories.upsert_many(vec![info.clone()]).await?;
        Ok(info)
    }

    /// Every scan record, in id order.
    pub async fn all_infos(&self, batch_size: usize) -> Result<Vec<RepositoryInfo>> {
        collect_all(self.repositories.as_ref(), None, batch_size).await
    }

    /// Removes a repository and everything indexed under it.
    ///
    /// Children go first so that a reader never sees documents of a
    /// repository whose record is already gone.
    pub async fn teardown(&self, repository_id: &str) -> Result<()> {
        self.pull_requests.delete_by_repository(repository_id).await?;
        self.commits.delete_by_repository(repository_id).await?;
        self.refs.delete_by_repository(repository_id).await?;
        self.repositories
            .delete_by_ids(&[repository_id.to_string()])
            .await?;
        Ok(())
    }

    /// Finds branches, commits and pull requests mentioning `issue_key`,
    /// grouped by repository.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` if `issue_key` is not an issue key.
    pub async fn find_issue(&self, issue_key: &str) -> Result<Vec<IssueReferences>> {
        if !is_issue_key(issue_key) {
            return Err(FacadeError::invalid_argument(format!(
                "'{}' is not an issue key",
                issue_key
            )));
        }

        let branches = self.refs.find_mentioning(issue_key).await?;
        let commits = self.commits.find_mentioning(issue_key).await?;
        let pull_requests = self.pull_requests.find_mentioning(issue_key).await?;

        let mut grouped: BTreeMap<String, (Vec<Ref>, Vec<Commit>, Vec<PullRequest>)> = BTreeMap::new();
        for branch in branches.into_iter().filter(Ref::is_branch) {
            grouped.entry(branch.repository_id.clone()).or_default().0.push(branch);
        }
        for commit in commits {
            grouped.entry(commit.repository_id.clone()).or_default().1.push(commit);
        }
        for pull_request in pull_requests {
            grouped
                .entry(pull_request.repository_id.clone())
                .or_default()
                .2
                .push(pull_request);
        }

        let mut repositories: HashMap<String, Repository> = HashMap::new();
        for repository_id in grouped.keys() {
            if let Some(info) = self.repositories.get(repository_id).await? {
                repositories.insert(repository_id.clone(), info.repository);
            }
        }

        Ok(grouped
            .into_iter()
            .filter_map(|(repository_id, (branches, commits, pull_requests))| {
                repositories.remove(&repository_id).map(|repository| IssueReferences {
                    repository,
                    branches,
                    commits,
                    pull_requests,
                })
            })
            .collect())
    }
}
