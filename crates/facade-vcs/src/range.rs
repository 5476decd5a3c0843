//! Commit-range resolution.
//!
//! A range is `(fromRef | fromDate, toRef)`. Backends with a native "commits
//! between" query answer it directly; for the others the resolver loads the
//! most recent part of the commit graph and walks it locally.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use facade_core::{Commit, FacadeError, Repository, Result};

use crate::client::VcsClient;

/// Lower bound of a commit range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeStart {
    /// Exclude everything reachable from this ref or hash.
    Ref(String),
    /// Keep only commits authored at or after this instant.
    Date(DateTime<Utc>),
}

/// How a backend computes commit ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStrategy {
    /// The backend answers range queries itself.
    Native,
    /// The resolver walks the latest `depth` commits reachable from `to`,
    /// fetched `page_size` at a time.
    GraphWalk { depth: usize, page_size: u32 },
}

/// A commit range query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    #[serde(default, alias = "fromId")]
    pub from_ref: Option<String>,
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(alias = "toId")]
    pub to_ref: String,
}

impl RangeQuery {
    /// Creates a query for everything reachable from `to_ref`.
    pub fn to(to_ref: impl Into<String>) -> Self {
        Self {
            from_ref: None,
            from_date: None,
            to_ref: to_ref.into(),
        }
    }

    /// Builder-style method to exclude commits reachable from `from_ref`.
    pub fn from_ref(mut self, from_ref: impl Into<String>) -> Self {
        self.from_ref = Some(from_ref.into());
        self
    }

    /// Builder-style method to keep commits authored since `date`.
    pub fn from_date(mut self, date: DateTime<Utc>) -> Self {
        self.from_date = Some(date);
        self
    }

    /// Validates the query and returns its lower bound.
    ///
    /// # Errors
    ///
    /// - `FacadeError::ArgumentsNotCompatible` if both a ref and a date are set
    pub fn start(&self) -> Result<Option<RangeStart>> {
        match (&self.from_ref, self.from_date) {
            (Some(_), Some(_)) => Err(FacadeError::arguments_not_compatible(
                "'fromId' and 'fromDate' cannot be used together",
            )),
            (Some(from_ref), None) => Ok(Some(RangeStart::Ref(from_ref.clone()))),
            (None, Some(date)) => Ok(Some(RangeStart::Date(date))),
            (None, None) => Ok(None),
        }
    }

    /// Returns true if the range starts and ends at the same ref.
    pub fn is_empty_range(&self) -> bool {
        self.from_ref.as_deref() == Some(self.to_ref.as_str())
    }
}

/// Resolves commit ranges against one backend.
pub struct RangeResolver<'a> {
    client: &'a dyn VcsClient,
}

impl<'a> RangeResolver<'a> {
    pub fn new(client: &'a dyn VcsClient) -> Self {
        Self { client }
    }

    /// Returns the commits in `query` for `repository`.
    ///
    /// Order is traversal order, not chronological; callers needing
    /// chronological order sort by date.
    ///
    /// # Errors
    ///
    /// - `FacadeError::ArgumentsNotCompatible` before any backend call if
    ///   both `fromRef` and `fromDate` are given
    /// - `FacadeError::NotFound` if a ref is absent or `fromRef` is not an
    ///   ancestor of `toRef`
    pub async fn resolve(&self, repository: &Repository, query: &RangeQuery) -> Result<Vec<Commit>> {
        let start = query.start()?;
        if query.is_empty_range() {
            return Ok(Vec::new());
        }

        debug!(
            repository = %repository,
            from = ?start,
            to = %query.to_ref,
            "Resolving commit range"
        );

        match self.client.range_strategy() {
            RangeStrategy::Native => self.resolve_native(repository, start, &query.to_ref).await,
            RangeStrategy::GraphWalk { depth, page_size } => {
                let graph = self
                    .load_graph(repository, &query.to_ref, depth, page_size)
                    .await?;
                self.walk(repository, &graph, start, &query.to_ref).await
            },
        }
    }

    async fn resolve_native(
        &self,
        repository: &Repository,
        start: Option<RangeStart>,
        to: &str,
    ) -> Result<Vec<Commit>> {
        let Some(RangeStart::Ref(from)) = &start else {
            return self
                .client
                .get_commits_between(repository, start.as_ref(), to)
                .await;
        };

        let from_commit = self.client.get_commit(repository, from).await?;
        let to_commit = self.client.get_commit(repository, to).await?;
        if from_commit.hash == to_commit.hash {
            return Ok(Vec::new());
        }

        let commits = self
            .client
            .get_commits_between(repository, start.as_ref(), to)
            .await?;

        if commits.iter().any(|c| c.has_parent(&from_commit.hash)) {
            Ok(commits)
        } else {
            Err(not_in_graph(from, to))
        }
    }

    /// Fetches up to `depth` commits reachable from `to`, keyed by hash.
    async fn load_graph(
        &self,
        repository: &Repository,
        to: &str,
        depth: usize,
        page_size: u32,
    ) -> Result<CommitGraph> {
        let mut graph = CommitGraph::default();
        let page_size = page_size.max(1);
        let mut page = 1;

        while graph.len() < depth {
            let commits = self
                .client
                .list_commits(repository, to, page, page_size)
                .await?;
            let fetched = commits.len();

            for commit in commits.into_iter().take(depth - graph.len()) {
                graph.insert(commit);
            }

            if fetched < page_size as usize {
                break;
            }
            page += 1;
        }

        debug!(
            repository = %repository,
            to = %to,
            commits = graph.len(),
            "Loaded commit graph"
        );

        Ok(graph)
    }

    async fn walk(
        &self,
        repository: &Repository,
        graph: &CommitGraph,
        start: Option<RangeStart>,
        to: &str,
    ) -> Result<Vec<Commit>> {
        // Listings are ordered by date, which need not follow ancestry.
        let head = self.client.get_commit(repository, to).await?;
        if !graph.contains(&head.hash) {
            return Err(FacadeError::not_found(format!(
                "commit '{}' for '{}' is outside the loaded graph of {}",
                head.hash, to, repository
            )));
        }

        let released = match &start {
            Some(RangeStart::Ref(from)) => {
                let from_commit = self.client.get_commit(repository, from).await?;
                if !graph.contains(&from_commit.hash) {
                    return Err(not_in_graph(from, to));
                }
                graph.reachable_from(&from_commit.hash)
            },
            _ => HashSet::new(),
        };

        let mut commits = graph.collect_until(&head.hash, &released);

        if let Some(RangeStart::Date(since)) = start {
            commits.retain(|c| c.date >= since);
        }

        Ok(commits)
    }
}

fn not_in_graph(from: &str, to: &str) -> FacadeError {
    FacadeError::not_found(format!(
        "cannot find commit '{}' in the graph for '{}'",
        from, to
    ))
}

/// In-memory commit graph keyed by hash.
#[derive(Debug, Default)]
pub struct CommitGraph {
    commits: HashMap<String, Commit>,
}

impl CommitGraph {
    pub fn insert(&mut self, commit: Commit) {
        self.commits.insert(commit.hash.clone(), commit);
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.commits.contains_key(hash)
    }

    /// Hashes of every loaded commit reachable from `hash`, itself included.
    pub fn reachable_from(&self, hash: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![hash.to_string()];
        while let Some(current) = stack.pop() {
            let Some(commit) = self.commits.get(&current) else {
                continue;
            };
            if seen.insert(current) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Depth-first walk from `head` over parent edges, visiting each commit
    /// once and stopping at `released` commits.
    pub fn collect_until(&self, head: &str, released: &HashSet<String>) -> Vec<Commit> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![head.to_string()];

        while let Some(hash) = stack.pop() {
            if released.contains(&hash) || !visited.insert(hash.clone()) {
                continue;
            }
            // Parents older than the loaded window are not part of the result.
            let Some(commit) = self.commits.get(&hash) else {
                continue;
            };
            result.push(commit.clone());
            stack.extend(commit.parents.iter().rev().cloned());
        }

        result
    }
}
