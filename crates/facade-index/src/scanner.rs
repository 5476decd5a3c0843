//! Reconciliation scans.
//!
//! A scan compares everything indexed for one repository with the live
//! backend state: documents whose identity is gone upstream are deleted,
//! every live document is upserted. Ids are pure functions of identity, so
//! running a scan twice without upstream changes is a no-op.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use facade_core::{Commit, Document, FacadeError, Ref, Repository, RepositoryInfo, Result};
use facade_vcs::{BackendRegistry, VcsClient};

use crate::store::{DocumentStore, IndexStore, collect_ids};

/// Scan tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Page size for index reads and batch size for index writes.
    pub batch_size: usize,
    /// Maximum commits fetched per branch or tag.
    pub max_commits_per_ref: usize,
    /// Page size for backend commit listings.
    pub page_size: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_commits_per_ref: 1000,
            page_size: 50,
        }
    }
}

/// Upsert and orphan-deletion counts for one document family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FamilyReport {
    pub upserted: usize,
    pub deleted: usize,
}

/// Outcome of one repository scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanReport {
    /// The index now mirrors the live repository.
    Reconciled {
        repository_id: String,
        refs: FamilyReport,
        commits: FamilyReport,
        pull_requests: FamilyReport,
    },
    /// The repository vanished upstream and was torn down.
    Removed { repository_id: String },
}

impl ScanReport {
    /// Total orphan deletions of a reconciled scan.
    pub fn deleted(&self) -> usize {
        match self {
            Self::Reconciled {
                refs,
                commits,
                pull_requests,
                ..
            } => refs.deleted + commits.deleted + pull_requests.deleted,
            Self::Removed { .. } => 0,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Reconciled { .. } => "reconciled",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Runs reconciliation scans against the backends of a registry.
pub struct Scanner {
    registry: Arc<BackendRegistry>,
    index: IndexStore,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(registry: Arc<BackendRegistry>, index: IndexStore, settings: ScanSettings) -> Self {
        Self {
            registry,
            index,
            settings,
        }
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Scans one repository.
    ///
    /// The repository is re-resolved by group and name, bypassing any
    /// cache. If it is gone, or now resolves to a different identity, the
    /// old identity is torn down and discovery recreates the new one.
    ///
    /// # Errors
    ///
    /// Propagates backend and store failures; the caller decides whether
    /// to isolate them.
    #[instrument(skip_all, fields(repository = %info.repository))]
    pub async fn scan(&self, info: &RepositoryInfo) -> Result<ScanReport> {
        let backend = self.registry.by_service_id(&info.repository.vcs_service_id)?;
        let client = backend.client.as_ref();

        match client.get_repository(&info.repository.coordinates()).await {
            Ok(live) if live.id == info.repository.id => self.reconcile(client, live).await,
            Ok(live) => {
                warn!(new_identity = %live.id, "Repository identity changed, tearing down");
                self.remove(&info.repository).await
            },
            Err(FacadeError::NotFound(_)) => {
                info!("Repository no longer exists upstream, tearing down");
                self.remove(&info.repository).await
            },
            Err(e) => Err(e),
        }
    }

    /// Scans one repository, swallowing failures.
    ///
    /// A failed scan is logged and leaves the repository flagged so that a
    /// later cycle retries it.
    pub async fn scan_isolated(&self, info: &RepositoryInfo) -> Option<ScanReport> {
        match self.scan(info).await {
            Ok(report) => {
                metrics::counter!("facade_scans_total", "outcome" => report.outcome()).increment(1);
                info!(
                    repository = %info.repository,
                    outcome = report.outcome(),
                    deleted = report.deleted(),
                    "Scan finished"
                );
                Some(report)
            },
            Err(e) => {
                metrics::counter!("facade_scans_total", "outcome" => "failed").increment(1);
                error!(repository = %info.repository, error = %e, "Scan failed");
                if let Err(e) = self.index.require_scan(&info.repository).await {
                    warn!(repository = %info.repository, error = %e, "Could not flag repository for rescan");
                }
                None
            },
        }
    }

    async fn remove(&self, repository: &Repository) -> Result<ScanReport> {
        self.index.teardown(&repository.id).await?;
        Ok(ScanReport::Removed {
            repository_id: repository.id.clone(),
        })
    }

    async fn reconcile(&self, client: &dyn VcsClient, repository: Repository) -> Result<ScanReport> {
        let mut refs = client.get_branches(&repository).await?;
        refs.extend(client.get_tags(&repository).await?);

        let commits = self.fetch_commits(client, &repository, &refs).await?;
        let pull_requests = client.get_pull_requests(&repository).await?;

        let refs = self.sync_family(self.index.refs.as_ref(), &repository.id, refs).await?;
        let commits = self
            .sync_family(self.index.commits.as_ref(), &repository.id, commits)
            .await?;
        let pull_requests = self
            .sync_family(self.index.pull_requests.as_ref(), &repository.id, pull_requests)
            .await?;

        let repository_id = repository.id.clone();
        let info = RepositoryInfo::discovered(repository).scanned_at(Utc::now());
        self.index.repositories.upsert_many(vec![info]).await?;

        Ok(ScanReport::Reconciled {
            repository_id,
            refs,
            commits,
            pull_requests,
        })
    }

    /// Collects the commit graph reachable from every ref, newest first,
    /// up to `max_commits_per_ref` per ref.
    ///
    /// Listings are ordered by date, not ancestry: a page of already seen
    /// commits can still be followed by older side-branch history, so every
    /// ref is paged to its end or its cap.
    async fn fetch_commits(
        &self,
        client: &dyn VcsClient,
        repository: &Repository,
        refs: &[Ref],
    ) -> Result<Vec<Commit>> {
        let page_size = self.settings.page_size.max(1);
        let mut seen: HashSet<String> = HashSet::new();
        let mut commits = Vec::new();

        for r in refs {
            let mut fetched = 0;
            let mut page = 1;
            while fetched < self.settings.max_commits_per_ref {
                let batch = client
                    .list_commits(repository, &r.commit_id, page, page_size)
                    .await?;
                let size = batch.len();
                fetched += size;

                for commit in batch {
                    if seen.insert(commit.hash.clone()) {
                        commits.push(commit);
                    }
                }
                if size < page_size as usize {
                    break;
                }
                page += 1;
            }
        }
        Ok(commits)
    }

    /// Deletes orphans, then upserts the live set.
    async fn sync_family<D: Document>(
        &self,
        store: &dyn DocumentStore<D>,
        repository_id: &str,
        live: Vec<D>,
    ) -> Result<FamilyReport> {
        let batch_size = self.settings.batch_size.max(1);
        let indexed = collect_ids(store, Some(repository_id), batch_size).await?;
        let live_ids: HashSet<&str> = live.iter().map(|d| d.id()).collect();

        let orphans: Vec<String> = indexed
            .into_iter()
            .filter(|id| !live_ids.contains(id.as_str()))
            .collect();

        let mut report = FamilyReport::default();
        for chunk in orphans.chunks(batch_size) {
            report.deleted += store.delete_by_ids(chunk).await?;
        }

        let mut live = live;
        while !live.is_empty() {
            let rest = live.split_off(live.len().min(batch_size));
            report.upserted += store.upsert_many(live).await?;
            live = rest;
        }

        Ok(report)
    }
}
