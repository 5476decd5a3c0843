//! Application state.

use std::sync::Arc;

use facade_core::{Repository, RepositoryCoordinates, Result};
use facade_index::{IndexStore, Leadership, ScanExecutor, Scanner, SyncScheduler, WebhookIngestor};
use facade_vcs::{BackendRegistry, VcsClient};

use crate::cache::RepositoryCache;
use crate::job::JobExecutor;
use crate::settings::Settings;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub repositories: RepositoryCache,
    pub jobs: Arc<JobExecutor>,
    pub index: IndexStore,
    pub scheduler: Arc<SyncScheduler>,
    pub ingestor: Arc<WebhookIngestor>,
    /// Page size for index listings.
    pub batch_size: usize,
}

impl AppState {
    /// Wires the query path and the sync engine over `registry` and `index`.
    ///
    /// Starts the scan workers, so it must run inside a Tokio runtime. The
    /// scheduler loops are started separately with `SyncScheduler::start`.
    pub fn new(
        settings: &Settings,
        registry: Arc<BackendRegistry>,
        index: IndexStore,
        leadership: Arc<dyn Leadership>,
    ) -> Self {
        let scanner = Arc::new(Scanner::new(
            Arc::clone(&registry),
            index.clone(),
            settings.scan_settings(),
        ));
        let executor = ScanExecutor::start(scanner, settings.executor_settings());
        let scheduler = Arc::new(SyncScheduler::new(
            index.clone(),
            Arc::clone(&registry),
            executor,
            leadership,
            settings.scan.batch_size,
        ));
        let ingestor = Arc::new(WebhookIngestor::new(Arc::clone(&registry), index.clone()));

        Self {
            registry,
            repositories: RepositoryCache::new(settings.cache_config()),
            jobs: Arc::new(JobExecutor::new(settings.job_settings())),
            index,
            scheduler,
            ingestor,
            batch_size: settings.scan.batch_size.max(1),
        }
    }

    /// Resolves the backend serving `ssh_url` and the repository behind it.
    ///
    /// # Errors
    ///
    /// - `FacadeError::NotFound` if no backend serves the url or the
    ///   repository does not exist
    /// - `FacadeError::InvalidArgument` if the url cannot be parsed
    pub async fn resolve_repository(&self, ssh_url: &str) -> Result<(Arc<dyn VcsClient>, Repository)> {
        let backend = self.registry.resolve(ssh_url)?;
        let coordinates = RepositoryCoordinates::from_ssh_url(ssh_url)?;
        let repository = self
            .repositories
            .resolve(backend.client.as_ref(), &coordinates)
            .await?;
        Ok((Arc::clone(&backend.client), repository))
    }
}
