//! Incremental index updates from webhook events.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use facade_core::{Commit, FacadeError, Ref, Repository, Result};
use facade_vcs::{Backend, BackendRegistry, VcsClient, WebhookEvent, WebhookHeaders};

use crate::store::IndexStore;

/// Applies webhook events as targeted index mutations.
///
/// Every event first makes sure the repository has a scan record, so a
/// later reconciliation scan repairs anything an event missed.
pub struct WebhookIngestor {
    registry: Arc<BackendRegistry>,
    index: IndexStore,
}

impl WebhookIngestor {
    pub fn new(registry: Arc<BackendRegistry>, index: IndexStore) -> Self {
        Self { registry, index }
    }

    /// Normalizes a delivery addressed to backend `service_id`.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::NotFound` for an unknown backend and
    /// `FacadeError::InvalidArgument` for a malformed payload.
    pub fn parse(
        &self,
        service_id: &str,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<Vec<WebhookEvent>> {
        self.registry
            .by_service_id(service_id)?
            .client
            .parse_webhook(headers, body)
    }

    /// Applies `events` in order. A failing event is logged and does not
    /// stop the others; its repository is flagged for rescanning.
    ///
    /// Returns the number of events applied.
    pub async fn ingest(&self, service_id: &str, events: Vec<WebhookEvent>) -> Result<usize> {
        let backend = self.registry.by_service_id(service_id)?;
        let mut applied = 0;
        for event in events {
            metrics::counter!("facade_webhook_events_total", "event" => event.label()).increment(1);
            match self.apply(backend, &event).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(
                        backend = %service_id,
                        event = event.label(),
                        repository = %event.coordinates(),
                        error = %e,
                        "Webhook event not applied"
                    );
                    self.flag(backend, &event).await;
                },
            }
        }
        Ok(applied)
    }

    #[instrument(skip_all, fields(event = event.label(), repository = %event.coordinates()))]
    async fn apply(&self, backend: &Backend, event: &WebhookEvent) -> Result<()> {
        let client = backend.client.as_ref();
        let repository = client.get_repository(event.coordinates()).await?;
        self.index.ensure_info(&repository).await?;

        match event {
            WebhookEvent::RefCreated { ref_type, name, .. } => {
                let live = client.get_ref(&repository, *ref_type, name).await?;
                self.index.refs.upsert_many(vec![live]).await?;
            },
            WebhookEvent::RefDeleted { ref_type, name, .. } => {
                let id = Ref::id_for(&repository.id, *ref_type, name);
                self.index.refs.delete_by_ids(&[id]).await?;
            },
            WebhookEvent::Pushed { commit_ids, .. } => {
                let commits = self.fetch_commits(client, &repository, commit_ids).await?;
                let count = self.index.commits.upsert_many(commits).await?;
                debug!(count, "Indexed pushed commits");
            },
            WebhookEvent::PullRequestChanged { index, .. } => {
                let pull_request = client.get_pull_request(&repository, *index).await?;
                self.index.pull_requests.upsert_many(vec![pull_request]).await?;
            },
        }
        info!("Webhook event applied");
        Ok(())
    }

    /// Re-fetches pushed commits; push payloads omit parents and dates.
    async fn fetch_commits(
        &self,
        client: &dyn VcsClient,
        repository: &Repository,
        commit_ids: &[String],
    ) -> Result<Vec<Commit>> {
        let mut commits = Vec::with_capacity(commit_ids.len());
        for commit_id in commit_ids {
            match client.get_commit(repository, commit_id).await {
                Ok(commit) => commits.push(commit),
                // Rewritten away before we got to it.
                Err(FacadeError::NotFound(_)) => debug!(commit_id, "Pushed commit is gone"),
                Err(e) => return Err(e),
            }
        }
        Ok(commits)
    }

    async fn flag(&self, backend: &Backend, event: &WebhookEvent) {
        let Ok(repository) = backend.client.get_repository(event.coordinates()).await else {
            return;
        };
        if let Err(e) = self.index.require_scan(&repository).await {
            warn!(repository = %repository, error = %e, "Could not flag repository for rescan");
        }
    }
}
