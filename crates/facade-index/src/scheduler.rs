//! Leader-gated scan scheduling.
//!
//! Two loops run on the elected instance: a cron job flags every known and
//! newly discovered repository for rescanning, and a fixed-delay tick
//! submits flagged repositories to the scan executor.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::time::interval;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use facade_core::{FacadeError, Repository, Result};
use facade_vcs::BackendRegistry;

use crate::executor::{ScanExecutor, ScanTicket};
use crate::leadership::Leadership;
use crate::store::IndexStore;

/// Counts of one scheduling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescanSummary {
    /// Known repositories flagged for rescanning.
    pub flagged: usize,
    /// Repositories seen for the first time in backend listings.
    pub discovered: usize,
}

/// Decides when repositories get scanned.
pub struct SyncScheduler {
    index: IndexStore,
    registry: Arc<BackendRegistry>,
    executor: ScanExecutor,
    leadership: Arc<dyn Leadership>,
    in_flight: DashMap<String, ScanTicket>,
    batch_size: usize,
}

impl SyncScheduler {
    pub fn new(
        index: IndexStore,
        registry: Arc<BackendRegistry>,
        executor: ScanExecutor,
        leadership: Arc<dyn Leadership>,
        batch_size: usize,
    ) -> Self {
        Self {
            index,
            registry,
            executor,
            leadership,
            in_flight: DashMap::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn is_scheduler(&self) -> bool {
        self.leadership.is_scheduler()
    }

    /// Number of submitted scans not yet seen finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Flags every known repository, then every repository listed by a
    /// backend, for scanning. No-op unless this instance is the scheduler.
    ///
    /// A backend whose listing fails is skipped; the others still count.
    pub async fn schedule_rescan(&self) -> Result<RescanSummary> {
        if !self.is_scheduler() {
            debug!("Not the scheduler instance, skipping rescan");
            return Ok(RescanSummary::default());
        }

        let mut summary = RescanSummary::default();
        for info in self.index.all_infos(self.batch_size).await? {
            if !info.scan_required {
                self.index
                    .repositories
                    .upsert_many(vec![info.require_scan()])
                    .await?;
            }
            summary.flagged += 1;
        }

        for backend in self.registry.iter() {
            let repositories = match backend.client.list_repositories().await {
                Ok(repositories) => repositories,
                Err(e) => {
                    warn!(backend = %backend.id, error = %e, "Repository discovery failed");
                    continue;
                },
            };
            for repository in repositories {
                if self.index.repositories.get(&repository.id).await?.is_none() {
                    self.index.ensure_info(&repository).await?;
                    summary.discovered += 1;
                }
            }
        }

        info!(
            flagged = summary.flagged,
            discovered = summary.discovered,
            "Scheduled rescan"
        );
        Ok(summary)
    }

    /// Submits every flagged repository not already queued. Returns the
    /// number of new submissions. No-op unless this instance is the
    /// scheduler.
    pub async fn submit_pending(&self) -> Result<usize> {
        if !self.is_scheduler() {
            return Ok(0);
        }

        self.in_flight.retain(|_, ticket| !ticket.is_finished());

        let mut submitted = 0;
        for info in self.index.all_infos(self.batch_size).await? {
            if !info.scan_required {
                continue;
            }
            if let Entry::Vacant(slot) = self.in_flight.entry(info.repository.id.clone()) {
                let repository = info.repository.clone();
                match self.executor.submit(info) {
                    Ok(ticket) => {
                        slot.insert(ticket);
                        submitted += 1;
                    },
                    Err(e) => {
                        debug!(repository = %repository, error = %e, "Scan not submitted");
                        break;
                    },
                }
            }
        }
        if submitted > 0 {
            debug!(submitted, "Submitted pending scans");
        }
        Ok(submitted)
    }

    /// Flags `repository` and submits its scan immediately, on any
    /// instance. Does not wait for the scan to finish. A scan that is
    /// still queued or running is reused rather than submitted twice.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::Unexpected` if the scan queue is full; the
    /// repository stays flagged either way.
    pub async fn submit_now(&self, repository: &Repository) -> Result<ScanTicket> {
        let info = self.index.require_scan(repository).await?;
        match self.in_flight.entry(repository.id.clone()) {
            Entry::Occupied(slot) if !slot.get().is_finished() => {
                debug!(repository = %repository, "Scan already in flight");
                Ok(slot.get().clone())
            },
            slot => {
                let ticket = self.executor.submit(info)?;
                slot.insert(ticket.clone());
                info!(repository = %repository, "Scan requested");
                Ok(ticket)
            },
        }
    }

    /// Starts the submission tick and the rescan cron.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` for a malformed cron
    /// expression and `FacadeError::Unexpected` if the cron runtime fails.
    pub async fn start(self: &Arc<Self>, submit_delay: Duration, rescan_cron: &str) -> Result<SchedulerHandle> {
        let cron = JobScheduler::new()
            .await
            .map_err(|e| FacadeError::unexpected(e.to_string()))?;

        let scheduler = Arc::clone(self);
        let job = Job::new_async(rescan_cron, move |_uuid, _lock| {
            let scheduler = Arc::clone(&scheduler);
            Box::pin(async move {
                if let Err(e) = scheduler.schedule_rescan().await {
                    error!(error = %e, "Scheduled rescan failed");
                }
            })
        })
        .map_err(|e| {
            FacadeError::invalid_argument(format!("invalid rescan cron '{}': {}", rescan_cron, e))
        })?;

        cron.add(job)
            .await
            .map_err(|e| FacadeError::unexpected(e.to_string()))?;
        cron.start()
            .await
            .map_err(|e| FacadeError::unexpected(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(Arc::clone(self).run_submissions(submit_delay, shutdown_rx));

        info!(
            ?submit_delay,
            rescan_cron,
            scheduler = self.is_scheduler(),
            "Sync scheduler started"
        );
        Ok(SchedulerHandle {
            shutdown_tx,
            cron: Some(cron),
        })
    }

    async fn run_submissions(self: Arc<Self>, delay: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.submit_pending().await {
                        warn!(error = %e, "Scan submission failed");
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Scan submission loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle for a running scheduler. Dropping it stops the submission loop.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    cron: Option<JobScheduler>,
}

impl SchedulerHandle {
    /// Signals the submission loop to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops both loops.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(mut cron) = self.cron.take()
            && let Err(e) = cron.shutdown().await
        {
            warn!(error = %e, "Rescan cron did not shut down cleanly");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
