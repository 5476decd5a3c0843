//! Bounded scan worker pool.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use facade_core::{FacadeError, RepositoryInfo, Result};

use crate::scanner::Scanner;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Number of concurrent scan workers.
    pub pool_size: usize,
    /// Scans waiting for a worker before submissions are rejected.
    pub queue_capacity: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            pool_size: 4,
            queue_capacity: 64,
        }
    }
}

/// Completion signal of one submitted scan.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    done: watch::Receiver<bool>,
}

impl ScanTicket {
    /// Returns true once the scan ran, or can no longer run.
    pub fn is_finished(&self) -> bool {
        *self.done.borrow() || self.done.has_changed().is_err()
    }

    /// Waits for the scan to finish.
    pub async fn wait(mut self) {
        let _ = self.done.wait_for(|done| *done).await;
    }
}

struct ScanJob {
    info: RepositoryInfo,
    done: watch::Sender<bool>,
}

/// Runs scans on a fixed set of workers fed by a bounded queue.
///
/// Submission never blocks: a full queue rejects the scan and the
/// repository stays flagged for the next cycle. Workers exit once the
/// executor is dropped and the queue drains.
#[derive(Clone)]
pub struct ScanExecutor {
    sender: mpsc::Sender<ScanJob>,
}

impl ScanExecutor {
    /// Spawns the workers. Must be called inside a Tokio runtime.
    pub fn start(scanner: Arc<Scanner>, settings: ExecutorSettings) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let pool_size = settings.pool_size.max(1);
        for worker in 0..pool_size {
            tokio::spawn(run_worker(worker, Arc::clone(&scanner), Arc::clone(&receiver)));
        }
        info!(
            pool_size,
            queue_capacity = settings.queue_capacity,
            "Scan executor started"
        );

        Self { sender }
    }

    /// Queues a scan.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::Unexpected` if the queue is full or the
    /// executor stopped.
    pub fn submit(&self, info: RepositoryInfo) -> Result<ScanTicket> {
        let (done, ticket) = watch::channel(false);
        match self.sender.try_send(ScanJob { info, done }) {
            Ok(()) => Ok(ScanTicket { done: ticket }),
            Err(TrySendError::Full(job)) => {
                metrics::counter!("facade_scans_total", "outcome" => "rejected").increment(1);
                warn!(repository = %job.info.repository, "Scan queue full, submission rejected");
                Err(FacadeError::unexpected(format!(
                    "scan queue is full, cannot scan {}",
                    job.info.repository
                )))
            },
            Err(TrySendError::Closed(job)) => Err(FacadeError::unexpected(format!(
                "scan executor stopped, cannot scan {}",
                job.info.repository
            ))),
        }
    }
}

async fn run_worker(worker: usize, scanner: Arc<Scanner>, receiver: Arc<Mutex<mpsc::Receiver<ScanJob>>>) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            debug!(worker, "Scan worker stopping");
            return;
        };
        debug!(worker, repository = %job.info.repository, "Scan started");
        scanner.scan_isolated(&job.info).await;
        let _ = job.done.send(true);
    }
}
