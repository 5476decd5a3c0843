//! Deferred-result job executor.
//!
//! Every slow query runs as a job keyed by its request id. The caller waits
//! a bounded time for the result; if the job is still running it receives
//! `FacadeError::StillProcessing` and retries later with the same request
//! id, which attaches to the running job instead of starting a new one.
//! A job nobody asks about for `abandon_after` is dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use moka::future::Cache;
use moka::notification::RemovalCause;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use facade_core::{FacadeError, Result};

/// Executor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    /// How long a caller waits before being told to retry.
    pub fast_work_timeout: Duration,
    /// Delay suggested to a caller told to retry.
    pub retry_after: Duration,
    /// Maximum concurrently running jobs.
    pub pool_size: usize,
    /// Idle time after which an uncollected job is forgotten.
    pub abandon_after: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            fast_work_timeout: Duration::from_secs(2),
            retry_after: Duration::from_secs(10),
            pool_size: 8,
            abandon_after: Duration::from_secs(30),
        }
    }
}

type SharedJob = Shared<BoxFuture<'static, Result<Value>>>;

/// Runs jobs at most once per request id.
pub struct JobExecutor {
    jobs: Cache<String, SharedJob>,
    permits: Arc<Semaphore>,
    settings: JobSettings,
}

impl JobExecutor {
    pub fn new(settings: JobSettings) -> Self {
        let jobs = Cache::builder()
            .time_to_idle(settings.abandon_after)
            .eviction_listener(|request_id: Arc<String>, _job, cause| {
                if cause == RemovalCause::Expired {
                    metrics::counter!("facade_jobs_total", "outcome" => "abandoned").increment(1);
                    debug!(request_id = %request_id, "Job abandoned");
                }
            })
            .build();

        Self {
            jobs,
            permits: Arc::new(Semaphore::new(settings.pool_size.max(1))),
            settings,
        }
    }

    /// Number of jobs whose result has not been collected yet.
    pub async fn pending(&self) -> u64 {
        self.jobs.run_pending_tasks().await;
        self.jobs.entry_count()
    }

    /// Runs `compute` for `request_id`, or attaches to the job already
    /// running under that id, and waits up to the fast-work timeout.
    ///
    /// A completed job is handed out once and then forgotten.
    ///
    /// # Errors
    ///
    /// - `FacadeError::StillProcessing` if the job outlives the timeout
    /// - whatever the job itself failed with
    pub async fn process<T, F, Fut>(&self, request_id: &str, compute: F) -> Result<Value>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let job = self
            .jobs
            .get_with(request_id.to_string(), async { self.spawn(request_id, compute()) })
            .await;

        match tokio::time::timeout(self.settings.fast_work_timeout, job).await {
            Ok(result) => {
                self.jobs.invalidate(request_id).await;
                let outcome = if result.is_ok() { "completed" } else { "failed" };
                metrics::counter!("facade_jobs_total", "outcome" => outcome).increment(1);
                result
            },
            Err(_) => {
                metrics::counter!("facade_jobs_total", "outcome" => "deferred").increment(1);
                let retry_after = chrono::Duration::from_std(self.settings.retry_after)
                    .unwrap_or_else(|_| chrono::Duration::seconds(10));
                debug!(request_id, "Job still processing");
                Err(FacadeError::still_processing(request_id, Utc::now() + retry_after))
            },
        }
    }

    fn spawn<T, Fut>(&self, request_id: &str, work: Fut) -> SharedJob
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| FacadeError::unexpected("job pool is closed"))?;
            let value = work.await?;
            Ok::<Value, FacadeError>(serde_json::to_value(value)?)
        });

        info!(request_id, "Job submitted");
        let request_id = request_id.to_string();
        async move {
            handle.await.unwrap_or_else(|e| {
                warn!(request_id = %request_id, error = %e, "Job aborted");
                Err(FacadeError::unexpected(format!("job '{}' aborted: {}", request_id, e)))
            })
        }
        .boxed()
        .shared()
    }
}
