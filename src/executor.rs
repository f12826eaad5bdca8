use crate::traits::SourceError;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Page source error: {0}")]
    Source(#[from] SourceError),
    #[error("Task for '{subcategory}' timed out after {timeout_secs}s")]
    TimedOut {
        subcategory: String,
        timeout_secs: u64,
    },
    #[error("Task panicked: {0}")]
    Panicked(String),
    #[error("Semaphore error: {0}")]
    PoolClosed(String),
}

/// Result of one job submitted to a [`HarvestExecutor`].
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(TaskError),
    /// Cancellation was requested before the job got a worker slot.
    Skipped,
}

/// Bounded worker pool for independent jobs.
///
/// Jobs run on the tokio runtime, at most `concurrency_limit` at a time.
/// Results come back in submission order no matter when each job finishes,
/// and a failing or panicking job only affects its own outcome.
pub struct HarvestExecutor {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl HarvestExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop queued jobs. Jobs already holding a slot are
    /// allowed to finish.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs every job and returns `(key, outcome)` pairs in the order the
    /// jobs were given.
    #[instrument(skip_all, fields(jobs = jobs.len()))]
    pub async fn run_ordered<K, T, Fut>(&self, jobs: Vec<(K, Fut)>) -> Vec<(K, TaskOutcome<T>)>
    where
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<(K, JoinHandle<TaskOutcome<T>>)> = jobs
            .into_iter()
            .map(|(key, job)| (key, self.spawn(job)))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => TaskOutcome::Failed(TaskError::Panicked(e.to_string())),
            };
            outcomes.push((key, outcome));
        }
        outcomes
    }

    fn spawn<T, Fut>(&self, job: Fut) -> JoinHandle<TaskOutcome<T>>
    where
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Skipping queued job after cancellation");
                    return TaskOutcome::Skipped;
                }
                permit = semaphore.acquire_owned() => permit,
            };
            let _permit = match permit {
                Ok(permit) => permit,
                Err(e) => return TaskOutcome::Failed(TaskError::PoolClosed(e.to_string())),
            };

            match job.await {
                Ok(value) => TaskOutcome::Completed(value),
                Err(e) => TaskOutcome::Failed(e),
            }
        })
    }
}
