//! Error types for the task-execution core.

use thiserror::Error;

/// Errors surfaced to a single `submit` caller by the worker pool.
///
/// Capacity is enforced by queuing, never by rejection, so there is no
/// capacity-exceeded variant.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The handler reported a domain-level failure for this payload.
    /// The worker stays alive and is reused; other jobs are unaffected.
    #[error("job failed: {0:#}")]
    Execution(anyhow::Error),

    /// The worker thread terminated while this job was outstanding.
    /// The pool evicts the dead worker and replaces capacity on demand.
    #[error("worker {worker_id} crashed while the job was outstanding")]
    WorkerCrashed {
        /// Identity of the worker that died.
        worker_id: u64,
    },

    /// The pool has been shut down.
    #[error("pool has been shut down")]
    PoolShutdown,

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The host refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors produced by the batch admission controller.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A job failed; admission of new jobs stopped, already-started jobs
    /// were drained, and this carries the first failure observed.
    #[error("batch aborted, {jobs_not_started} jobs never started: {cause:#}")]
    Aborted {
        /// Jobs that were never started because of the abort.
        jobs_not_started: usize,
        /// The first failure observed among started jobs.
        cause: anyhow::Error,
    },

    /// The concurrency limit was zero.
    #[error("concurrency limit must be at least 1")]
    InvalidLimit,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
