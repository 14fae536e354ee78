//! Bounded task-execution core.

pub mod batch;
pub mod error;
pub mod executor;
pub mod worker_pool;

pub use batch::run_batch;
pub use error::{AppResult, BatchError, PoolError};
pub use executor::JobHandler;
pub use worker_pool::{PoolStats, WorkerPool};
