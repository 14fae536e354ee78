//! Batch admission controller.
//!
//! Bounds *when* independent async jobs begin, independently of whatever
//! resource each job uses internally (worker-pool backed or not). Jobs are
//! admitted in strict input order; at most `limit` are in flight at once;
//! the first failure stops admission of further jobs while everything
//! already started is drained to completion.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use super::{AppResult, BatchError};

/// Run an ordered sequence of independent async jobs under a shared
/// concurrency cap.
///
/// Jobs are admitted in input order. When the in-flight set is at `limit`,
/// admission suspends until some member settles. A failed job records the
/// first failure and stops admission; the job whose admission raced with
/// the failing settlement still runs, matching the freed slot. Jobs
/// already in flight always drain to completion, so side effects such as
/// file writes are never cut off half way.
///
/// Jobs the controller never admitted are never constructed: `jobs` is
/// consumed lazily, and anything left unconsumed after a failure stays
/// that way. The sequence must report its length up front so the count
/// of unstarted jobs can be derived without touching them.
///
/// # Errors
///
/// - [`BatchError::InvalidLimit`] if `limit` is zero; no job is started.
/// - [`BatchError::Aborted`] carrying the first failure, returned only
///   after every started job has settled.
pub async fn run_batch<I, F>(jobs: I, limit: usize) -> Result<(), BatchError>
where
    I: IntoIterator<Item = F>,
    I::IntoIter: ExactSizeIterator,
    F: Future<Output = AppResult<()>>,
{
    if limit == 0 {
        return Err(BatchError::InvalidLimit);
    }

    let mut jobs = jobs.into_iter();
    let total = jobs.len();
    let mut in_flight = FuturesUnordered::new();
    let mut first_failure: Option<anyhow::Error> = None;
    let mut admitted = 0usize;

    loop {
        if first_failure.is_some() {
            break;
        }
        let Some(job) = jobs.next() else {
            break;
        };
        // Free a slot before admitting. A failure observed here still lets
        // this job in (the slot is free either way); the next iteration
        // sees the recorded failure and stops.
        if in_flight.len() >= limit {
            if let Some(Err(err)) = in_flight.next().await {
                warn!(error = %err, "batch job failed, stopping admission");
                first_failure.get_or_insert(err);
            }
        }
        in_flight.push(job);
        admitted += 1;
    }

    // Derived arithmetically: consuming the iterator here would run the
    // construction of jobs that were never admitted.
    let jobs_not_started = total - admitted;

    // Drain everything already started, keeping the earliest failure.
    while let Some(result) = in_flight.next().await {
        if let Err(err) = result {
            if first_failure.is_none() {
                warn!(error = %err, "batch job failed during drain");
                first_failure = Some(err);
            }
        }
    }

    debug!(admitted, jobs_not_started, "batch drained");

    match first_failure {
        None => Ok(()),
        Some(cause) => Err(BatchError::Aborted {
            jobs_not_started,
            cause,
        }),
    }
}
