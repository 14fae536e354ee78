//! Job handler trait and the worker thread it runs on.
//!
//! A worker is an isolated unit of execution: one dedicated OS thread with
//! its own single-threaded tokio runtime, handling one request/response
//! cycle at a time. The pool talks to it over a crossbeam channel; each
//! request carries a oneshot reply sender, so a response (or the drop of
//! that sender when the thread dies) reaches exactly the caller that
//! submitted the request.

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::AppResult;

/// The fixed handler a worker runs for every payload it receives.
///
/// Returning `Err` is a domain-level failure: it settles the submitting
/// caller but leaves the worker alive and reusable. Panicking models
/// abnormal termination: the thread unwinds and the pool reports a crash
/// to the caller whose job was outstanding.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use htmlpress::core::{AppResult, JobHandler};
///
/// #[derive(Clone)]
/// struct Doubler;
///
/// #[async_trait]
/// impl JobHandler<u64, u64> for Doubler {
///     async fn run(&self, payload: u64) -> AppResult<u64> {
///         Ok(payload * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait JobHandler<P, R>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Execute one payload and produce its result.
    async fn run(&self, payload: P) -> AppResult<R>;
}

/// One request/response cycle: a payload plus the reply slot of the caller
/// that owns the worker for the duration of this job.
pub(crate) struct WorkerRequest<P, R> {
    pub(crate) payload: P,
    pub(crate) reply: oneshot::Sender<AppResult<R>>,
}

/// Handle to a live worker thread. Dropping the handle disconnects the
/// request channel, which makes an idle worker exit its loop.
pub(crate) struct Worker<P, R> {
    id: u64,
    tx: crossbeam_channel::Sender<WorkerRequest<P, R>>,
}

impl<P, R> Worker<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Spawn a worker thread running `handler` in a request loop.
    pub(crate) fn spawn<H>(id: u64, handler: H) -> std::io::Result<Self>
    where
        H: JobHandler<P, R>,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerRequest<P, R>>();

        std::thread::Builder::new()
            .name(format!("hp-worker-{id}"))
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(worker_id = id, error = %e, "failed to create worker runtime");
                        return;
                    }
                };

                debug!(worker_id = id, "worker thread started");

                // One request in flight at a time. A handler panic unwinds
                // through block_on and drops the pending reply sender, which
                // is how the caller observes the crash.
                while let Ok(req) = rx.recv() {
                    let result = rt.block_on(handler.run(req.payload));
                    // The caller may have gone away; that is its business.
                    let _ = req.reply.send(result);
                }

                debug!(worker_id = id, "worker channel closed, exiting");
            })?;

        Ok(Self { id, tx })
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    /// Handle whose thread has already exited. Lets pool tests exercise
    /// the checkout-time death detection without timing games.
    #[cfg(test)]
    pub(crate) fn dead(id: u64) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        Self { id, tx }
    }

    /// Hand a request to the worker. Fails by returning the request when
    /// the thread has already exited, so the payload can be re-dispatched.
    pub(crate) fn send(
        &self,
        request: WorkerRequest<P, R>,
    ) -> Result<(), WorkerRequest<P, R>> {
        self.tx.send(request).map_err(|err| err.0)
    }
}
