//! Worker pool with lazily spawned, reusable worker threads.
//!
//! The pool owns every worker it spawns. `submit` acquires a worker
//! according to a fixed allocation policy (idle worker first, then a new
//! spawn while below capacity, otherwise a FIFO waiter queue), sends it
//! exactly one request, and settles the caller with that worker's next
//! response. A freed worker goes straight to the oldest waiter when demand
//! is backlogged, and only otherwise returns to the idle list.
//!
//! # Crash handling
//!
//! A worker that dies mid-job settles its one pending caller with
//! [`PoolError::WorkerCrashed`] and is evicted from the live set; no other
//! caller observes anything. A worker that died while idle is detected
//! when its request channel refuses the next dispatch, evicted, and the
//! acquisition retried. In both cases replacement capacity appears lazily
//! on the next demand (or immediately when callers are already queued, so
//! a crash cannot strand a waiter).
//!
//! # Settlement policy
//!
//! A caller settles on exactly one of: a normal reply, a domain failure
//! reply, or the closure of its reply channel (worker death). A worker's
//! fate is decided only by a normal reply (released) or detected thread
//! death (evicted); there is no intermediate error event in this model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;

use super::executor::{Worker, WorkerRequest};
use super::{JobHandler, PoolError};

/// Snapshot of pool utilization and lifetime counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Jobs accepted by `submit` so far.
    pub submitted_jobs: u64,
    /// Jobs settled with a success value.
    pub completed_jobs: u64,
    /// Jobs settled with a domain failure.
    pub failed_jobs: u64,
    /// Workers that died while a job was outstanding.
    pub crashed_workers: u64,
    /// Worker threads spawned over the pool's lifetime.
    pub spawned_workers: u64,
    /// Workers currently alive (busy or idle).
    pub live_workers: usize,
    /// Workers currently idle and eligible for immediate reuse.
    pub idle_workers: usize,
    /// Callers queued because the pool is saturated.
    pub waiting_callers: usize,
}

/// Lifetime counters, updated lock-free.
#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    crashed: AtomicU64,
    spawned: AtomicU64,
}

/// Mutable pool state. Mutated only under the pool mutex, which is never
/// held across an await point.
struct PoolState<P, R> {
    /// Number of live workers, busy or idle. Always `<= max_workers`.
    live: usize,
    /// Idle workers, reused oldest-first.
    idle: VecDeque<Worker<P, R>>,
    /// Callers waiting for a worker, served oldest-first.
    waiters: VecDeque<oneshot::Sender<Worker<P, R>>>,
}

/// Fixed-capacity pool of reusable worker threads.
///
/// # Example
///
/// ```rust,ignore
/// use htmlpress::config::PoolConfig;
/// use htmlpress::core::WorkerPool;
///
/// let pool = WorkerPool::new(PoolConfig::new().with_max_workers(4), handler)?;
/// let result = pool.submit(payload).await?;
/// ```
pub struct WorkerPool<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: JobHandler<P, R>,
{
    config: PoolConfig,
    handler: H,
    state: Mutex<PoolState<P, R>>,
    counters: PoolCounters,
    next_worker_id: AtomicU64,
    shutdown: AtomicBool,
}

impl<P, R, H> WorkerPool<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: JobHandler<P, R>,
{
    /// Create a pool. No worker threads are spawned until demand arrives.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: PoolConfig, handler: H) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        info!(
            max_workers = config.max_workers,
            "worker pool created, workers spawn lazily"
        );

        Ok(Self {
            config,
            handler,
            state: Mutex::new(PoolState {
                live: 0,
                idle: VecDeque::new(),
                waiters: VecDeque::new(),
            }),
            counters: PoolCounters::default(),
            next_worker_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Submit one payload and await its settlement.
    ///
    /// Concurrent calls are fully independent: a result is only ever
    /// delivered to the caller that submitted its payload, even though
    /// callers share physical workers over time. Every call settles
    /// exactly once.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Execution`] if the handler failed on this payload.
    /// - [`PoolError::WorkerCrashed`] if the worker died mid-job.
    /// - [`PoolError::PoolShutdown`] if the pool was shut down.
    /// - [`PoolError::Spawn`] if a needed worker thread could not start.
    pub async fn submit(&self, payload: P) -> Result<R, PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let mut payload = payload;
        loop {
            let worker = self.acquire().await?;
            let worker_id = worker.id();

            let (reply_tx, reply_rx) = oneshot::channel();
            match worker.send(WorkerRequest {
                payload,
                reply: reply_tx,
            }) {
                Ok(()) => {
                    debug!(worker_id, "job dispatched");
                }
                Err(request) => {
                    // The worker died while idle. Evict it and try again
                    // with another worker; capacity accounting happens once.
                    warn!(worker_id, "worker found dead at checkout, evicting");
                    self.evict(worker);
                    payload = request.payload;
                    continue;
                }
            }

            return match reply_rx.await {
                Ok(Ok(response)) => {
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                    self.release(worker);
                    Ok(response)
                }
                Ok(Err(err)) => {
                    // Domain failure: the worker is healthy and reusable.
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    self.release(worker);
                    Err(PoolError::Execution(err))
                }
                Err(_) => {
                    // Reply sender dropped: the worker thread died with our
                    // job outstanding.
                    self.counters.crashed.fetch_add(1, Ordering::Relaxed);
                    warn!(worker_id, "worker crashed mid-job");
                    self.evict(worker);
                    Err(PoolError::WorkerCrashed { worker_id })
                }
            };
        }
    }

    /// Acquire a worker: idle first, then lazy spawn, then wait FIFO.
    async fn acquire(&self) -> Result<Worker<P, R>, PoolError> {
        let wait_rx = {
            let mut state = self.state.lock();

            if let Some(worker) = state.idle.pop_front() {
                return Ok(worker);
            }

            if state.live < self.config.max_workers {
                let worker = self.spawn_worker()?;
                state.live += 1;
                return Ok(worker);
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        // Suspend until a release or eviction hands us a worker. The
        // sender is only dropped when the pool shuts down underneath us.
        wait_rx.await.map_err(|_| PoolError::PoolShutdown)
    }

    fn spawn_worker(&self) -> Result<Worker<P, R>, PoolError> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::spawn(id, self.handler.clone())?;
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
        debug!(worker_id = id, "worker spawned");
        Ok(worker)
    }

    /// Release policy: a freed live worker goes to the oldest waiter when
    /// demand is backlogged, otherwise back to the idle list.
    fn release(&self, worker: Worker<P, R>) {
        let mut state = self.state.lock();
        if self.shutdown.load(Ordering::Acquire) {
            // Dropping the handle lets the thread exit.
            state.live -= 1;
            return;
        }
        Self::hand_off(&mut state, worker);
    }

    /// Remove a dead worker from the live set. When callers are queued,
    /// replace its capacity immediately so no waiter is stranded.
    fn evict(&self, worker: Worker<P, R>) {
        drop(worker);
        let mut state = self.state.lock();
        state.live -= 1;

        if state.waiters.is_empty() || state.live >= self.config.max_workers {
            return;
        }
        match self.spawn_worker() {
            Ok(replacement) => {
                state.live += 1;
                Self::hand_off(&mut state, replacement);
            }
            Err(err) => {
                warn!(error = %err, "failed to spawn replacement worker");
            }
        }
    }

    /// Hand a worker to the oldest waiter still listening, else park it
    /// idle. Waiters whose callers gave up are skipped.
    fn hand_off(state: &mut PoolState<P, R>, worker: Worker<P, R>) {
        let mut worker = worker;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(worker) {
                Ok(()) => return,
                Err(returned) => worker = returned,
            }
        }
        state.idle.push_back(worker);
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            submitted_jobs: self.counters.submitted.load(Ordering::Relaxed),
            completed_jobs: self.counters.completed.load(Ordering::Relaxed),
            failed_jobs: self.counters.failed.load(Ordering::Relaxed),
            crashed_workers: self.counters.crashed.load(Ordering::Relaxed),
            spawned_workers: self.counters.spawned.load(Ordering::Relaxed),
            live_workers: state.live,
            idle_workers: state.idle.len(),
            waiting_callers: state.waiters.len(),
        }
    }

    /// Shut down the pool.
    ///
    /// Idle workers exit as their channels disconnect; busy workers finish
    /// their current job and exit when released. Queued callers and later
    /// `submit` calls observe [`PoolError::PoolShutdown`]. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut state = self.state.lock();
        state.live -= state.idle.len();
        state.idle.clear();
        state.waiters.clear();
        info!(busy_workers = state.live, "worker pool shut down");
    }
}

impl<P, R, H> Drop for WorkerPool<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: JobHandler<P, R>,
{
    fn drop(&mut self) {
        // Workers are detached; their channels disconnect as the state is
        // dropped and each thread exits its loop on its own.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            debug!("worker pool dropped without explicit shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppResult;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct AddOne;

    #[async_trait]
    impl JobHandler<u32, u32> for AddOne {
        async fn run(&self, payload: u32) -> AppResult<u32> {
            Ok(payload + 1)
        }
    }

    #[tokio::test]
    async fn spawns_lazily_and_reuses() {
        let pool = WorkerPool::new(PoolConfig::new().with_max_workers(4), AddOne).unwrap();
        assert_eq!(pool.stats().spawned_workers, 0);

        for i in 0..5 {
            assert_eq!(pool.submit(i).await.unwrap(), i + 1);
        }

        // Sequential jobs ride the same worker.
        let stats = pool.stats();
        assert_eq!(stats.spawned_workers, 1);
        assert_eq!(stats.live_workers, 1);
        assert_eq!(stats.idle_workers, 1);
        assert_eq!(stats.completed_jobs, 5);
    }

    #[tokio::test]
    async fn rejects_zero_capacity() {
        let err = WorkerPool::new(PoolConfig::new().with_max_workers(0), AddOne)
            .err()
            .expect("zero capacity must be rejected");
        match err {
            PoolError::InvalidConfig(_) => {}
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn idle_death_detected_at_checkout() {
        let pool = WorkerPool::new(PoolConfig::new().with_max_workers(1), AddOne).unwrap();
        assert_eq!(pool.submit(1).await.unwrap(), 2);

        // Swap the parked worker's handle for one whose thread is gone.
        // Dropping the real handle lets its thread exit too, so the pool
        // now believes a dead worker is idle.
        {
            let mut state = pool.state.lock();
            let stale = state.idle.pop_front().expect("worker should be parked");
            drop(stale);
            state.idle.push_back(Worker::dead(99));
        }

        // Checkout finds the corpse, evicts it, and retries on a fresh
        // worker. Capacity is decremented exactly once, so the retry can
        // spawn within the limit and the caller never sees the death.
        assert_eq!(pool.submit(2).await.unwrap(), 3);

        let stats = pool.stats();
        assert_eq!(stats.live_workers, 1);
        assert_eq!(stats.idle_workers, 1);
        assert_eq!(stats.spawned_workers, 2);
        assert_eq!(stats.completed_jobs, 2);
        assert_eq!(stats.crashed_workers, 0);
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails() {
        let pool = WorkerPool::new(PoolConfig::new().with_max_workers(1), AddOne).unwrap();
        assert_eq!(pool.submit(1).await.unwrap(), 2);
        pool.shutdown();

        match pool.submit(2).await {
            Err(PoolError::PoolShutdown) => {}
            other => panic!("expected PoolShutdown, got {other:?}"),
        }
        assert_eq!(pool.stats().live_workers, 0);
    }
}
