//! # htmlpress
//!
//! In-place HTML minification for build outputs, driven by a bounded
//! worker pool.
//!
//! The externally visible job is small: take every HTML file a build
//! produced, minify it, and write it back only when minification actually
//! shrinks it. The reusable core underneath is a two-layer concurrency
//! stack:
//!
//! - **`core::WorkerPool`**: a fixed-capacity set of reusable worker
//!   threads. Workers are spawned lazily up to the configured limit, idle
//!   workers are reused in FIFO order, and callers beyond capacity queue
//!   as FIFO waiters. Each submitted job settles exactly once: with a
//!   value, a domain failure, or a crash report if the worker died
//!   mid-job. A dead worker is evicted and its capacity replaced.
//! - **`core::run_batch`**: a batch admission controller that starts an
//!   ordered sequence of independent async jobs under a shared concurrency
//!   cap, stops admitting new jobs on the first failure, and drains
//!   everything already in flight before reporting that failure.
//!
//! The two layers compose but do not depend on each other: the admission
//! controller bounds *when* logical jobs begin, the pool bounds *where*
//! they physically run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use htmlpress::config::PipelineConfig;
//! use htmlpress::pipeline::minify_files;
//!
//! let config = PipelineConfig::new();
//! let summary = minify_files(html_paths, &config).await?;
//! println!(
//!     "saved {} bytes across {} files",
//!     summary.bytes_saved, summary.files_minified
//! );
//! ```
//!
//! ## Failure model
//!
//! - A job whose handler returns an error settles its caller with
//!   `PoolError::Execution`; the worker stays alive and reusable.
//! - A job whose worker thread dies settles its caller with
//!   `PoolError::WorkerCrashed`; no other caller is affected.
//! - A batch stops admitting jobs after the first failure but never
//!   interrupts jobs already running, so no file is left half-written.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Bounded task-execution core: worker pool, batch admission, error taxonomy.
pub mod core;
/// Configuration models for the pool and the file pipeline.
pub mod config;
/// Conservative HTML minifier and its options.
pub mod minify;
/// File-granular minification pipeline wiring pool and batch together.
pub mod pipeline;
/// Shared utilities.
pub mod util;
