//! File-granular minification pipeline.
//!
//! Wires the two concurrency layers together: a [`WorkerPool`] of
//! [`MinifyHandler`] workers does the reading, minifying, and in-place
//! writing, while [`run_batch`] bounds how many file jobs are admitted at
//! once. A file is only rewritten when minification strictly shrinks it;
//! otherwise the job settles with [`FileOutcome::Skipped`] and the file is
//! untouched.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::core::{run_batch, AppResult, JobHandler, WorkerPool};
use crate::minify::{minify, MinifyOptions};

/// Settlement of a single file job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file shrank and was rewritten in place.
    Minified {
        /// Bytes saved by the rewrite.
        saved_bytes: u64,
        /// Wall time spent on this file.
        elapsed: Duration,
    },
    /// Minification produced no savings; the file was not written.
    Skipped,
}

/// The fixed per-worker handler: read, minify, write back if smaller.
#[derive(Clone)]
pub struct MinifyHandler {
    options: MinifyOptions,
}

impl MinifyHandler {
    /// Create a handler with the given minifier options.
    #[must_use]
    pub const fn new(options: MinifyOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl JobHandler<PathBuf, FileOutcome> for MinifyHandler {
    async fn run(&self, path: PathBuf) -> AppResult<FileOutcome> {
        let started = Instant::now();

        let source = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        let minified = minify(&source, &self.options)
            .with_context(|| format!("failed to minify {}", path.display()))?;

        if minified.len() >= source.len() {
            debug!(path = %path.display(), "no savings, skipping write");
            return Ok(FileOutcome::Skipped);
        }

        let saved_bytes = (source.len() - minified.len()) as u64;
        tokio::fs::write(&path, minified)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(FileOutcome::Minified {
            saved_bytes,
            elapsed: started.elapsed(),
        })
    }
}

/// Aggregate result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    /// Files rewritten smaller.
    pub files_minified: u64,
    /// Files left untouched for lack of savings.
    pub files_skipped: u64,
    /// Total bytes saved across all rewritten files.
    pub bytes_saved: u64,
    /// Wall time for the whole batch.
    pub elapsed: Duration,
}

/// Minify every listed file in place, in parallel.
///
/// Jobs are admitted in input order under the configured batch limit and
/// executed on the worker pool. The first failing file stops admission of
/// further files; files already being processed finish (and their writes
/// complete) before the error is returned.
///
/// # Errors
///
/// Fails on invalid configuration, or with the first file failure after
/// in-flight jobs have drained.
pub async fn minify_files(paths: &[PathBuf], config: &PipelineConfig) -> AppResult<PipelineSummary> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let started = Instant::now();
    let pool = Arc::new(WorkerPool::new(
        config.pool.clone(),
        MinifyHandler::new(config.minify.clone()),
    )?);

    let files_minified = AtomicU64::new(0);
    let files_skipped = AtomicU64::new(0);
    let bytes_saved = AtomicU64::new(0);

    let jobs = paths.iter().map(|path| {
        let pool = Arc::clone(&pool);
        let path = path.clone();
        let files_minified = &files_minified;
        let files_skipped = &files_skipped;
        let bytes_saved = &bytes_saved;
        async move {
            match pool.submit(path.clone()).await {
                Ok(FileOutcome::Minified {
                    saved_bytes,
                    elapsed,
                }) => {
                    info!(
                        path = %path.display(),
                        saved_bytes,
                        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        "minified in place"
                    );
                    files_minified.fetch_add(1, Ordering::Relaxed);
                    bytes_saved.fetch_add(saved_bytes, Ordering::Relaxed);
                    Ok(())
                }
                Ok(FileOutcome::Skipped) => {
                    info!(path = %path.display(), "already minimal, left untouched");
                    files_skipped.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(err) => Err(anyhow::Error::new(err)
                    .context(format!("minification of {} failed", path.display()))),
            }
        }
    });

    let outcome = run_batch(jobs, config.batch_limit()).await;
    pool.shutdown();
    outcome?;

    let summary = PipelineSummary {
        files_minified: files_minified.load(Ordering::Relaxed),
        files_skipped: files_skipped.load(Ordering::Relaxed),
        bytes_saved: bytes_saved.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    };
    info!(
        files_minified = summary.files_minified,
        files_skipped = summary.files_skipped,
        bytes_saved = summary.bytes_saved,
        "pipeline finished"
    );
    Ok(summary)
}
