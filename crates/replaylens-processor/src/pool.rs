//! Bounded worker pool with rendezvous dispatch.
//!
//! A fixed number of long-lived worker tasks each offer the dispatcher a
//! one-shot slot when they are idle. The dispatcher walks the input set
//! and hands each path to exactly one offered slot, so the walk only ever
//! runs one path ahead of the slowest free worker.
//!
//! # Shutdown
//!
//! The caller's shutdown token stops the walk. A worker failure cancels a
//! child of that token, which also stops the walk. In both cases workers
//! finish the file they hold and then exit once the dispatcher drops its
//! side of the ready channel.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use replaylens_types::GameId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{IngestError, PoolError};
use crate::tracker::SkipReason;
use crate::walk::ReplayWalker;

/// Result of running one file through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The game's rows were replaced in the store.
    Loaded {
        /// Game the file maps to.
        game_id: GameId,
        /// Composition deltas written.
        deltas: u64,
        /// Stats samples written.
        samples: u64,
    },
    /// The file failed the validity gate; nothing was written.
    Skipped(SkipReason),
}

/// Per-file processing invoked by a worker.
pub trait FilePipeline: Send + Sync + 'static {
    /// Process the file at `path` to completion.
    fn process(&self, path: &Path) -> impl Future<Output = Result<FileOutcome, IngestError>> + Send;
}

/// Totals for one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Paths handed to a worker.
    pub dispatched: u64,
    /// Files loaded.
    pub loaded: u64,
    /// Files skipped by the validity gate.
    pub skipped: u64,
    /// Whether the shutdown token stopped the walk.
    pub interrupted: bool,
}

#[derive(Debug, Default)]
struct WorkerTally {
    loaded: u64,
    skipped: u64,
}

/// Fixed-size pool of file workers.
pub struct WorkerPool<P> {
    pipeline: Arc<P>,
    workers: usize,
}

impl<P: FilePipeline> WorkerPool<P> {
    /// Create a pool of `workers` tasks (at least one).
    pub fn new(pipeline: Arc<P>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
        }
    }

    /// Number of worker tasks.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Dispatch every path `walker` yields until it is exhausted, a worker
    /// fails, or `shutdown` is cancelled.
    ///
    /// Returns once every worker has exited.
    ///
    /// # Errors
    ///
    /// Returns the first worker failure as [`PoolError::File`], or
    /// [`PoolError::Walk`] if the input walk failed.
    pub async fn run(
        &self,
        mut walker: ReplayWalker,
        shutdown: &CancellationToken,
    ) -> Result<PoolReport, PoolError> {
        let halt = shutdown.child_token();
        let (ready_tx, mut ready_rx) = mpsc::channel(self.workers);

        let mut set = JoinSet::new();
        for id in 0..self.workers {
            let pipeline = Arc::clone(&self.pipeline);
            let ready = ready_tx.clone();
            let halt = halt.clone();
            set.spawn(
                work(pipeline, ready, halt).instrument(tracing::info_span!("worker", id)),
            );
        }
        drop(ready_tx);

        tracing::info!(workers = self.workers, "dispatch started");
        let dispatched = dispatch(&mut walker, &mut ready_rx, &halt).await;
        // Releases idle workers parked on an undelivered slot.
        drop(ready_rx);

        let mut report = PoolReport::default();
        let mut failure = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(tally)) => {
                    report.loaded = report.loaded.saturating_add(tally.loaded);
                    report.skipped = report.skipped.saturating_add(tally.skipped);
                }
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(PoolError::WorkerPanicked(e.to_string()));
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        report.dispatched = dispatched?;
        report.interrupted = shutdown.is_cancelled();

        tracing::info!(
            dispatched = report.dispatched,
            loaded = report.loaded,
            skipped = report.skipped,
            interrupted = report.interrupted,
            "dispatch finished"
        );
        Ok(report)
    }
}

async fn dispatch(
    walker: &mut ReplayWalker,
    ready: &mut mpsc::Receiver<oneshot::Sender<PathBuf>>,
    halt: &CancellationToken,
) -> Result<u64, PoolError> {
    let mut dispatched: u64 = 0;

    'walk: while !halt.is_cancelled() {
        let Some(mut path) = walker.next_path().await? else {
            break;
        };

        loop {
            let slot = tokio::select! {
                biased;
                () = halt.cancelled() => break 'walk,
                slot = ready.recv() => slot,
            };
            // Every worker has exited.
            let Some(slot) = slot else {
                break 'walk;
            };
            match slot.send(path) {
                Ok(()) => {
                    dispatched = dispatched.saturating_add(1);
                    continue 'walk;
                }
                Err(returned) => path = returned,
            }
        }
    }

    if halt.is_cancelled() {
        tracing::info!(dispatched, "walk stopped");
    }
    Ok(dispatched)
}

async fn work<P: FilePipeline>(
    pipeline: Arc<P>,
    ready: mpsc::Sender<oneshot::Sender<PathBuf>>,
    halt: CancellationToken,
) -> Result<WorkerTally, PoolError> {
    let mut tally = WorkerTally::default();

    loop {
        let (slot, handoff) = oneshot::channel();
        if ready.send(slot).await.is_err() {
            break;
        }
        let Ok(path) = handoff.await else {
            break;
        };

        tracing::info!(path = %path.display(), "processing file");
        match pipeline.process(&path).await {
            Ok(FileOutcome::Loaded {
                game_id,
                deltas,
                samples,
            }) => {
                tracing::info!(path = %path.display(), %game_id, deltas, samples, "file loaded");
                tally.loaded = tally.loaded.saturating_add(1);
            }
            Ok(FileOutcome::Skipped(reason)) => {
                tracing::info!(path = %path.display(), %reason, "file skipped");
                tally.skipped = tally.skipped.saturating_add(1);
            }
            Err(source) => {
                tracing::error!(path = %path.display(), error = %source, "file failed");
                halt.cancel();
                return Err(PoolError::File { path, source });
            }
        }
    }

    Ok(tally)
}
