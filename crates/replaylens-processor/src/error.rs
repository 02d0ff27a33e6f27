//! Error types for the replay processor.
//!
//! Uses `thiserror` for typed errors that surface through the ingestion
//! pipeline: decoding, tracking, bulk loading, and the worker pool. A
//! skipped replay is not an error; see [`SkipReason`](crate::tracker::SkipReason).

use std::path::PathBuf;

use replaylens_db::{DbError, LoaderError};
use replaylens_types::UnitTag;

use crate::event::EventKind;

/// Errors raised while turning a replay file into events.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being decoded.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid decoder dump.
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        /// File being decoded.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A known event kind lacks an attribute or carries the wrong type.
    #[error("{kind:?} event at loop {loop_id}: attribute {name} {problem}")]
    Attribute {
        /// Event kind being decoded.
        kind: EventKind,
        /// Loop of the event.
        loop_id: i64,
        /// Attribute name.
        name: &'static str,
        /// What was wrong with it.
        problem: &'static str,
    },
}

/// Integrity violations detected by the unit lifecycle tracker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// An event referenced a unit that was never created.
    #[error("{kind:?} event at loop {loop_id} references unknown unit {tag}")]
    UnknownUnit {
        /// Event kind.
        kind: EventKind,
        /// Referenced tag.
        tag: UnitTag,
        /// Loop of the event.
        loop_id: i64,
    },

    /// A unit was created over a tag that is still alive.
    #[error("{kind:?} event at loop {loop_id} reuses live unit tag {tag}")]
    DuplicateUnit {
        /// Event kind.
        kind: EventKind,
        /// Reused tag.
        tag: UnitTag,
        /// Loop of the event.
        loop_id: i64,
    },
}

/// Fatal failure while ingesting one file.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Decoding failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The event stream violated a lifecycle invariant.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// A metadata write failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A bulk load failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// The blocking decode task panicked or was cancelled.
    #[error("decode task failed: {0}")]
    TaskFailed(String),
}

/// A directory walk failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to walk {}: {source}", path.display())]
pub struct WalkError {
    /// Path being listed.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

/// Errors that end a worker pool run.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The input walk failed.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// A worker failed to ingest a file.
    #[error("failed to ingest {}: {source}", path.display())]
    File {
        /// The offending file.
        path: PathBuf,
        /// Why ingestion failed.
        #[source]
        source: IngestError,
    },

    /// A worker task panicked.
    #[error("worker task failed: {0}")]
    WorkerPanicked(String),
}

/// Errors that can occur while starting or finishing the processor.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The store could not be prepared or the post-process step failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The ingestion run failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
