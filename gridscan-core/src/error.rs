//! Error types for gridscan-core.

use crate::clustering::ClusteringError;
use crate::CellIndex;
use thiserror::Error;

/// Result type alias for gridscan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for gridscan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Unusable bounding box.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// Clustering error.
    #[error("clustering error: {0}")]
    Clustering(#[from] ClusteringError),

    /// Worker pool error.
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Failure of a single job; siblings keep running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// The engine rejected the job.
    #[error("cell {cell}: {source}")]
    Clustering {
        cell: CellIndex,
        #[source]
        source: ClusteringError,
    },

    /// The engine panicked while clustering the partition.
    #[error("cell {cell}: worker panicked: {message}")]
    Panicked { cell: CellIndex, message: String },
}

impl JobError {
    /// Cell of the failed job.
    #[must_use]
    pub fn cell(&self) -> CellIndex {
        match self {
            Self::Clustering { cell, .. } | Self::Panicked { cell, .. } => *cell,
        }
    }
}

/// Failures of the worker pool itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A pool needs at least one worker.
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    /// Every worker exited before the queue was drained.
    #[error("job queue closed with {pending} job(s) not enqueued")]
    QueueClosed { pending: usize },

    /// Fewer completion signals than workers.
    #[error("completion barrier broken: {received} of {expected} workers signalled")]
    BarrierBroken { expected: usize, received: usize },
}
