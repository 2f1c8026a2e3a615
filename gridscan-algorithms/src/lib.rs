//! gridscan-algorithms: Partitioned parallel DBSCAN.
//!
//! This crate provides the pieces of a partitioned clustering run:
//! - **Grid** - `N x N` partitioning with eps halos
//! - **DBSCAN** - Density-based clustering with noise handling
//! - **Pool** - Fixed worker pool with a completion barrier
//! - **Merge** - Union-Find reconciliation of halo duplicates
//!
#![warn(missing_docs)]

mod dbscan;
mod grid;
mod merge;
mod pool;
mod processing;
pub mod spatial;

pub use dbscan::{range_query, DbscanClustering, DbscanConfig, DbscanState};
pub use grid::{Grid, GridPartitioner, Partition};
pub use merge::{merge_labels, LabelMerge};
pub use pool::{
    ClusterResult, CompletionBarrier, CompletionSignal, Job, JobOutcome, PoolReport, WorkerPool,
};
pub use processing::{build_jobs, cluster_grid, data_bounds, GridRun};
pub use spatial::SpatialGrid;

// Re-export core configuration types
pub use gridscan_core::{ClusteringConfig, PartitionSummary, RunConfig};
