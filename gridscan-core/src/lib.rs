//! gridscan-core: Core types for grid-partitioned DBSCAN.
//!
//! This crate provides the point and label model, bounding boxes and grid
//! cell coordinates, run configuration, and the error types shared by the
//! partitioner, the clustering engine and the worker pool.
//!

pub mod bounds;
pub mod clustering;
pub mod config;
pub mod error;
pub mod point;

pub use bounds::{BoundingBox, CellIndex};
pub use clustering::{ClusteringConfig, ClusteringError, PartitionSummary};
pub use config::RunConfig;
pub use error::{Error, JobError, PoolError, Result};
pub use point::{GeoPoint, Label, LabeledPoint};
