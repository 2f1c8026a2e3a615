//! Clustering configuration, per-partition results and errors.

use crate::CellIndex;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors raised while clustering a single partition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusteringError {
    /// Neighborhood radius is negative, NaN or infinite.
    #[error("invalid epsilon: {0}")]
    InvalidEpsilon(f64),

    /// A cluster label would not fit in the label type.
    #[error("label overflow: offset {offset} + {clusters} clusters exceeds i64")]
    LabelOverflow { offset: i64, clusters: usize },
    /// A label offset would turn a cluster id into zero or noise.
    #[error("label offset {offset} + {clusters} clusters is not a positive cluster id")]
    NonPositiveLabel { offset: i64, clusters: usize },
}

/// Density parameters shared by every partition of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringConfig {
    /// Neighborhood radius, in degrees.
    pub epsilon: f64,
    /// Minimum neighborhood size (the point itself included) of a core point.
    pub min_points: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.0003, // ~30 m at NYC latitudes
            min_points: 5,
        }
    }
}

impl ClusteringConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the neighborhood radius.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the minimum neighborhood size.
    #[must_use]
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Checks that `epsilon` is a usable radius.
    ///
    /// # Errors
    /// Returns [`ClusteringError::InvalidEpsilon`] if epsilon is negative or
    /// not finite.
    pub fn validate(&self) -> Result<(), ClusteringError> {
        if self.epsilon.is_finite() && self.epsilon >= 0.0 {
            Ok(())
        } else {
            Err(ClusteringError::InvalidEpsilon(self.epsilon))
        }
    }
}

/// Outcome of clustering one partition.
///
/// Its `Display` is the per-partition diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionSummary {
    /// Grid cell the partition was built for.
    pub cell: CellIndex,
    /// Offset added to every cluster id of this partition.
    pub label_offset: i64,
    /// Clusters created, not offset-adjusted.
    pub cluster_count: usize,
    /// Points in the partition, halo included.
    pub point_count: usize,
}

impl fmt::Display for PartitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Partition {:>10} : [{:>4},{:>6}]",
            self.label_offset, self.cluster_count, self.point_count
        )
    }
}
