//! Run configuration.
//!
//! Every knob of a partitioned run is passed explicitly; there is no
//! process-wide state.

use crate::{BoundingBox, ClusteringConfig, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of one partitioned clustering run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunConfig {
    /// Grid dimension `N`; the space is split into `N x N` cells.
    pub grid_size: usize,
    /// Number of concurrent workers `W`.
    pub workers: usize,
    /// Density parameters.
    pub clustering: ClusteringConfig,
    /// Grid extent. `None` uses the tight bounds of the input.
    pub bounds: Option<BoundingBox>,
    /// Label offset distance between consecutive cells.
    ///
    /// Cell `(i, j)` gets offset `(j * N + i) * label_stride`; ids stay unique
    /// as long as no partition produces `label_stride` clusters or more.
    pub label_stride: i64,
    /// Bounded capacity of the job queue. `0` makes it a rendezvous channel.
    pub queue_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            grid_size: 4,
            workers: 4,
            clustering: ClusteringConfig::default(),
            bounds: None,
            label_stride: 1_000_000,
            queue_capacity: 0,
        }
    }
}

impl RunConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grid dimension.
    #[must_use]
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the neighborhood radius.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.clustering.epsilon = epsilon;
        self
    }

    /// Sets the minimum neighborhood size.
    #[must_use]
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.clustering.min_points = min_points;
        self
    }

    /// Fixes the grid extent.
    #[must_use]
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Sets the label stride.
    #[must_use]
    pub fn with_label_stride(mut self, label_stride: i64) -> Self {
        self.label_stride = label_stride;
        self
    }

    /// Sets the job queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Label offset of a cell given its enqueue position.
    #[must_use]
    pub fn label_offset(&self, linear_index: usize) -> i64 {
        i64::try_from(linear_index)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.label_stride)
    }

    /// Checks the configuration for values that cannot produce a run.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for a zero grid size, zero workers or a
    /// non-positive label stride, and [`Error::Clustering`] for a bad epsilon.
    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(Error::ConfigError("grid size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(Error::ConfigError("worker count must be at least 1".into()));
        }
        if self.label_stride <= 0 {
            return Err(Error::ConfigError(format!(
                "label stride must be positive, got {}",
                self.label_stride
            )));
        }
        self.clustering.validate()?;
        Ok(())
    }
}
