//! Partition-local DBSCAN clustering.
//!
//! Labels are mutated in place on a slice of [`LabeledPoint`]s. A point's
//! neighborhood includes the point itself, and a core point needs at least
//! `min_points` neighbors counted that way.

use crate::spatial::SpatialGrid;
use gridscan_core::{ClusteringConfig, ClusteringError, GeoPoint, Label, LabeledPoint};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Partitions smaller than this are scanned brute force.
const INDEX_THRESHOLD: usize = 64;

/// Largest cell count per axis the spatial index is trusted with.
const MAX_CELLS_PER_AXIS: f64 = 1e12;

/// DBSCAN parameters for one partition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DbscanConfig {
    /// Neighborhood radius in degrees.
    pub epsilon: f64,
    /// Minimum neighborhood size, the point itself included.
    pub min_points: usize,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        let generic = ClusteringConfig::default();
        Self {
            epsilon: generic.epsilon,
            min_points: generic.min_points,
        }
    }
}

impl From<&ClusteringConfig> for DbscanConfig {
    fn from(config: &ClusteringConfig) -> Self {
        Self {
            epsilon: config.epsilon,
            min_points: config.min_points,
        }
    }
}

/// DBSCAN engine.
#[derive(Clone, Debug, Default)]
pub struct DbscanClustering {
    config: DbscanConfig,
}

/// Scratch buffers reused across partitions clustered by the same engine user.
#[derive(Debug, Default)]
pub struct DbscanState {
    index: SpatialGrid,
    indexed: bool,
    neighbors: Vec<usize>,
    candidates: Vec<usize>,
    seeds: Vec<usize>,
}

impl DbscanClustering {
    /// Creates an engine with the given parameters.
    #[must_use]
    pub fn new(config: DbscanConfig) -> Self {
        Self { config }
    }

    /// Engine parameters.
    #[must_use]
    pub fn config(&self) -> &DbscanConfig {
        &self.config
    }

    /// Fresh scratch buffers for [`cluster`](Self::cluster).
    #[must_use]
    pub fn create_state(&self) -> DbscanState {
        DbscanState::default()
    }

    /// Clusters `points` in place and returns the number of clusters created.
    ///
    /// Only unclassified points are visited by the outer scan, so running it
    /// again over a fully labeled partition changes nothing. Cluster `k`
    /// (1-based) is labeled `k + label_offset`.
    ///
    /// Returns the number of clusters this call created. A partition with no
    /// unclassified points reports the distinct cluster ids it already
    /// carries instead, so a re-run returns the first run's count.
    ///
    /// # Errors
    /// Returns [`ClusteringError::InvalidEpsilon`] for a negative or
    /// non-finite radius, [`ClusteringError::LabelOverflow`] when a label
    /// does not fit in `i64` and [`ClusteringError::NonPositiveLabel`] when
    /// the offset pushes a cluster id to zero or below.
    pub fn cluster(
        &self,
        points: &mut [LabeledPoint],
        label_offset: i64,
        state: &mut DbscanState,
    ) -> Result<usize, ClusteringError> {
        let epsilon = self.config.epsilon;
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(ClusteringError::InvalidEpsilon(epsilon));
        }
        if points.is_empty() {
            return Ok(0);
        }

        let already_labeled = points.iter().all(|p| !p.label.is_unclassified());
        if already_labeled {
            return Ok(count_partition_clusters(points, label_offset));
        }

        self.build_index(points, state);

        let DbscanState {
            index,
            indexed,
            neighbors,
            candidates,
            seeds,
        } = state;
        let index = (*indexed).then_some(&*index);

        let mut cluster_count = 0usize;

        for p in 0..points.len() {
            if !points[p].label.is_unclassified() {
                continue;
            }

            self.region_query_into(points, p, index, candidates, neighbors);

            if neighbors.len() < self.config.min_points {
                points[p].label = Label::NOISE;
                continue;
            }

            cluster_count += 1;
            let label = cluster_label(label_offset, cluster_count)?;
            points[p].label = label;

            seeds.clear();
            seeds.extend_from_slice(neighbors);
            self.expand_cluster(points, label, index, seeds, candidates, neighbors);
        }

        Ok(cluster_count)
    }

    /// Grows one cluster from its seed set.
    ///
    /// The frontier is walked by index while it grows; duplicates are allowed
    /// and skipped once labeled.
    fn expand_cluster(
        &self,
        points: &mut [LabeledPoint],
        label: Label,
        index: Option<&SpatialGrid>,
        seeds: &mut Vec<usize>,
        candidates: &mut Vec<usize>,
        neighbors: &mut Vec<usize>,
    ) {
        let mut q = 0;
        while q < seeds.len() {
            let current = seeds[q];
            q += 1;

            if points[current].label.is_noise() {
                // Border point: joins the cluster, never expands it.
                points[current].label = label;
            }
            if !points[current].label.is_unclassified() {
                continue;
            }

            points[current].label = label;

            self.region_query_into(points, current, index, candidates, neighbors);
            if neighbors.len() >= self.config.min_points {
                seeds.extend_from_slice(neighbors);
            }
        }
    }

    /// Indices of all points within `epsilon` of `points[idx]`, itself
    /// included, in sequence order.
    fn region_query_into(
        &self,
        points: &[LabeledPoint],
        idx: usize,
        index: Option<&SpatialGrid>,
        candidates: &mut Vec<usize>,
        neighbors: &mut Vec<usize>,
    ) {
        let center = points[idx].point;
        let epsilon = self.config.epsilon;
        neighbors.clear();

        match index {
            Some(grid) => {
                candidates.clear();
                grid.query_neighborhood_into(&center, candidates);
                neighbors.extend(
                    candidates
                        .iter()
                        .copied()
                        .filter(|&j| center.distance(&points[j].point) <= epsilon),
                );
                neighbors.sort_unstable();
            }
            None => {
                neighbors.extend(
                    points
                        .iter()
                        .enumerate()
                        .filter(|(_, other)| center.distance(&other.point) <= epsilon)
                        .map(|(j, _)| j),
                );
            }
        }
    }

    fn build_index(&self, points: &[LabeledPoint], state: &mut DbscanState) {
        state.indexed = false;
        let epsilon = self.config.epsilon;
        if points.len() < INDEX_THRESHOLD || epsilon <= 0.0 {
            return;
        }

        // Twice the radius keeps the 3x3 lookup exhaustive under rounding.
        let cell_size = epsilon * 2.0;
        let extent = points
            .iter()
            .map(|p| p.lat().abs().max(p.long().abs()))
            .fold(0.0_f64, f64::max);
        let cells_per_axis = extent / cell_size;
        if cells_per_axis.is_nan() || cells_per_axis >= MAX_CELLS_PER_AXIS {
            return;
        }

        state.index.reset(cell_size);
        for (i, p) in points.iter().enumerate() {
            state.index.insert(&p.point, i);
        }
        state.indexed = true;
    }
}

fn cluster_label(offset: i64, cluster: usize) -> Result<Label, ClusteringError> {
    let id = i64::try_from(cluster)
        .ok()
        .and_then(|k| k.checked_add(offset))
        .ok_or(ClusteringError::LabelOverflow {
            offset,
            clusters: cluster,
        })?;
    if id <= 0 {
        return Err(ClusteringError::NonPositiveLabel {
            offset,
            clusters: cluster,
        });
    }
    Ok(Label::cluster(id))
}

/// Number of distinct cluster ids above `label_offset` present in `points`.
fn count_partition_clusters(points: &[LabeledPoint], label_offset: i64) -> usize {
    let mut ids: Vec<i64> = points
        .iter()
        .filter_map(|p| p.label.cluster_id())
        .filter(|&id| id > label_offset)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

/// Brute-force eps-neighborhood of `center` over `points`, in sequence order.
///
/// Counts the center itself if it is part of `points`.
#[must_use]
pub fn range_query(points: &[LabeledPoint], center: &GeoPoint, epsilon: f64) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| center.distance(&p.point) <= epsilon)
        .map(|(i, _)| i)
        .collect()
}
