//! High-level driver: partition, enqueue, cluster, wait.

use crate::dbscan::DbscanConfig;
use crate::grid::{Grid, GridPartitioner};
use crate::merge::{merge_labels, LabelMerge};
use crate::pool::{Job, JobOutcome, PoolReport, WorkerPool};
use gridscan_core::{
    BoundingBox, Error, GeoPoint, JobError, LabeledPoint, PartitionSummary, Result, RunConfig,
};

/// Result of a full partitioned run.
#[derive(Debug)]
pub struct GridRun {
    /// Grid dimension `N`.
    pub grid_size: usize,
    /// Unexpanded grid extent.
    pub bounds: BoundingBox,
    /// Points handed to the partitioner.
    pub input_points: usize,
    /// Sum of partition lengths, halo copies included.
    pub partitioned_points: usize,
    /// Input points outside every partition.
    pub outside_points: usize,
    /// Pool completion report; outcomes are in enqueue order.
    pub report: PoolReport,
}

impl GridRun {
    /// Per-partition summaries of the jobs that succeeded, in enqueue order.
    pub fn summaries(&self) -> impl Iterator<Item = &PartitionSummary> {
        self.report
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
    }

    /// Errors of the jobs that failed, in enqueue order.
    pub fn failures(&self) -> impl Iterator<Item = &JobError> {
        self.report
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err())
    }

    /// All job outcomes in enqueue order.
    #[must_use]
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.report.outcomes
    }

    /// Sum of partition-local cluster counts.
    #[must_use]
    pub fn total_clusters(&self) -> usize {
        self.summaries().map(|s| s.cluster_count).sum()
    }

    /// Reconciles cluster ids across partitions.
    ///
    /// Only successfully clustered partitions take part.
    #[must_use]
    pub fn merge(&self) -> LabelMerge {
        let partitions: Vec<&[LabeledPoint]> = self
            .report
            .outcomes
            .iter()
            .filter(|o| o.is_ok())
            .map(|o| o.points.as_slice())
            .collect();
        merge_labels(&partitions)
    }
}

/// Grid extent covering every point, `None` for an empty set.
///
/// The upper corner is nudged outward so points on the maximum edge still
/// fall inside the half-open last cell, and a flat axis gets a non-zero
/// extent.
#[must_use]
pub fn data_bounds(points: &[LabeledPoint]) -> Option<BoundingBox> {
    let tight = BoundingBox::from_points(points.iter().map(|p| &p.point))?;
    let pad = |lo: f64, hi: f64| {
        let scale = lo.abs().max(hi.abs());
        ((hi - lo) * 1e-9)
            .max(scale * 16.0 * f64::EPSILON)
            .max(f64::MIN_POSITIVE)
    };
    Some(BoundingBox {
        min: tight.min,
        max: GeoPoint::new(
            tight.max.lat + pad(tight.min.lat, tight.max.lat),
            tight.max.long + pad(tight.min.long, tight.max.long),
        ),
    })
}

/// Turns a grid into one job per cell, in enqueue order.
#[must_use]
pub fn build_jobs(grid: Grid, config: &RunConfig) -> Vec<Job> {
    let n = grid.size();
    let dbscan = DbscanConfig::from(&config.clustering);
    grid.into_partitions()
        .into_iter()
        .map(|partition| Job {
            cell: partition.cell,
            label_offset: config.label_offset(partition.cell.linear(n)),
            points: partition.points,
            config: dbscan.clone(),
        })
        .collect()
}

/// Partitions `points`, clusters every cell on a pool of `config.workers`
/// workers and waits for all of them.
///
/// Per-job failures are reported in the returned [`GridRun`]; only
/// configuration and pool failures abort the run.
///
/// # Errors
/// Returns [`Error::ConfigError`] or [`Error::Clustering`] for an invalid
/// configuration, [`Error::InvalidBounds`] when no usable grid extent exists,
/// and [`Error::Pool`] if the pool fails.
pub fn cluster_grid(points: &[LabeledPoint], config: &RunConfig) -> Result<GridRun> {
    config.validate()?;

    let bounds = match config.bounds {
        Some(bounds) => bounds,
        None => data_bounds(points).ok_or_else(|| {
            Error::InvalidBounds("no points to derive grid bounds from".into())
        })?,
    };

    let partitioner = GridPartitioner::new(config.grid_size, config.clustering.epsilon)?;
    let grid = partitioner.partition(points, &bounds)?;
    log::info!(
        "partitioned {} points into {n}x{n} grid: {} copies, {} outside",
        points.len(),
        grid.total_len(),
        grid.outside(),
        n = grid.size(),
    );

    let partitioned_points = grid.total_len();
    let outside_points = grid.outside();
    let jobs = build_jobs(grid, config);

    let pool = WorkerPool::new(config.workers)?.with_queue_capacity(config.queue_capacity);
    let report = pool.run(jobs)?;

    Ok(GridRun {
        grid_size: config.grid_size,
        bounds,
        input_points: points.len(),
        partitioned_points,
        outside_points,
        report,
    })
}
