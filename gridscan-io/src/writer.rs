//! Run report writers.
//!
//! The plain-text report prints the input summary, the pool layout, one line
//! per clustered partition and the execution time. The same information is
//! available as a [`RunSummary`] for JSON output.

use crate::Result;
use gridscan_algorithms::{GridRun, LabelMerge};
use gridscan_core::{BoundingBox, JobError, PartitionSummary};
use std::io::Write;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Writer for the plain-text run report.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    /// Wraps an output stream.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes the point count and the grid extent.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_input(&mut self, points: usize, bounds: &BoundingBox) -> Result<()> {
        writeln!(self.out, "Number of points: {points}")?;
        writeln!(
            self.out,
            "NW:({:.6} , {:.6})",
            bounds.min.long, bounds.min.lat
        )?;
        writeln!(
            self.out,
            "SE:({:.6} , {:.6}) \n",
            bounds.max.long, bounds.max.lat
        )?;
        Ok(())
    }

    /// Writes the grid dimension and worker count.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_pool(&mut self, grid_size: usize, workers: usize) -> Result<()> {
        writeln!(self.out, "N = {grid_size} and {workers} consumer threads.\n")?;
        Ok(())
    }

    /// Writes one partition line.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_partition(&mut self, summary: &PartitionSummary) -> Result<()> {
        writeln!(self.out, "{summary}")?;
        Ok(())
    }

    /// Writes one failed job.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_failure(&mut self, error: &JobError) -> Result<()> {
        writeln!(self.out, "Partition failed at {error}")?;
        Ok(())
    }

    /// Writes the outcome of every job in enqueue order.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_run(&mut self, run: &GridRun) -> Result<()> {
        self.write_pool(run.grid_size, run.report.workers_signalled)?;
        for outcome in run.outcomes() {
            match &outcome.result {
                Ok(summary) => self.write_partition(summary)?,
                Err(err) => self.write_failure(err)?,
            }
        }
        if run.outside_points > 0 {
            writeln!(
                self.out,
                "{} points outside the grid were not clustered",
                run.outside_points
            )?;
        }
        Ok(())
    }

    /// Writes the cross-partition merge result.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_merge(&mut self, merge: &LabelMerge) -> Result<()> {
        writeln!(
            self.out,
            "\nMerged clusters: {} ({} labels folded, {} noise points of {})",
            merge.cluster_count,
            merge.merged_labels,
            merge.noise_count(),
            merge.point_count()
        )?;
        Ok(())
    }

    /// Writes the end-of-run timing line and flushes.
    ///
    /// `points` is the number of input points, halo copies excluded.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_execution_time(&mut self, elapsed: Duration, points: usize) -> Result<()> {
        writeln!(self.out, "\nExecution time: {elapsed:?} of {points} points")?;
        self.out.flush()?;
        Ok(())
    }

    /// Writes the full text report of a finished run.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be written.
    pub fn write_report(
        &mut self,
        run: &GridRun,
        merge: Option<&LabelMerge>,
        elapsed: Duration,
    ) -> Result<()> {
        self.write_input(run.input_points, &run.bounds)?;
        self.write_run(run)?;
        if let Some(merge) = merge {
            self.write_merge(merge)?;
        }
        self.write_execution_time(elapsed, run.input_points)
    }
}

/// Machine-readable summary of a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RunSummary {
    /// Grid dimension `N`.
    pub grid_size: usize,
    /// Workers that signalled completion.
    pub workers: usize,
    /// Grid extent.
    pub bounds: BoundingBox,
    /// Points loaded.
    pub input_points: usize,
    /// Sum of partition lengths, halo copies included.
    pub partitioned_points: usize,
    /// Points outside every partition.
    pub outside_points: usize,
    /// Successful partitions in enqueue order.
    pub partitions: Vec<PartitionSummary>,
    /// Failed jobs, formatted.
    pub failures: Vec<String>,
    /// Cluster count after merging, when merging ran.
    pub merged_clusters: Option<usize>,
    /// Wall time in milliseconds.
    pub elapsed_ms: f64,
}

impl RunSummary {
    /// Collects the summary of a finished run.
    #[must_use]
    pub fn new(run: &GridRun, merge: Option<&LabelMerge>, elapsed: Duration) -> Self {
        Self {
            grid_size: run.grid_size,
            workers: run.report.workers_signalled,
            bounds: run.bounds,
            input_points: run.input_points,
            partitioned_points: run.partitioned_points,
            outside_points: run.outside_points,
            partitions: run.summaries().copied().collect(),
            failures: run.failures().map(ToString::to_string).collect(),
            merged_clusters: merge.map(|m| m.cluster_count),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Sum of partition-local cluster counts.
    #[must_use]
    pub fn total_clusters(&self) -> usize {
        self.partitions.iter().map(|p| p.cluster_count).sum()
    }

    /// Writes the summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    #[cfg(feature = "serde")]
    pub fn write_json<W: Write>(&self, mut out: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut out, self)?;
        writeln!(out)?;
        Ok(())
    }
}
