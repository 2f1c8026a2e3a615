//! gridscan CLI: Partitioned parallel DBSCAN over point files.
//!
//! Loads latitude/longitude points from a CSV trip record file, clusters
//! them on an `N x N` grid with a fixed pool of workers and prints a
//! per-partition report.
#![allow(clippy::cast_precision_loss)]

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use gridscan_algorithms::{cluster_grid, GridRun};
use gridscan_core::{BoundingBox, GeoPoint, RunConfig};
use gridscan_io::{PointSet, RecordLayout, ReportWriter, RunSummary, TripRecordReader};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input error: {0}")]
    GridscanIo(#[from] gridscan_io::Error),

    #[error("core error: {0}")]
    Core(#[from] gridscan_core::Error),

    #[error("invalid bounds: expected MIN_LAT,MIN_LONG,MAX_LAT,MAX_LONG")]
    BoundsArity,

    #[error("{failed} of {total} partitions failed")]
    FailedJobs { failed: usize, total: usize },
}

/// Partitioned parallel DBSCAN for geographic points.
#[derive(Parser)]
#[command(name = "gridscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that loads an input file.
#[derive(Args)]
struct InputArgs {
    /// Input CSV file (first line is a header)
    input: PathBuf,

    /// Zero-based column holding the latitude
    #[arg(long, default_value = "8")]
    lat_column: usize,

    /// Zero-based column holding the longitude
    #[arg(long, default_value = "9")]
    long_column: usize,
}

/// Clustering parameters.
#[derive(Args)]
struct ClusterArgs {
    /// Grid dimension N; the space is split into N x N partitions
    #[arg(short = 'n', long, default_value = "4")]
    grid_size: usize,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Minimum neighborhood size, the point itself included
    #[arg(long, default_value = "5")]
    min_pts: usize,

    /// Neighborhood radius in degrees
    #[arg(long, default_value = "0.0003")]
    eps: f64,

    /// Grid extent; defaults to the bounds of the data
    #[arg(
        long,
        value_name = "MIN_LAT,MIN_LONG,MAX_LAT,MAX_LONG",
        value_delimiter = ',',
        allow_negative_numbers = true
    )]
    bounds: Option<Vec<f64>>,

    /// Label offset distance between consecutive partitions
    #[arg(long, default_value = "1000000")]
    label_stride: i64,

    /// Capacity of the job queue (0 hands jobs over one at a time)
    #[arg(long, default_value = "0")]
    queue_capacity: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a point file and print the per-partition report
    Cluster {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        cluster: ClusterArgs,

        /// Reconcile cluster ids of points shared by neighboring partitions
        #[arg(long)]
        merge: bool,

        /// Print the run summary as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },

    /// Show information about a point file
    Info {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Time clustering runs with different worker counts
    Benchmark {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        cluster: ClusterArgs,

        /// Worker counts to compare
        #[arg(long, value_delimiter = ',', default_value = "1,2,4,8")]
        worker_counts: Vec<usize>,

        /// Number of iterations per worker count
        #[arg(short, long, default_value = "3")]
        iterations: usize,
    },
}

impl InputArgs {
    fn load(&self) -> Result<PointSet> {
        let layout = RecordLayout {
            lat_column: self.lat_column,
            long_column: self.long_column,
        };
        let reader = TripRecordReader::open(&self.input)?.with_layout(layout);
        Ok(reader.read_points()?)
    }
}

impl ClusterArgs {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::new()
            .with_grid_size(self.grid_size)
            .with_workers(self.workers)
            .with_min_points(self.min_pts)
            .with_epsilon(self.eps)
            .with_label_stride(self.label_stride)
            .with_queue_capacity(self.queue_capacity);
        if let Some(values) = &self.bounds {
            let [min_lat, min_long, max_lat, max_long] = values[..] else {
                return Err(CliError::BoundsArity);
            };
            let bounds = BoundingBox::new(
                GeoPoint::new(min_lat, min_long),
                GeoPoint::new(max_lat, max_long),
            )?;
            config = config.with_bounds(bounds);
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Cluster {
            input,
            cluster,
            merge,
            json,
        } => run_cluster(&input, &cluster, merge, json),
        Commands::Info { input } => run_info(&input),
        Commands::Benchmark {
            input,
            cluster,
            worker_counts,
            iterations,
        } => run_benchmark(&input, &cluster, &worker_counts, iterations),
    }
}

fn run_cluster(input: &InputArgs, cluster: &ClusterArgs, merge: bool, json: bool) -> Result<()> {
    let start = Instant::now();
    let config = cluster.run_config()?;
    let set = input.load()?;
    log::info!("loaded {} points from {}", set.len(), input.input.display());

    let run = cluster_grid(&set.points, &config)?;
    let merged = merge.then(|| run.merge());
    let elapsed = start.elapsed();
    log::info!(
        "clustered {} points into {} clusters in {elapsed:?}",
        run.input_points,
        run.total_clusters()
    );

    let stdout = io::stdout();
    if json {
        RunSummary::new(&run, merged.as_ref(), elapsed).write_json(stdout.lock())?;
    } else {
        ReportWriter::new(stdout.lock()).write_report(&run, merged.as_ref(), elapsed)?;
    }

    check_failures(&run)
}

fn check_failures(run: &GridRun) -> Result<()> {
    let failed = run.failures().count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::FailedJobs {
            failed,
            total: run.outcomes().len(),
        })
    }
}

fn run_info(input: &InputArgs) -> Result<()> {
    let reader = TripRecordReader::open(&input.input)?;
    let file_size = reader.file_size();

    println!("File: {}", input.input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        file_size,
        file_size as f64 / 1_000_000.0
    );

    let set = input.load()?;
    println!("Points: {}", set.len());
    println!(
        "Latitude range: {:.6} - {:.6}",
        set.bounds.min.lat, set.bounds.max.lat
    );
    println!(
        "Longitude range: {:.6} - {:.6}",
        set.bounds.min.long, set.bounds.max.long
    );
    Ok(())
}

fn run_benchmark(
    input: &InputArgs,
    cluster: &ClusterArgs,
    worker_counts: &[usize],
    iterations: usize,
) -> Result<()> {
    let base = cluster.run_config()?;
    let set = input.load()?;

    println!(
        "Benchmarking {} points on a {n}x{n} grid, {} iterations",
        set.len(),
        iterations,
        n = base.grid_size
    );
    println!(
        "{:<10} | {:<15} | {:<15} | {:<15}",
        "Workers", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
    );
    println!("{:-<65}", "");

    let mut stdout = io::stdout().lock();
    for &workers in worker_counts {
        let config = base.clone().with_workers(workers);
        config.validate()?;

        // Warmup
        check_failures(&cluster_grid(&set.points, &config)?)?;

        let mut times = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let start = Instant::now();
            let run = cluster_grid(&set.points, &config)?;
            times.push(start.elapsed().as_secs_f64() * 1000.0);
            check_failures(&run)?;
        }

        let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mean_time = times.iter().sum::<f64>() / times.len().max(1) as f64;

        writeln!(
            stdout,
            "{workers:<10} | {mean_time:<15.2} | {min_time:<15.2} | {max_time:<15.2}"
        )?;
    }
    Ok(())
}
