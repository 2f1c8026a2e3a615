#![allow(clippy::cast_precision_loss, clippy::uninlined_format_args)]
use gridscan_algorithms::{
    build_jobs, cluster_grid, CompletionBarrier, GridPartitioner, RunConfig, WorkerPool,
};
use gridscan_core::{BoundingBox, GeoPoint, LabeledPoint, PoolError};
use std::time::Instant;

fn lattice(n: u32, spacing: f64) -> Vec<LabeledPoint> {
    (0..n * n)
        .map(|k| {
            LabeledPoint::new(
                u64::from(k),
                f64::from(k / n) * spacing + spacing / 3.0,
                f64::from(k % n) * spacing + spacing / 3.0,
            )
        })
        .collect()
}

fn unit_bounds() -> BoundingBox {
    BoundingBox::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)).unwrap()
}

#[test]
fn test_no_halo_overlap_means_no_copies() {
    let points = lattice(20, 0.05);
    let grid = GridPartitioner::new(4, 0.001)
        .unwrap()
        .partition(&points, &unit_bounds())
        .unwrap();
    // Lattice offsets keep every point farther than eps from a cell edge.
    assert_eq!(grid.total_len(), points.len());
    assert_eq!(grid.outside(), 0);
}

#[test]
fn test_halo_overlap_duplicates_points() {
    let mut points = lattice(20, 0.05);
    points.push(LabeledPoint::new(10_000, 0.5005, 0.3));
    let grid = GridPartitioner::new(4, 0.001)
        .unwrap()
        .partition(&points, &unit_bounds())
        .unwrap();
    assert_eq!(grid.total_len(), points.len() + 1);
}

#[test]
fn test_duplication_grows_with_epsilon() {
    let points = lattice(30, 1.0 / 30.0);
    let mut previous = 0;
    for eps in [0.0, 0.005, 0.02, 0.05, 0.2] {
        let grid = GridPartitioner::new(5, eps)
            .unwrap()
            .partition(&points, &unit_bounds())
            .unwrap();
        let total = grid.total_len();
        assert!(total >= points.len());
        assert!(total >= previous, "eps {} shrank partitions", eps);
        previous = total;
    }
    assert!(previous > points.len());
}

#[test]
fn test_every_worker_signals_even_without_jobs() {
    for workers in [1, 4, 16] {
        let report = WorkerPool::new(workers).unwrap().run(Vec::new()).unwrap();
        assert_eq!(report.workers_signalled, workers);
        assert!(report.outcomes.is_empty());
    }
}

#[test]
fn test_barrier_waits_for_all_signals() {
    let barrier = CompletionBarrier::new();
    let signals: Vec<_> = (0..3).map(|w| barrier.signal_for(w)).collect();
    let handle = std::thread::spawn(move || {
        for signal in signals {
            std::thread::sleep(std::time::Duration::from_millis(5));
            drop(signal);
        }
    });
    assert_eq!(barrier.wait(3).unwrap(), 3);
    handle.join().unwrap();
}

#[test]
fn test_barrier_reports_missing_signals() {
    let barrier = CompletionBarrier::new();
    drop(barrier.signal_for(0));
    assert_eq!(
        barrier.wait(2),
        Err(PoolError::BarrierBroken {
            expected: 2,
            received: 1
        })
    );
}

#[test]
fn test_pool_runs_grid_jobs_in_enqueue_order() {
    let points = lattice(40, 0.025);
    let config = RunConfig::new()
        .with_grid_size(4)
        .with_workers(3)
        .with_epsilon(0.03)
        .with_min_points(3)
        .with_bounds(unit_bounds());
    let grid = GridPartitioner::new(4, 0.03)
        .unwrap()
        .partition(&points, &unit_bounds())
        .unwrap();
    let jobs = build_jobs(grid, &config);
    assert_eq!(jobs.len(), 16);

    let report = WorkerPool::new(3).unwrap().run(jobs).unwrap();
    let sequences: Vec<usize> = report.outcomes.iter().map(|o| o.sequence).collect();
    assert_eq!(sequences, (0..16).collect::<Vec<_>>());
    for (k, outcome) in report.outcomes.iter().enumerate() {
        assert_eq!(outcome.cell.linear(4), k);
        assert_eq!(outcome.label_offset, k as i64 * 1_000_000);
        assert!(outcome.is_ok());
    }
}

#[test]
fn test_large_run_completes() {
    let points = lattice(300, 1.0 / 300.0);
    let config = RunConfig::new()
        .with_grid_size(8)
        .with_workers(4)
        .with_epsilon(0.004)
        .with_min_points(5)
        .with_bounds(unit_bounds());

    let start = Instant::now();
    let run = cluster_grid(&points, &config).unwrap();
    println!(
        "clustered {} points ({} copies) in {:?}",
        run.input_points,
        run.partitioned_points,
        start.elapsed()
    );

    assert_eq!(run.failures().count(), 0);
    assert_eq!(run.total_clusters(), 64);
    assert_eq!(run.merge().cluster_count, 1);
}
