//! Fixed-size worker pool draining a shared job queue.
//!
//! The producer fills a bounded crossbeam channel with one [`Job`] per grid
//! cell and closes it by dropping the sender. Every worker clusters the
//! partitions it receives and, once it observes the closed queue, signals a
//! [`CompletionBarrier`] exactly once. The initiator returns only after all
//! `W` signals arrived, so every partition is fully labeled before any
//! downstream step runs.
//!
//! Partitions move into jobs and back out in [`JobOutcome`]s; no two workers
//! ever see the same partition, so point data is never locked.

use crate::dbscan::{DbscanClustering, DbscanConfig, DbscanState};
use crossbeam_channel::{Receiver, Sender};
use gridscan_core::{
    CellIndex, ClusteringError, JobError, LabeledPoint, PartitionSummary, PoolError,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// One partition to cluster.
#[derive(Debug, Clone)]
pub struct Job {
    /// Grid cell of the partition.
    pub cell: CellIndex,
    /// Point copies owned by this job.
    pub points: Vec<LabeledPoint>,
    /// Density parameters.
    pub config: DbscanConfig,
    /// Offset added to the partition's cluster ids.
    pub label_offset: i64,
}

/// A job handed back by a worker.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Grid cell of the partition.
    pub cell: CellIndex,
    /// Label offset the job was given.
    pub label_offset: i64,
    /// The partition with its labels. After a failure the labels may be
    /// partially assigned.
    pub points: Vec<LabeledPoint>,
    /// Summary on success, the isolated failure otherwise.
    pub result: Result<PartitionSummary, JobError>,
    /// Index of the worker that ran the job.
    pub worker: usize,
    /// Position of the job in the enqueue order.
    pub sequence: usize,
}

impl JobOutcome {
    /// Whether the job clustered its partition.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Completion report of one pool run.
#[derive(Debug, Default)]
pub struct PoolReport {
    /// Outcomes in enqueue order.
    pub outcomes: Vec<JobOutcome>,
    /// Completion signals observed at the barrier.
    pub workers_signalled: usize,
}

impl PoolReport {
    /// Outcomes whose job failed.
    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}

/// Counting barrier released by `n` completion signals.
///
/// Each worker holds a [`CompletionSignal`] that fires on drop, so a worker
/// that unwinds still signals.
#[derive(Debug)]
pub struct CompletionBarrier {
    tx: Sender<usize>,
    rx: Receiver<usize>,
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBarrier {
    /// Creates a barrier with no signals issued.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Token for worker `worker`; signals when dropped.
    #[must_use]
    pub fn signal_for(&self, worker: usize) -> CompletionSignal {
        CompletionSignal {
            worker,
            tx: self.tx.clone(),
        }
    }

    /// Blocks until `n` signals arrived.
    ///
    /// # Errors
    /// Returns [`PoolError::BarrierBroken`] if every signal token was dropped
    /// before `n` signals were observed.
    pub fn wait(self, n: usize) -> Result<usize, PoolError> {
        let Self { tx, rx } = self;
        drop(tx);
        let mut received = 0;
        while received < n {
            match rx.recv() {
                Ok(worker) => {
                    log::trace!("worker {worker} signalled completion");
                    received += 1;
                }
                Err(_) => {
                    return Err(PoolError::BarrierBroken {
                        expected: n,
                        received,
                    })
                }
            }
        }
        Ok(received)
    }
}

/// Fires its barrier exactly once, when dropped.
#[derive(Debug)]
pub struct CompletionSignal {
    worker: usize,
    tx: Sender<usize>,
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        // The barrier may already be gone if the initiator gave up.
        let _ = self.tx.send(self.worker);
    }
}

/// Fixed number of workers sharing one job queue.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Creates a pool of `workers` threads.
    ///
    /// # Errors
    /// Returns [`PoolError::NoWorkers`] if `workers` is zero.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        Ok(Self {
            workers,
            queue_capacity: 0,
        })
    }

    /// Sets the bounded queue capacity; `0` hands jobs over one at a time.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Worker count `W`.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every job exactly once with the DBSCAN engine and waits for all
    /// workers to finish.
    ///
    /// A job that fails or panics yields an `Err` result in its outcome;
    /// the other jobs are unaffected.
    ///
    /// # Errors
    /// Returns [`PoolError::QueueClosed`] if all workers exited before every
    /// job was enqueued, and [`PoolError::BarrierBroken`] if fewer than `W`
    /// workers signalled completion.
    pub fn run<I>(&self, jobs: I) -> Result<PoolReport, PoolError>
    where
        I: IntoIterator<Item = Job>,
    {
        self.run_with(jobs, |config, points, label_offset, state| {
            DbscanClustering::new(config.clone()).cluster(points, label_offset, state)
        })
    }

    /// Like [`run`](Self::run), with a custom per-partition clustering routine.
    ///
    /// # Errors
    /// Same as [`run`](Self::run).
    pub fn run_with<I, F>(&self, jobs: I, cluster: F) -> Result<PoolReport, PoolError>
    where
        I: IntoIterator<Item = Job>,
        F: Fn(&DbscanConfig, &mut [LabeledPoint], i64, &mut DbscanState) -> ClusterResult + Sync,
    {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, Job)>(self.queue_capacity);
        let (out_tx, out_rx) = crossbeam_channel::unbounded::<JobOutcome>();
        let barrier = CompletionBarrier::new();
        let cluster = &cluster;

        let workers_signalled = thread::scope(|scope| {
            for worker in 0..self.workers {
                let jobs = job_rx.clone();
                let outcomes = out_tx.clone();
                let signal = barrier.signal_for(worker);
                scope.spawn(move || consume(worker, &jobs, &outcomes, cluster, signal));
            }
            drop(job_rx);
            drop(out_tx);

            let mut pending = 0;
            let mut jobs = jobs.into_iter().enumerate();
            for (sequence, job) in jobs.by_ref() {
                log::debug!("enqueue job {sequence} for cell {}", job.cell);
                if job_tx.send((sequence, job)).is_err() {
                    pending = 1;
                    break;
                }
            }
            pending += jobs.count();
            drop(job_tx);

            let signalled = barrier.wait(self.workers)?;
            if pending > 0 {
                return Err(PoolError::QueueClosed { pending });
            }
            Ok(signalled)
        })?;

        let mut outcomes: Vec<JobOutcome> = out_rx.try_iter().collect();
        outcomes.sort_by_key(|o| o.sequence);

        Ok(PoolReport {
            outcomes,
            workers_signalled,
        })
    }
}

/// Return type of a per-partition clustering routine: clusters created.
pub type ClusterResult = Result<usize, ClusteringError>;

/// Worker loop: cluster jobs until the queue is closed.
fn consume<F>(
    worker: usize,
    jobs: &Receiver<(usize, Job)>,
    outcomes: &Sender<JobOutcome>,
    cluster: &F,
    signal: CompletionSignal,
) where
    F: Fn(&DbscanConfig, &mut [LabeledPoint], i64, &mut DbscanState) -> ClusterResult,
{
    let mut state = DbscanState::default();
    while let Ok((sequence, job)) = jobs.recv() {
        log::debug!("worker {worker} picked up cell {}", job.cell);
        let outcome = run_job(worker, sequence, job, cluster, &mut state);
        match &outcome.result {
            Ok(summary) => log::info!("{summary}"),
            Err(err) => log::warn!("worker {worker}: {err}"),
        }
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    drop(signal);
}

/// Clusters one job, capturing engine errors and panics in the outcome.
fn run_job<F>(
    worker: usize,
    sequence: usize,
    job: Job,
    cluster: &F,
    state: &mut DbscanState,
) -> JobOutcome
where
    F: Fn(&DbscanConfig, &mut [LabeledPoint], i64, &mut DbscanState) -> ClusterResult,
{
    let Job {
        cell,
        mut points,
        config,
        label_offset,
    } = job;

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        cluster(&config, &mut points, label_offset, state)
    }));

    let result = match caught {
        Ok(Ok(cluster_count)) => Ok(PartitionSummary {
            cell,
            label_offset,
            cluster_count,
            point_count: points.len(),
        }),
        Ok(Err(source)) => Err(JobError::Clustering { cell, source }),
        Err(payload) => {
            // Scratch buffers may be mid-update.
            *state = DbscanState::default();
            Err(JobError::Panicked {
                cell,
                message: panic_message(payload.as_ref()),
            })
        }
    };

    JobOutcome {
        cell,
        label_offset,
        points,
        result,
        worker,
        sequence,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
