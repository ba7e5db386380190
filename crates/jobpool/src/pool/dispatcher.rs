//! Dispatch loop
//!
//! Pairs each job popped from the queue with the next idle worker id and
//! spawns an execution task for the pair.
//!
//! ```text
//!            job queue                idle-worker registry
//!   submit ──► [j5][j6] ──► pop ──► wait for id ──► spawn(execute)
//!                               (idle-holding point)      │
//!                                        ▲                │
//!                                        └── id returned ─┘
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use super::metrics::PoolMetrics;
use crate::config::LogFn;
use crate::job::Job;
use crate::worker::Worker;

pub(crate) struct Dispatcher {
    pub(crate) jobs: mpsc::Receiver<Box<dyn Job>>,
    pub(crate) idle_rx: mpsc::Receiver<usize>,
    pub(crate) idle_tx: mpsc::Sender<usize>,
    pub(crate) workers: Vec<Arc<Worker>>,
    pub(crate) metrics: Arc<PoolMetrics>,
    pub(crate) log: LogFn,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
    /// Set once the queue is drained and every worker is idle again
    pub(crate) drained_tx: watch::Sender<bool>,
}

impl Dispatcher {
    /// Run until the queue is closed and drained, then wait for every worker
    /// to become idle.
    pub(crate) async fn run(mut self) {
        let mut draining = false;

        loop {
            let job = if draining {
                self.jobs.recv().await
            } else {
                tokio::select! {
                    biased;
                    _ = self.shutdown_rx.changed() => {
                        debug!("Dispatcher: shutdown requested, draining queue");
                        // Rejects new and blocked submissions, keeps queued jobs
                        self.jobs.close();
                        draining = true;
                        continue;
                    }
                    job = self.jobs.recv() => job,
                }
            };

            let Some(job) = job else {
                break;
            };

            // Idle-holding point: the job is off the queue but not assigned yet
            let Some(worker_id) = self.idle_rx.recv().await else {
                break;
            };

            self.dispatch(job, worker_id);
        }

        debug!("Dispatcher: queue drained, waiting for workers");
        self.wait_for_workers().await;
        self.drained_tx.send_replace(true);
        debug!("Dispatcher exited");
    }

    fn dispatch(&self, job: Box<dyn Job>, worker_id: usize) {
        let worker = Arc::clone(&self.workers[worker_id - 1]);
        let idle_tx = self.idle_tx.clone();
        let metrics = Arc::clone(&self.metrics);
        let log = Arc::clone(&self.log);

        tokio::spawn(execute(job, worker, idle_tx, metrics, log));
    }

    async fn wait_for_workers(&mut self) {
        let mut idle = 0;
        while idle < self.workers.len() {
            if self.idle_rx.recv().await.is_none() {
                break;
            }
            idle += 1;
        }
    }
}

/// Execution task: run one job on one worker, then hand the worker back
async fn execute(
    job: Box<dyn Job>,
    worker: Arc<Worker>,
    idle_tx: mpsc::Sender<usize>,
    metrics: Arc<PoolMetrics>,
    log: LogFn,
) {
    let worker_id = worker.id();
    let job_id = job.display_id().to_string();

    log(format_args!("Worker {} got a job [{}]", worker_id, job_id));
    metrics.job_assigned();

    if let Err(e) = worker.run(job).await {
        metrics.job_panicked();
        error!(worker_id, job_id = %job_id, error = %e, "Job panicked");
        log(format_args!(
            "Job [{}] panicked on worker {}",
            job_id, worker_id
        ));
    }

    log(format_args!("Worker {} is ready for new job", worker_id));
    // Never waits: the registry has one slot per worker
    if idle_tx.send(worker_id).await.is_err() {
        debug!(worker_id, "Idle-worker registry closed");
    }
}
