//! Job pool
//!
//! Owns the bounded job queue, the idle-worker registry, the workers and the
//! dispatcher task, and exposes the submission API and runtime metrics.
//!
//! # Example
//!
//! ```no_run
//! use jobpool::{FuncJob, Pool, PoolConfig, PoolError};
//!
//! # async fn run() -> Result<(), PoolError> {
//! let pool = Pool::new(PoolConfig::fixed_size(4).with_capacity(16));
//! pool.start().await?;
//!
//! // Waits while the queue is full
//! pool.submit(FuncJob::new(|| println!("hello"))).await?;
//!
//! // Fails with PoolError::PoolFull instead of waiting
//! pool.submit_confidently(FuncJob::with_id("report", || {}))?;
//!
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod metrics;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{PoolConfig, PoolMode, PoolSettings};
use crate::error::{PoolError, Result};
use crate::job::Job;
use crate::worker::{Worker, WorkerSnapshot};

use dispatcher::Dispatcher;
use metrics::PoolMetrics;

/// Pool lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Constructed; `start` not called yet
    Created,
    /// Accepting and executing jobs
    Running,
    /// Finishing accepted jobs, rejecting new ones
    Draining,
    /// All accepted jobs have finished
    Stopped,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Bounded-concurrency job pool
///
/// A fixed number of workers execute submitted jobs. Jobs wait in a bounded
/// FIFO queue; a single dispatcher pops them and hands each one to the next
/// idle worker. A popped job that finds no idle worker is held by the
/// dispatcher and no longer counts against the queue capacity.
pub struct Pool {
    settings: PoolSettings,
    jobs_tx: mpsc::Sender<Box<dyn Job>>,
    jobs_rx: Mutex<Option<mpsc::Receiver<Box<dyn Job>>>>,
    workers: RwLock<Vec<Arc<Worker>>>,
    metrics: Arc<PoolMetrics>,
    status: RwLock<PoolStatus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    drained_tx: Mutex<Option<watch::Sender<bool>>>,
    drained_rx: watch::Receiver<bool>,
}

impl Pool {
    /// Create a pool, applying defaults to unset configuration fields
    pub fn new(config: PoolConfig) -> Self {
        let settings = config.normalize();
        let (jobs_tx, jobs_rx) = mpsc::channel(settings.capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (drained_tx, drained_rx) = watch::channel(false);

        if settings.mode == PoolMode::FlexibleSize {
            warn!("Flexible pool size is not supported, running with a fixed size");
        }

        Self {
            settings,
            jobs_tx,
            jobs_rx: Mutex::new(Some(jobs_rx)),
            workers: RwLock::new(Vec::new()),
            metrics: Arc::new(PoolMetrics::default()),
            status: RwLock::new(PoolStatus::Created),
            shutdown_tx,
            shutdown_rx,
            drained_tx: Mutex::new(Some(drained_tx)),
            drained_rx,
        }
    }

    /// Create a fixed-size pool with `worker_count * 20` queue slots
    pub fn fixed_size(worker_count: usize) -> Self {
        Self::new(PoolConfig::fixed_size(worker_count))
    }

    /// Spawn the workers and the dispatcher. Must run inside a Tokio runtime.
    #[instrument(skip(self), fields(workers = self.settings.worker_count, capacity = self.settings.capacity))]
    pub async fn start(&self) -> Result<()> {
        {
            // Held until Running is published so a concurrent shutdown sees
            // either Created or Running, never the half-started pool
            let mut status = self.status.write();
            match *status {
                PoolStatus::Created => {}
                PoolStatus::Running | PoolStatus::Draining => {
                    return Err(PoolError::AlreadyStarted)
                }
                PoolStatus::Stopped => return Err(PoolError::NotRunning),
            }

            let jobs = self
                .jobs_rx
                .lock()
                .take()
                .ok_or(PoolError::AlreadyStarted)?;
            let drained_tx = self
                .drained_tx
                .lock()
                .take()
                .ok_or(PoolError::AlreadyStarted)?;

            let (idle_tx, idle_rx) = mpsc::channel(self.settings.worker_count);
            let mut workers = Vec::with_capacity(self.settings.worker_count);

            for id in 1..=self.settings.worker_count {
                let worker = Arc::new(Worker::new(id));
                idle_tx
                    .try_send(worker.id())
                    .map_err(|_| PoolError::NotRunning)?;
                workers.push(worker);
            }

            *self.workers.write() = workers.clone();

            let dispatcher = Dispatcher {
                jobs,
                idle_rx,
                idle_tx,
                workers,
                metrics: Arc::clone(&self.metrics),
                log: Arc::clone(&self.settings.log),
                shutdown_rx: self.shutdown_rx.clone(),
                drained_tx,
            };
            tokio::spawn(dispatcher.run());
            *status = PoolStatus::Running;
        }

        for id in 1..=self.settings.worker_count {
            self.log(format_args!("Worker {} initialized", id));
        }

        info!(
            workers = self.settings.worker_count,
            capacity = self.settings.capacity,
            mode = %self.settings.mode,
            "Job pool started"
        );
        Ok(())
    }

    /// Submit a job, waiting while the queue is full.
    ///
    /// Fails only with [`PoolError::NotRunning`], never because the pool is
    /// full.
    pub async fn submit<J: Job>(&self, job: J) -> Result<()> {
        let (job, job_id) = self.accept(job)?;
        match self.jobs_tx.send(job).await {
            Ok(()) => {
                self.queued(&job_id);
                Ok(())
            }
            Err(_) => Err(self.closed(&job_id)),
        }
    }

    /// Submit a job from synchronous code, blocking the current thread while
    /// the queue is full.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn submit_blocking<J: Job>(&self, job: J) -> Result<()> {
        let (job, job_id) = self.accept(job)?;
        match self.jobs_tx.blocking_send(job) {
            Ok(()) => {
                self.queued(&job_id);
                Ok(())
            }
            Err(_) => Err(self.closed(&job_id)),
        }
    }

    /// Submit a job without waiting.
    ///
    /// Returns [`PoolError::PoolFull`] when the queue is full; the job is
    /// dropped and the caller decides whether to resubmit.
    pub fn submit_confidently<J: Job>(&self, job: J) -> Result<()> {
        let (job, job_id) = self.accept(job)?;
        match self.jobs_tx.try_send(job) {
            Ok(()) => {
                self.queued(&job_id);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.job_rejected();
                self.log(format_args!(
                    "Job [{}] is rejected because the pool is full",
                    job_id
                ));
                Err(PoolError::PoolFull)
            }
            Err(TrySendError::Closed(_)) => Err(self.closed(&job_id)),
        }
    }

    fn accept<J: Job>(&self, job: J) -> Result<(Box<dyn Job>, String)> {
        if self.status() != PoolStatus::Running {
            return Err(PoolError::NotRunning);
        }

        let job_id = job.display_id().to_string();
        self.log(format_args!("Job [{}] is submitted", job_id));
        self.metrics.job_submitted();
        Ok((Box::new(job), job_id))
    }

    fn queued(&self, job_id: &str) {
        self.metrics.job_queued();
        self.log(format_args!("Job [{}] is queued", job_id));
    }

    fn closed(&self, job_id: &str) -> PoolError {
        self.log(format_args!(
            "Job [{}] is rejected because the pool is shutting down",
            job_id
        ));
        PoolError::NotRunning
    }

    /// Stop accepting jobs and wait for every accepted job to finish.
    ///
    /// Jobs already in the queue are still executed. Callers blocked in
    /// [`Pool::submit`] are released with [`PoolError::NotRunning`]. After a
    /// [`PoolError::ShutdownTimeout`] the drain continues in the background;
    /// calling `shutdown` again waits for it once more.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut status = self.status.write();
            match *status {
                PoolStatus::Running => {
                    *status = PoolStatus::Draining;
                    info!("Initiating graceful shutdown");
                    let _ = self.shutdown_tx.send(true);
                }
                PoolStatus::Draining => {
                    debug!("Shutdown already in progress, waiting for drain");
                }
                PoolStatus::Created => {
                    *status = PoolStatus::Stopped;
                    return Ok(());
                }
                PoolStatus::Stopped => return Ok(()),
            }
        }

        let mut drained = self.drained_rx.clone();
        let wait = drained.wait_for(|done| *done);
        match tokio::time::timeout(self.settings.shutdown_timeout, wait).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => error!("Dispatcher exited before the queue was drained"),
            Err(_) => {
                warn!(
                    timeout = ?self.settings.shutdown_timeout,
                    busy_workers = self.busy_worker_count(),
                    "Shutdown timeout reached"
                );
                return Err(PoolError::ShutdownTimeout);
            }
        }

        *self.status.write() = PoolStatus::Stopped;
        info!(
            submitted = self.submitted_count(),
            assigned = self.assigned_count(),
            "Job pool stopped"
        );
        Ok(())
    }

    fn log(&self, args: fmt::Arguments<'_>) {
        (self.settings.log)(args)
    }

    fn busy_worker_count(&self) -> usize {
        self.workers().iter().filter(|w| w.is_busy()).count()
    }

    /// Current lifecycle status
    pub fn status(&self) -> PoolStatus {
        *self.status.read()
    }

    /// Sizing mode after defaulting
    pub fn mode(&self) -> PoolMode {
        self.settings.mode
    }

    /// Job queue capacity
    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.settings.worker_count
    }

    /// Snapshots of all workers, ordered by id. Empty before `start`.
    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        self.workers.read().iter().map(|w| w.snapshot()).collect()
    }

    /// Jobs accepted by a submit call, including rejected ones
    pub fn submitted_count(&self) -> u64 {
        self.metrics.submitted()
    }

    /// Jobs handed to a worker
    pub fn assigned_count(&self) -> u64 {
        self.metrics.assigned()
    }

    /// Jobs waiting in the queue, not counting one held by the dispatcher
    pub fn queued_count(&self) -> usize {
        self.jobs_tx.max_capacity() - self.jobs_tx.capacity()
    }

    /// Non-blocking submissions rejected because the queue was full
    pub fn rejected_count(&self) -> u64 {
        self.metrics.rejected()
    }

    /// Jobs whose action panicked
    pub fn panicked_count(&self) -> u64 {
        self.metrics.panicked()
    }

    /// Time of the last rejection, cleared once a job is queued again
    pub fn full_since(&self) -> Option<DateTime<Utc>> {
        self.metrics.full_since()
    }

    /// Time since the last rejection; zero when the pool is not full
    pub fn full_duration(&self) -> Duration {
        self.metrics.full_duration()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("settings", &self.settings)
            .field("status", &self.status())
            .field("submitted", &self.submitted_count())
            .field("assigned", &self.assigned_count())
            .finish_non_exhaustive()
    }
}
