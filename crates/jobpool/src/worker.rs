//! Pool workers
//!
//! A worker is an execution slot with a 1-based id. Its state is only changed
//! by the execution task currently holding the worker's id, so the lock below
//! is never contended by writers; readers take snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinError;

use crate::job::Job;

/// What a worker is doing, and since when
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting in the idle-worker registry
    Idle { since: DateTime<Utc> },

    /// Running the job with `job_id`
    Busy {
        since: DateTime<Utc>,
        job_id: String,
    },
}

#[derive(Debug)]
struct WorkerInner {
    state: WorkerState,
    completed_count: u64,
}

/// A pool worker
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    inner: Mutex<WorkerInner>,
}

impl Worker {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            inner: Mutex::new(WorkerInner {
                state: WorkerState::Idle { since: Utc::now() },
                completed_count: 0,
            }),
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Run `job` to completion on a blocking thread.
    ///
    /// The worker returns to idle whether the job finished or panicked; the
    /// panic is handed back to the caller as a [`JoinError`].
    pub(crate) async fn run(&self, job: Box<dyn Job>) -> Result<(), JoinError> {
        self.before_job(job.id());
        let result = tokio::task::spawn_blocking(move || job.execute()).await;
        self.after_job();
        result
    }

    fn before_job(&self, job_id: &str) {
        self.inner.lock().state = WorkerState::Busy {
            since: Utc::now(),
            job_id: job_id.to_string(),
        };
    }

    fn after_job(&self) {
        let mut inner = self.inner.lock();
        inner.state = WorkerState::Idle { since: Utc::now() };
        inner.completed_count += 1;
    }

    pub(crate) fn snapshot(&self) -> WorkerSnapshot {
        let inner = self.inner.lock();
        WorkerSnapshot {
            id: self.id,
            state: inner.state.clone(),
            completed_count: inner.completed_count,
        }
    }
}

/// Point-in-time view of a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSnapshot {
    id: usize,
    #[serde(flatten)]
    state: WorkerState,
    completed_count: u64,
}

impl WorkerSnapshot {
    /// Worker id, starting at 1
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, WorkerState::Busy { .. })
    }

    /// When the current job started, if busy
    pub fn busy_since(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            WorkerState::Busy { since, .. } => Some(*since),
            WorkerState::Idle { .. } => None,
        }
    }

    /// Time spent on the current job; zero when idle
    pub fn busy_duration(&self) -> Duration {
        self.busy_since().map(elapsed_since).unwrap_or_default()
    }

    /// When the worker last became idle, if idle
    pub fn idle_since(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            WorkerState::Idle { since } => Some(*since),
            WorkerState::Busy { .. } => None,
        }
    }

    /// Time spent idle; zero when busy
    pub fn idle_duration(&self) -> Duration {
        self.idle_since().map(elapsed_since).unwrap_or_default()
    }

    pub fn running_job_id(&self) -> Option<&str> {
        match &self.state {
            WorkerState::Busy { job_id, .. } => Some(job_id.as_str()),
            WorkerState::Idle { .. } => None,
        }
    }

    /// Number of jobs this worker has finished, including panicked ones
    pub fn completed_count(&self) -> u64 {
        self.completed_count
    }
}

pub(crate) fn elapsed_since(since: DateTime<Utc>) -> Duration {
    (Utc::now() - since).to_std().unwrap_or_default()
}
