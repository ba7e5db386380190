//! Pool errors

use thiserror::Error;

/// Errors returned by [`Pool`](crate::Pool) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The job queue is full; returned only by non-blocking submission.
    /// The rejected job is dropped.
    #[error("pool is full")]
    PoolFull,

    /// The pool was not started yet, or is shutting down
    #[error("pool is not running")]
    NotRunning,

    /// `start` was called more than once
    #[error("pool has already been started")]
    AlreadyStarted,

    /// Workers did not finish their jobs within the shutdown timeout
    #[error("graceful shutdown timed out")]
    ShutdownTimeout,
}

pub type Result<T> = std::result::Result<T, PoolError>;
