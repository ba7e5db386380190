//! Job capability
//!
//! A job is anything with a stable identifier and a zero-argument action.
//! [`FuncJob`] wraps a closure and covers both generated and caller-supplied
//! identifiers.

use std::fmt;

use uuid::Uuid;

/// Placeholder shown for jobs without an identifier
pub const UNDEFINED_JOB_ID: &str = "undefined";

/// A unit of work executed by a pool worker
///
/// `execute` consumes the job; the pool keeps no reference to it afterwards.
/// It runs on a blocking thread, so it may block or run for a long time.
pub trait Job: Send + 'static {
    /// Stable identifier; empty means unspecified
    fn id(&self) -> &str;

    /// Run the job's action
    fn execute(self: Box<Self>);

    /// Identifier for log output, [`UNDEFINED_JOB_ID`] when empty
    fn display_id(&self) -> &str {
        match self.id() {
            "" => UNDEFINED_JOB_ID,
            id => id,
        }
    }
}

/// Job backed by a closure
pub struct FuncJob {
    id: String,
    action: Box<dyn FnOnce() + Send + 'static>,
}

impl FuncJob {
    /// Create a job with a generated, time-ordered identifier
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_id(Uuid::now_v7().to_string(), action)
    }

    /// Create a job with a caller-supplied identifier
    pub fn with_id<F>(id: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: id.into(),
            action: Box::new(action),
        }
    }
}

impl Job for FuncJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(self: Box<Self>) {
        (self.action)()
    }
}

impl fmt::Debug for FuncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncJob")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
