//! Pool configuration and defaulting
//!
//! [`PoolConfig`] holds the raw, possibly incomplete parameters supplied by the
//! caller. Defaulting happens exactly once, when the pool is constructed, and
//! produces the [`PoolSettings`] the pool runs with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of workers used when the configured count is zero or negative
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Queue slots per worker used when the configured capacity is zero or negative
pub const DEFAULT_CAPACITY_RATIO: usize = 20;

/// Largest worker count a pool runs with; larger values are clamped
pub const MAX_WORKER_COUNT: usize = 10_000;

/// Largest job queue capacity a pool runs with; larger values are clamped
pub const MAX_CAPACITY: usize = 1 << 24;

/// Shutdown timeout used when none is configured
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Log callback receiving a preformatted message
///
/// Use it with `format_args!`:
///
/// ```
/// use std::sync::Arc;
/// use jobpool::LogFn;
///
/// let log: LogFn = Arc::new(|args: std::fmt::Arguments<'_>| println!("{args}"));
/// log(format_args!("Worker {} initialized", 1));
/// ```
pub type LogFn = Arc<dyn Fn(fmt::Arguments<'_>) + Send + Sync>;

/// Default log callback: forwards every message to `tracing` at info level
/// under the `jobpool` target. Timestamps come from the installed subscriber.
pub fn default_log_fn() -> LogFn {
    Arc::new(|args: fmt::Arguments<'_>| tracing::info!(target: "jobpool", "{}", args))
}

/// Pool sizing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    /// A fixed number of workers for the pool's lifetime
    #[default]
    FixedSize,

    /// Declared for compatibility; behaves exactly like [`PoolMode::FixedSize`]
    FlexibleSize,

    /// Unrecognized mode; defaulting replaces it with [`PoolMode::FixedSize`]
    #[serde(other)]
    Unknown,
}

impl PoolMode {
    /// Parse a mode name. Accepts `fixed`/`fixed_size`/`0` and
    /// `flexible`/`flexible_size`/`1`, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed_size" | "0" => Self::FixedSize,
            "flexible" | "flexible_size" | "1" => Self::FlexibleSize,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedSize => write!(f, "fixed_size"),
            Self::FlexibleSize => write!(f, "flexible_size"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Pool configuration
///
/// Zero counts mean "unset" and are replaced during defaulting.
///
/// # Example
///
/// ```
/// use jobpool::{PoolConfig, PoolMode};
///
/// let config = PoolConfig::fixed_size(4).with_capacity(100);
/// assert_eq!(config.mode, PoolMode::FixedSize);
/// assert_eq!(config.worker_count, 4);
/// assert_eq!(config.capacity, 100);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Sizing mode
    #[serde(default)]
    pub mode: PoolMode,

    /// Number of workers (0 = default)
    #[serde(default)]
    pub worker_count: usize,

    /// Job queue capacity (0 = `worker_count * 20`)
    #[serde(default)]
    pub capacity: usize,

    /// How long `shutdown` waits for running jobs
    #[serde(default = "default_shutdown_timeout", with = "duration_millis")]
    pub shutdown_timeout: Duration,

    /// Log callback (None = [`default_log_fn`])
    #[serde(skip)]
    pub log_fn: Option<LogFn>,
}

fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            mode: PoolMode::FixedSize,
            worker_count: 0,
            capacity: 0,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            log_fn: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("mode", &self.mode)
            .field("worker_count", &self.worker_count)
            .field("capacity", &self.capacity)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("log_fn", &self.log_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PoolConfig {
    /// Create an empty configuration; every field is defaulted at construction
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a fixed-size pool with `worker_count * 20` queue slots
    pub fn fixed_size(worker_count: usize) -> Self {
        Self {
            mode: PoolMode::FixedSize,
            worker_count,
            capacity: worker_count.saturating_mul(DEFAULT_CAPACITY_RATIO),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// - `JOBPOOL_MODE`: `fixed` or `flexible`
    /// - `JOBPOOL_WORKERS`: worker count
    /// - `JOBPOOL_CAPACITY`: job queue capacity
    /// - `JOBPOOL_SHUTDOWN_TIMEOUT_MS`: shutdown timeout in milliseconds
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let mode = get("JOBPOOL_MODE")
            .map(|raw| PoolMode::parse(&raw))
            .unwrap_or_default();

        let shutdown_timeout = get("JOBPOOL_SHUTDOWN_TIMEOUT_MS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        Self {
            mode,
            worker_count: parse_count(get("JOBPOOL_WORKERS")),
            capacity: parse_count(get("JOBPOOL_CAPACITY")),
            shutdown_timeout,
            log_fn: None,
        }
    }

    /// Set the sizing mode
    pub fn with_mode(mut self, mode: PoolMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of workers
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the job queue capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the log callback
    pub fn with_log_fn<F>(mut self, log_fn: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.log_fn = Some(Arc::new(log_fn));
        self
    }

    /// Apply defaults to every unset or invalid field and clamp sizes to
    /// [`MAX_WORKER_COUNT`] and [`MAX_CAPACITY`]
    pub fn normalize(self) -> PoolSettings {
        let log = self.log_fn.unwrap_or_else(default_log_fn);

        let mode = match self.mode {
            PoolMode::Unknown => {
                log(format_args!("Invalid pool mode, fallback to FixedSize"));
                PoolMode::FixedSize
            }
            mode => mode,
        };

        let mut worker_count = if self.worker_count == 0 {
            DEFAULT_WORKER_COUNT
        } else {
            self.worker_count
        };
        if worker_count > MAX_WORKER_COUNT {
            log(format_args!(
                "Worker count {} exceeds the limit, fallback to {}",
                worker_count, MAX_WORKER_COUNT
            ));
            worker_count = MAX_WORKER_COUNT;
        }

        let mut capacity = if self.capacity == 0 {
            worker_count * DEFAULT_CAPACITY_RATIO
        } else {
            self.capacity
        };
        if capacity > MAX_CAPACITY {
            log(format_args!(
                "Capacity {} exceeds the limit, fallback to {}",
                capacity, MAX_CAPACITY
            ));
            capacity = MAX_CAPACITY;
        }

        PoolSettings {
            mode,
            worker_count,
            capacity,
            shutdown_timeout: self.shutdown_timeout,
            log,
        }
    }
}

/// Negative or unparseable counts are treated as unset
fn parse_count(raw: Option<String>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// Fully defaulted configuration a pool runs with
#[derive(Clone)]
pub struct PoolSettings {
    pub mode: PoolMode,
    pub worker_count: usize,
    pub capacity: usize,
    pub shutdown_timeout: Duration,
    pub log: LogFn,
}

impl fmt::Debug for PoolSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSettings")
            .field("mode", &self.mode)
            .field("worker_count", &self.worker_count)
            .field("capacity", &self.capacity)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
