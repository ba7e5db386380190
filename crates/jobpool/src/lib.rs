//! # Job Pool
//!
//! A bounded-concurrency job execution pool: callers submit jobs, a fixed set
//! of workers executes them.
//!
//! ## Features
//!
//! - **Bounded queue**: jobs wait in a fixed-capacity FIFO queue
//! - **Two submission disciplines**: [`Pool::submit`] waits for room,
//!   [`Pool::submit_confidently`] fails fast with [`PoolError::PoolFull`]
//! - **Idle-worker handoff**: free workers are handed to a single dispatcher in
//!   the order they became idle
//! - **Panic isolation**: a panicking job never takes its worker out of the pool
//! - **Graceful shutdown**: every accepted job runs before [`Pool::shutdown`]
//!   returns
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   submit   ┌─────────────┐   pop   ┌────────────┐
//! │  caller  │ ─────────► │  job queue  │ ──────► │ dispatcher │
//! └──────────┘            │ (capacity)  │         └─────┬──────┘
//!                         └─────────────┘               │ wait for idle id
//!                                                       ▼
//! ┌───────────────────────────────┐  id returned  ┌─────────────┐
//! │ execution task: Worker::run   │ ────────────► │ idle-worker │
//! │ [Worker 1] [Worker 2] ... [N] │ ◄──────────── │  registry   │
//! └───────────────────────────────┘    spawned    └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use jobpool::{FuncJob, Pool, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jobpool::PoolError> {
//!     let pool = Pool::new(PoolConfig::fixed_size(2).with_capacity(2));
//!     pool.start().await?;
//!
//!     for i in 0..10 {
//!         pool.submit(FuncJob::with_id(i.to_string(), move || {
//!             println!("job {i}");
//!         }))
//!         .await?;
//!     }
//!
//!     pool.shutdown().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod pool;
pub mod worker;

pub use config::{default_log_fn, LogFn, PoolConfig, PoolMode, PoolSettings};
pub use error::{PoolError, Result};
pub use job::{FuncJob, Job, UNDEFINED_JOB_ID};
pub use pool::{Pool, PoolStatus};
pub use worker::{WorkerSnapshot, WorkerState};
