//! Basic job pool usage
//!
//! Run with: cargo run -p jobpool --example basic
//!
//! Pool parameters come from the environment (`JOBPOOL_WORKERS`,
//! `JOBPOOL_CAPACITY`, `JOBPOOL_MODE`); log verbosity from `RUST_LOG`.

use std::time::Duration;

use anyhow::{Context, Result};
use jobpool::{FuncJob, Pool, PoolConfig, PoolError};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = PoolConfig::from_env();
    let pool = Pool::new(config);
    pool.start().await.context("Failed to start job pool")?;

    tracing::info!(
        workers = pool.worker_count(),
        capacity = pool.capacity(),
        "Submitting jobs"
    );

    for i in 0..20 {
        pool.submit(FuncJob::with_id(format!("sleep-{i}"), move || {
            std::thread::sleep(Duration::from_millis(50 + i * 10));
        }))
        .await?;
    }

    // Fail-fast submissions are dropped when the pool is saturated
    let mut rejected = 0;
    for i in 0..500 {
        match pool.submit_confidently(FuncJob::with_id(format!("burst-{i}"), || {})) {
            Ok(()) => {}
            Err(PoolError::PoolFull) => rejected += 1,
            Err(e) => return Err(e.into()),
        }
    }

    for worker in pool.workers() {
        tracing::info!(
            worker_id = worker.id(),
            running = worker.running_job_id().unwrap_or("-"),
            completed = worker.completed_count(),
            "Worker status"
        );
    }

    pool.shutdown().await.context("Failed to drain job pool")?;

    tracing::info!(
        submitted = pool.submitted_count(),
        assigned = pool.assigned_count(),
        rejected,
        "Done"
    );
    Ok(())
}
