//! Timeline tests for a 2-worker pool with 2 queue slots
//!
//! Jobs sleep on blocking threads, so these tests run on a multi-threaded
//! runtime and sample pool state at fixed points in time. Each job counter
//! goes 0 → 1 when the job starts and 1 → 2 when it finishes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jobpool::{FuncJob, Pool, PoolConfig, PoolError, PoolMode};

type Counter = Arc<AtomicUsize>;

/// Start a quiet fixed-size pool
async fn start_pool(workers: usize, capacity: usize) -> Arc<Pool> {
    let pool = Pool::new(
        PoolConfig::fixed_size(workers)
            .with_capacity(capacity)
            .with_log_fn(|args| tracing::debug!("{}", args)),
    );
    pool.start().await.unwrap();

    assert_eq!(pool.mode(), PoolMode::FixedSize);
    assert_eq!(pool.worker_count(), workers);
    assert_eq!(pool.capacity(), capacity);
    assert_eq!(pool.workers().len(), workers);
    Arc::new(pool)
}

fn counters(n: usize) -> Vec<Counter> {
    (0..n).map(|_| Arc::new(AtomicUsize::new(0))).collect()
}

fn slow_job(id: &str, counter: &Counter, duration: Duration) -> FuncJob {
    let counter = Arc::clone(counter);
    FuncJob::with_id(id, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(duration);
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

fn progress(counters: &[Counter]) -> Vec<usize> {
    counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_blocking_submit_timeline() {
    let pool = start_pool(2, 2).await;

    let first = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&first);
    pool.submit(FuncJob::with_id("1", move || flag.store(1, Ordering::SeqCst)))
        .await
        .unwrap();
    sleep_ms(20).await;

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(pool.submitted_count(), 1);
    assert_eq!(pool.assigned_count(), 1);
    assert_eq!(pool.queued_count(), 0);

    // jobs[0] is job 2, ..., jobs[5] is job 7
    let jobs = counters(6);
    let run_for = Duration::from_millis(200);

    // Jobs 2 and 3 go to the workers, job 4 waits at the idle-holding point,
    // jobs 5 and 6 fill the queue
    for n in 2..=6 {
        pool.submit(slow_job(&n.to_string(), &jobs[n - 2], run_for))
            .await
            .unwrap();
    }

    // Job 7 waits for a free queue slot
    let job7_queued = Arc::new(AtomicBool::new(false));
    {
        let pool = Arc::clone(&pool);
        let queued = Arc::clone(&job7_queued);
        let job = slow_job("7", &jobs[5], run_for);
        tokio::spawn(async move {
            pool.submit(job).await.unwrap();
            queued.store(true, Ordering::SeqCst);
        });
    }

    sleep_ms(50).await;
    assert_eq!(progress(&jobs), vec![1, 1, 0, 0, 0, 0]);
    assert!(!job7_queued.load(Ordering::SeqCst));
    assert_eq!(pool.queued_count(), 2);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 3);

    let mut running: Vec<String> = pool
        .workers()
        .iter()
        .filter_map(|w| w.running_job_id().map(str::to_string))
        .collect();
    running.sort();
    assert_eq!(running, vec!["2", "3"]);

    // Jobs 2 and 3 finished, 4 and 5 running, 6 held, 7 queued
    sleep_ms(200).await;
    assert_eq!(progress(&jobs), vec![2, 2, 1, 1, 0, 0]);
    assert!(job7_queued.load(Ordering::SeqCst));
    assert_eq!(pool.queued_count(), 1);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 5);

    // Jobs 6 and 7 running
    sleep_ms(200).await;
    assert_eq!(progress(&jobs), vec![2, 2, 2, 2, 1, 1]);
    assert_eq!(pool.queued_count(), 0);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 7);

    sleep_ms(200).await;
    assert_eq!(progress(&jobs), vec![2, 2, 2, 2, 2, 2]);
    assert_eq!(pool.queued_count(), 0);
    assert_eq!(pool.assigned_count(), 7);

    let completed: u64 = pool.workers().iter().map(|w| w.completed_count()).sum();
    assert_eq!(completed, 7);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_non_blocking_submit_rejects_when_full() {
    let pool = start_pool(2, 2).await;

    let first = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&first);
    pool.submit_confidently(FuncJob::with_id("1", move || flag.store(1, Ordering::SeqCst)))
        .unwrap();
    sleep_ms(10).await;
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(pool.submitted_count(), 1);
    assert_eq!(pool.assigned_count(), 1);

    // jobs[0] is job 2, ..., jobs[5] is job 7
    let jobs = counters(6);
    let short = Duration::from_millis(200);
    let long = Duration::from_millis(500);

    pool.submit_confidently(slow_job("2", &jobs[0], short)).unwrap();
    pool.submit_confidently(slow_job("3", &jobs[1], short)).unwrap();
    sleep_ms(10).await;

    // Let the dispatcher move job 4 to the idle-holding point before
    // jobs 5 and 6 fill the queue
    pool.submit_confidently(slow_job("4", &jobs[2], long)).unwrap();
    sleep_ms(10).await;
    pool.submit_confidently(slow_job("5", &jobs[3], long)).unwrap();
    pool.submit_confidently(slow_job("6", &jobs[4], long)).unwrap();
    assert!(pool.full_since().is_none());

    let assigned_before = pool.assigned_count();
    assert_eq!(
        pool.submit_confidently(slow_job("7", &jobs[5], long)),
        Err(PoolError::PoolFull)
    );
    assert_eq!(pool.assigned_count(), assigned_before);
    assert_eq!(pool.rejected_count(), 1);
    assert!(pool.full_since().is_some());
    assert_eq!(pool.queued_count(), 2);

    sleep_ms(100).await;
    assert_eq!(progress(&jobs), vec![1, 1, 0, 0, 0, 0]);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 3);

    sleep_ms(150).await;
    assert_eq!(progress(&jobs), vec![2, 2, 1, 1, 0, 0]);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 5);

    sleep_ms(500).await;
    assert_eq!(progress(&jobs), vec![2, 2, 2, 2, 1, 0]);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 6);

    sleep_ms(500).await;
    assert_eq!(progress(&jobs), vec![2, 2, 2, 2, 2, 0]);
    assert_eq!(pool.submitted_count(), 7);
    assert_eq!(pool.assigned_count(), 6);
    assert_eq!(pool.rejected_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_since_tracks_full_state() {
    let pool = start_pool(1, 1).await;
    let jobs = counters(4);
    let hold = Duration::from_millis(150);

    pool.submit_confidently(slow_job("a", &jobs[0], hold)).unwrap();
    sleep_ms(10).await;
    pool.submit_confidently(slow_job("b", &jobs[1], hold)).unwrap();
    sleep_ms(10).await;
    pool.submit_confidently(slow_job("c", &jobs[2], hold)).unwrap();

    assert_eq!(
        pool.submit_confidently(slow_job("d", &jobs[3], hold)),
        Err(PoolError::PoolFull)
    );
    assert!(pool.full_since().is_some());

    // The full-state duration grows while the pool stays full
    sleep_ms(20).await;
    assert!(pool.full_duration() >= Duration::from_millis(20));

    pool.shutdown().await.unwrap();
    assert_eq!(progress(&jobs), vec![2, 2, 2, 0]);
    assert!(pool.full_since().is_some());
    assert_eq!(pool.rejected_count(), 1);
}
