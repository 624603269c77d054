use super::*;
use crate::cluster::TransportError;
use std::time::Duration;

fn failure(node: &str) -> SetupError {
    SetupError::RemoteCommand {
        node: node.to_string(),
        command: "false".to_string(),
        source: TransportError::NonZeroExit {
            code: 1,
            stderr: String::new(),
        },
    }
}

#[tokio::test]
async fn test_wait_collects_every_outcome() {
    let pool = WorkerPool::new(4);
    for i in 0..10 {
        pool.submit(format!("job{i}"), async { Ok(()) }).unwrap();
    }

    let outcomes = pool.wait(10).await.unwrap();
    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(JobOutcome::is_success));
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn test_failures_do_not_abort_siblings() {
    let pool = WorkerPool::new(2);
    let finished = Arc::new(AtomicUsize::new(0));

    pool.submit("bad", async { Err(failure("bad")) }).unwrap();
    for i in 0..5 {
        let finished = Arc::clone(&finished);
        pool.submit(format!("good{i}"), async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }

    let outcomes = pool.wait(6).await.unwrap();
    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.job_id.as_str())
        .collect();
    assert_eq!(failed, vec!["bad"]);
    assert_eq!(finished.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_is_bounded() {
    let pool = WorkerPool::new(3);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..12 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        pool.submit(format!("job{i}"), async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }

    pool.wait(12).await.unwrap();
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeded the bound");
    assert!(peak >= 2, "jobs never ran concurrently");
}

#[tokio::test]
async fn test_panic_is_reported_as_outcome() {
    let pool = WorkerPool::new(2);
    pool.submit("node001", async { panic!("disk on fire") })
        .unwrap();
    pool.submit("node002", async { Ok(()) }).unwrap();

    let outcomes = pool.wait(2).await.unwrap();
    let panicked = outcomes.iter().find(|o| o.job_id == "node001").unwrap();
    match &panicked.result {
        Err(SetupError::JobPanicked { job_id, message }) => {
            assert_eq!(job_id, "node001");
            assert_eq!(message, "disk on fire");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_waiting_for_more_than_outstanding_is_rejected() {
    let pool = WorkerPool::new(2);
    pool.submit("only", async { Ok(()) }).unwrap();

    let err = pool.wait(2).await.unwrap_err();
    assert!(matches!(
        err,
        PoolError::InsufficientJobs {
            requested: 2,
            outstanding: 1
        }
    ));
    assert_eq!(pool.wait(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_successive_waits_count_from_last_wait() {
    let pool = WorkerPool::new(2);
    pool.submit("a", async { Ok(()) }).unwrap();
    pool.submit("b", async { Ok(()) }).unwrap();
    assert_eq!(pool.wait(2).await.unwrap().len(), 2);

    pool.submit("c", async { Ok(()) }).unwrap();
    let outcomes = pool.wait(1).await.unwrap();
    assert_eq!(outcomes[0].job_id, "c");
}

#[tokio::test]
async fn test_wait_with_reports_progress() {
    let pool = WorkerPool::new(2);
    for i in 0..4 {
        pool.submit(format!("job{i}"), async { Ok(()) }).unwrap();
    }

    let mut seen = 0;
    pool.wait_with(4, |_| seen += 1).await.unwrap();
    assert_eq!(seen, 4);
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_jobs() {
    let pool = WorkerPool::new(2);
    let finished = Arc::new(AtomicUsize::new(0));
    for i in 0..4 {
        let finished = Arc::clone(&finished);
        pool.submit(format!("job{i}"), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }

    pool.shutdown().await;
    assert_eq!(finished.load(Ordering::SeqCst), 4);
    assert!(pool.is_shut_down());
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_rejects_new_work() {
    let pool = WorkerPool::default();
    assert_eq!(pool.max_parallel(), DEFAULT_MAX_PARALLEL);

    pool.shutdown().await;
    pool.shutdown().await;

    let err = pool.submit("late", async { Ok(()) }).unwrap_err();
    assert!(matches!(err, PoolError::ShutDown));
}

#[test]
fn test_zero_capacity_is_raised_to_one() {
    assert_eq!(WorkerPool::new(0).max_parallel(), 1);
}
