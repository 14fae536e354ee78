//! Integration tests for the batch admission controller.

use htmlpress::core::{run_batch, BatchError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn respects_concurrency_limit() {
    let concurrent = Arc::new(AtomicU64::new(0));
    let max_concurrent = Arc::new(AtomicU64::new(0));

    let jobs = (0..12).map(|_| {
        let concurrent = Arc::clone(&concurrent);
        let max_concurrent = Arc::clone(&max_concurrent);
        async move {
            let current = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    });

    run_batch(jobs, 2).await.unwrap();
    assert!(max_concurrent.load(Ordering::SeqCst) <= 2, "limit exceeded");
}

#[tokio::test]
async fn starts_jobs_in_input_order() {
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    // With limit 1 the batch serializes, so start order is observable
    // directly as completion order.
    let jobs = (0..6_u32).map(|i| {
        let order = Arc::clone(&order);
        async move {
            order.lock().push(i);
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(())
        }
    });

    run_batch(jobs, 1).await.unwrap();
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4, 5]);
}

/// Canonical failure shape: A(ok, slow), B(fail, fast), C(ok), D(ok)
/// with limit 2. B's failure stops admission after C; D never starts; A
/// and C both finish before the batch reports B's error.
#[tokio::test]
async fn first_failure_stops_admission_then_drains() {
    let a_done = Arc::new(AtomicU64::new(0));
    let c_done = Arc::new(AtomicU64::new(0));
    let d_started = Arc::new(AtomicU64::new(0));

    enum Job {
        Ok {
            delay_ms: u64,
            done: Arc<AtomicU64>,
        },
        Fail {
            delay_ms: u64,
        },
    }

    let a_done2 = Arc::clone(&a_done);
    let c_done2 = Arc::clone(&c_done);
    let d_started2 = Arc::clone(&d_started);

    let plan = vec![
        Job::Ok {
            delay_ms: 40,
            done: a_done2,
        },
        Job::Fail { delay_ms: 10 },
        Job::Ok {
            delay_ms: 10,
            done: c_done2,
        },
        Job::Ok {
            delay_ms: 1,
            done: d_started2,
        },
    ];

    let jobs = plan.into_iter().map(|job| async move {
        match job {
            Job::Ok { delay_ms, done } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Job::Fail { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                anyhow::bail!("job B failed")
            }
        }
    });

    match run_batch(jobs, 2).await {
        Err(BatchError::Aborted {
            jobs_not_started,
            cause,
        }) => {
            assert_eq!(jobs_not_started, 1, "only D should be unstarted");
            assert!(cause.to_string().contains("job B failed"));
        }
        other => panic!("expected Aborted, got {other:?}"),
    }

    // Already-started jobs drained to completion; D never ran.
    assert_eq!(a_done.load(Ordering::SeqCst), 1, "A was cut off");
    assert_eq!(c_done.load(Ordering::SeqCst), 1, "C was cut off");
    assert_eq!(d_started.load(Ordering::SeqCst), 0, "D should never start");
}

#[tokio::test]
async fn unadmitted_jobs_are_never_constructed() {
    let constructed = Arc::new(AtomicUsize::new(0));

    let jobs = (0..8).map(|i| {
        constructed.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if i == 0 {
                anyhow::bail!("first job fails")
            }
            Ok(())
        }
    });

    let err = run_batch(jobs, 1).await.unwrap_err();
    match err {
        BatchError::Aborted {
            jobs_not_started, ..
        } => assert_eq!(jobs_not_started, 6),
        BatchError::InvalidLimit => panic!("unexpected InvalidLimit"),
    }

    // Limit 1: job 0 admitted, job 1 pulled while settling job 0, rest
    // never even constructed by the iterator.
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reports_first_failure_not_last() {
    let jobs = (0..4_u64).map(|i| async move {
        // Later jobs fail sooner; "first" means first observed settlement.
        tokio::time::sleep(Duration::from_millis(40 - i * 10)).await;
        anyhow::bail!("job {i} failed")
    });
    let jobs: Vec<_> = jobs.collect();

    let err = run_batch(jobs, 4).await.unwrap_err();
    match err {
        BatchError::Aborted { cause, .. } => {
            assert!(cause.to_string().contains("job 3 failed"), "got: {cause}");
        }
        BatchError::InvalidLimit => panic!("unexpected InvalidLimit"),
    }
}
