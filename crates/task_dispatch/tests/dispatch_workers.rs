//! Worker lifecycle and concurrency tests for TaskDispatcher.
//!
//! Tests cover:
//! - Pool lifecycle (release after success, failure and early drop)
//! - Pool sizing and worker identification
//! - Timeouts and cancellation
//! - Retries
//! - Concurrent use of one dispatcher

mod common;
use common::ConcurrencyProbe;
use task_dispatch::{
    worker_id, CancellationToken, DispatchConfig, DispatchError, TaskDispatcher,
};

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// 1. Pool Lifecycle
// ============================================================================

#[test]
fn test_workers_released_after_ordered_call() -> Result<()> {
    let tracker = Arc::new(());

    let dispatcher = TaskDispatcher::new();
    let results = dispatcher.dispatch(|x: &u32, _: &Arc<()>| Ok(*x), 0..32, tracker.clone())?;

    assert_eq!(results.len(), 32);
    // The fixed arguments live in the workers; all of them must be gone.
    assert_eq!(Arc::strong_count(&tracker), 1);
    Ok(())
}

#[test]
fn test_workers_released_after_failure() -> Result<()> {
    let tracker = Arc::new(());

    let dispatcher = TaskDispatcher::new();
    let result = dispatcher.dispatch(
        |x: &u32, _: &Arc<()>| {
            if *x == 5 {
                Err(anyhow!("fail"))
            } else {
                Ok(*x)
            }
        },
        0..32,
        tracker.clone(),
    );

    assert!(result.is_err());
    assert_eq!(Arc::strong_count(&tracker), 1);
    Ok(())
}

#[test]
fn test_workers_released_when_stream_exhausted() -> Result<()> {
    let tracker = Arc::new(());

    let dispatcher = TaskDispatcher::unordered();
    let mut stream = dispatcher.dispatch(|x: &u32, _: &Arc<()>| Ok(*x), 0..8, tracker.clone())?;
    assert!(Arc::strong_count(&tracker) > 1, "workers hold the arguments while running");

    let count = stream.by_ref().count();
    assert_eq!(count, 8);
    assert_eq!(Arc::strong_count(&tracker), 1);
    Ok(())
}

#[test]
fn test_dropping_stream_stops_work() -> Result<()> {
    let processed = Arc::new(AtomicUsize::new(0));

    let config = DispatchConfig::builder()
        .num_workers(1)
        .prefetch_factor(1)
        .build();
    let dispatcher = TaskDispatcher::unordered().with_config(config)?;

    let counter = processed.clone();
    let mut stream = dispatcher.dispatch(
        move |x: &u32, _: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            Ok(*x)
        },
        0..100,
        (),
    )?;

    stream.next().transpose()?;
    stream.next().transpose()?;
    drop(stream);

    thread::sleep(Duration::from_millis(100));
    let total = processed.load(Ordering::SeqCst);
    assert!(
        total < 10,
        "workers should stop after the stream is dropped, but processed {} items",
        total
    );
    Ok(())
}

// ============================================================================
// 2. Pool Sizing
// ============================================================================

#[test]
fn test_num_workers_bounds_concurrency() -> Result<()> {
    let probe = ConcurrencyProbe::default();

    let config = DispatchConfig::builder().num_workers(2).build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let task_probe = probe.clone();
    dispatcher.dispatch(
        move |_: &u32, work: &Duration| {
            task_probe.run(*work);
            Ok(())
        },
        0..20,
        Duration::from_millis(10),
    )?;

    assert_eq!(probe.finished(), 20);
    assert!(probe.peak() <= 2, "peak concurrency was {}", probe.peak());
    Ok(())
}

#[test]
fn test_default_pool_runs_in_parallel() -> Result<()> {
    let host = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    if host < 2 {
        return Ok(());
    }

    let probe = ConcurrencyProbe::default();
    let task_probe = probe.clone();
    TaskDispatcher::new().dispatch(
        move |_: &u32, work: &Duration| {
            task_probe.run(*work);
            Ok(())
        },
        0..(host as u32 * 2),
        Duration::from_millis(50),
    )?;

    assert!(probe.peak() >= 2, "peak concurrency was {}", probe.peak());
    assert!(probe.peak() <= host);
    Ok(())
}

#[test]
fn test_worker_ids_inside_tasks() -> Result<()> {
    let config = DispatchConfig::builder().num_workers(3).build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let ids = dispatcher.dispatch(
        |_: &u32, _: &()| {
            thread::sleep(Duration::from_millis(5));
            worker_id().ok_or_else(|| anyhow!("task ran outside a worker"))
        },
        0..30,
        (),
    )?;

    let distinct: HashSet<usize> = ids.into_iter().collect();
    assert!(distinct.iter().all(|&id| id < 3), "ids: {:?}", distinct);
    assert_eq!(worker_id(), None, "caller thread is not a worker");
    Ok(())
}

#[test]
fn test_worker_thread_names() -> Result<()> {
    let dispatcher = TaskDispatcher::new();
    let names = dispatcher.dispatch(
        |_: &u8, _: &()| Ok(thread::current().name().map(str::to_string)),
        vec![0],
        (),
    )?;

    assert_eq!(names, vec![Some("dispatch-worker-0".to_string())]);
    Ok(())
}

// ============================================================================
// 3. Timeout and Cancellation
// ============================================================================

#[test]
fn test_timeout_fails_slow_dispatch() -> Result<()> {
    let config = DispatchConfig::builder()
        .num_workers(1)
        .timeout(Duration::from_millis(100))
        .poll_interval(Duration::from_millis(10))
        .build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let started = Instant::now();
    let result = dispatcher.dispatch(
        |x: &u64, _: &()| {
            thread::sleep(Duration::from_millis(1_000));
            Ok(*x)
        },
        vec![1],
        (),
    );

    match result {
        Err(DispatchError::TaskTimeout {
            index,
            timeout,
            in_flight,
        }) => {
            assert_eq!(index, 0);
            assert_eq!(timeout, Duration::from_millis(100));
            assert_eq!(in_flight, 1);
        }
        other => panic!("expected TaskTimeout, got {:?}", other),
    }
    assert!(
        started.elapsed() < Duration::from_millis(900),
        "timed out call must not wait for the stuck task"
    );
    Ok(())
}

#[test]
fn test_timeout_catches_slow_task_among_fast_ones() -> Result<()> {
    let config = DispatchConfig::builder()
        .num_workers(2)
        .timeout(Duration::from_millis(150))
        .poll_interval(Duration::from_millis(10))
        .build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    // The other worker keeps completing fast tasks while task 0 is stuck
    let mut delays = vec![1_500u64];
    delays.extend(std::iter::repeat(50).take(28));

    let started = Instant::now();
    let result = dispatcher.dispatch(
        |delay_ms: &u64, _: &()| {
            thread::sleep(Duration::from_millis(*delay_ms));
            Ok(*delay_ms)
        },
        delays,
        (),
    );

    match result {
        Err(DispatchError::TaskTimeout { index, timeout, .. }) => {
            assert_eq!(index, 0);
            assert_eq!(timeout, Duration::from_millis(150));
        }
        other => panic!("expected TaskTimeout, got {:?}", other.map(|v| v.len())),
    }
    assert!(
        started.elapsed() < Duration::from_millis(1_000),
        "slow task ran to completion: {:?}",
        started.elapsed()
    );
    Ok(())
}

#[test]
fn test_queued_time_does_not_count_toward_timeout() -> Result<()> {
    let config = DispatchConfig::builder()
        .num_workers(1)
        .prefetch_factor(4)
        .timeout(Duration::from_millis(150))
        .poll_interval(Duration::from_millis(10))
        .build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    // Each task waits behind the others but runs well within the limit
    let results = dispatcher.dispatch(
        |x: &u64, _: &()| {
            thread::sleep(Duration::from_millis(60));
            Ok(*x)
        },
        0..4,
        (),
    )?;
    assert_eq!(results, vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn test_timeout_not_triggered_by_fast_tasks() -> Result<()> {
    let config = DispatchConfig::builder()
        .num_workers(2)
        .timeout(Duration::from_millis(500))
        .build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let results = dispatcher.dispatch(
        |x: &u64, _: &()| {
            thread::sleep(Duration::from_millis(10));
            Ok(*x)
        },
        0..10,
        (),
    )?;
    assert_eq!(results, (0..10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_unordered_timeout_is_yielded() -> Result<()> {
    let config = DispatchConfig::builder()
        .num_workers(2)
        .timeout(Duration::from_millis(100))
        .poll_interval(Duration::from_millis(10))
        .build();
    let dispatcher = TaskDispatcher::unordered().with_config(config)?;

    let items: Vec<Result<u64, DispatchError>> = dispatcher
        .dispatch(
            |x: &u64, _: &()| {
                if *x == 1 {
                    thread::sleep(Duration::from_millis(1_000));
                }
                Ok(*x)
            },
            vec![0, 1],
            (),
        )?
        .collect();

    assert_eq!(items.len(), 2);
    assert_eq!(*items[0].as_ref().unwrap(), 0);
    assert!(matches!(items[1], Err(DispatchError::TaskTimeout { .. })));
    Ok(())
}

#[test]
fn test_cancellation_stops_dispatch() -> Result<()> {
    let token = CancellationToken::new();
    let config = DispatchConfig::builder()
        .num_workers(2)
        .poll_interval(Duration::from_millis(10))
        .cancellation(token.clone())
        .build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.cancel();
    });

    let result = dispatcher.dispatch(
        |x: &u32, _: &()| {
            thread::sleep(Duration::from_millis(20));
            Ok(*x)
        },
        0..200,
        (),
    );
    canceller.join().unwrap();

    match result {
        Err(DispatchError::Cancelled { completed, total }) => {
            assert_eq!(total, 200);
            assert!(completed < 200, "completed {} tasks", completed);
        }
        other => panic!("expected Cancelled, got {:?}", other.map(|v| v.len())),
    }
    Ok(())
}

#[test]
fn test_cancelled_token_prevents_any_work() -> Result<()> {
    let token = CancellationToken::new();
    token.cancel();

    let runs = Arc::new(AtomicUsize::new(0));
    let config = DispatchConfig::builder().cancellation(token).build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let counter = runs.clone();
    let result = dispatcher.dispatch(
        move |x: &u32, _: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(*x)
        },
        0..10,
        (),
    );

    assert!(matches!(
        result,
        Err(DispatchError::Cancelled { completed: 0, total: 10 })
    ));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    Ok(())
}

// ============================================================================
// 4. Retries
// ============================================================================

/// Fails the first attempt for every input, succeeds afterwards.
fn flaky_double(
    failed_once: Arc<Mutex<HashSet<u32>>>,
) -> impl Fn(&u32, &()) -> Result<u32> + Send + Sync + 'static {
    move |x, _| {
        let first_attempt = failed_once.lock().unwrap().insert(*x);
        if first_attempt {
            Err(anyhow!("transient failure for {}", x))
        } else {
            Ok(x * 2)
        }
    }
}

#[test]
fn test_retries_recover_transient_failures() -> Result<()> {
    let config = DispatchConfig::builder().max_retries(1).build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let results = dispatcher.dispatch(flaky_double(Arc::default()), 0..10, ())?;
    assert_eq!(results, (0..10).map(|x| x * 2).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_no_retries_by_default() {
    let dispatcher = TaskDispatcher::new();
    let result = dispatcher.dispatch(flaky_double(Arc::default()), 0..10, ());

    assert!(matches!(result, Err(DispatchError::TaskExecution { .. })));
}

#[test]
fn test_panics_are_not_retried() -> Result<()> {
    let attempts = Arc::new(AtomicUsize::new(0));
    let config = DispatchConfig::builder().max_retries(3).build();
    let dispatcher = TaskDispatcher::new().with_config(config)?;

    let counter = attempts.clone();
    let result = dispatcher.dispatch(
        move |_: &u32, _: &()| -> Result<u32> {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("not transient");
        },
        vec![1],
        (),
    );

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    Ok(())
}

// ============================================================================
// 5. Concurrent Callers
// ============================================================================

#[test]
fn test_shared_dispatcher_across_threads() -> Result<()> {
    let dispatcher = Arc::new(TaskDispatcher::new());

    let handles: Vec<_> = (0..4u64)
        .map(|offset| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                dispatcher.dispatch(|x: &u64, offset: &u64| Ok(x + offset), 0..100, offset)
            })
        })
        .collect();

    for (offset, handle) in handles.into_iter().enumerate() {
        let results = handle.join().unwrap()?;
        let expected: Vec<u64> = (0..100).map(|x| x + offset as u64).collect();
        assert_eq!(results, expected);
    }
    Ok(())
}
