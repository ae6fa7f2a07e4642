//! Tests for the job layer, split by component.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::jobs::{Job, WorkerFn, worker_fn};

/// Worker that doubles its input
pub(super) fn doubling_worker() -> WorkerFn<i32, i32> {
    worker_fn(|x: i32| async move { Ok::<i32, Error>(x * 2) })
}

/// Worker that doubles its input but fails on one specific value
pub(super) fn failing_worker(fail_on: i32) -> WorkerFn<i32, i32> {
    worker_fn(move |x: i32| async move {
        if x == fail_on {
            Err(Error::Other(format!("worker refused input {x}")))
        } else {
            Ok(x * 2)
        }
    })
}

/// Worker that sleeps for `millis` per item before doubling
pub(super) fn slow_worker(millis: u64) -> WorkerFn<i32, i32> {
    worker_fn(move |x: i32| async move {
        tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
        Ok::<i32, Error>(x * 2)
    })
}

/// A doubling job over `items` with default options
pub(super) fn doubling_job(id: &str, items: Vec<i32>) -> Job<i32, i32> {
    Job::new(id, doubling_worker(), items)
}

/// Counter-bumping worker used to verify each item runs at most once
pub(super) fn counting_worker(counter: Arc<AtomicUsize>) -> WorkerFn<i32, i32> {
    worker_fn(move |x: i32| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<i32, Error>(x)
        }
    })
}

/// Sorted copy of a result list, for permutation assertions
pub(super) fn sorted(mut values: Vec<i32>) -> Vec<i32> {
    values.sort_unstable();
    values
}

/// Assert a result is the `Cancelled` job error
pub(super) fn assert_cancelled_error<T: std::fmt::Debug>(result: Result<T>) {
    match result {
        Err(Error::Job(crate::error::JobError::Cancelled { .. })) => {}
        other => panic!("expected JobError::Cancelled, got {other:?}"),
    }
}
