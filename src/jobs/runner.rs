//! Pool-backed task execution
//!
//! The engine behind [`Job::start`](super::Job::start): fans a worker out
//! over the input items on one of the [`ExecutionMode`] pool strategies,
//! collects results in completion order, and polls for cancellation at
//! worker entry and after every collected result.
//!
//! Shutdown semantics on cancellation differ by pool: an inline pool drops
//! its pending futures on the spot, while a spawned pool detaches its
//! in-flight tasks — those stragglers may briefly keep running after the job
//! reports cancelled, and their late results are discarded. Nothing ever
//! waits on them.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio::task::JoinSet;

use super::{
    ExecutionMode, FinishedCallback, ItemCallback, JobCore, JobOptions, WorkerFailure, WorkerFn,
    lock,
};
use crate::error::{Error, JobError};

/// Everything one run needs, bundled to keep the entry point readable
pub(crate) struct RunParams<I, R> {
    pub(crate) core: Arc<JobCore>,
    pub(crate) worker: WorkerFn<I, R>,
    pub(crate) items: Vec<I>,
    pub(crate) callback: Option<ItemCallback<R>>,
    pub(crate) finished_callback: Option<FinishedCallback<R>>,
    pub(crate) options: JobOptions,
    pub(crate) output: Arc<Mutex<Vec<R>>>,
}

/// How a run ended, as observed by the collector
pub(crate) enum RunEnd {
    /// Every item was processed (suppressed failures may have occurred)
    Completed,
    /// Cancellation was observed; collection stopped
    Cancelled,
    /// An unsuppressed worker failure aborted collection, or a suppressed
    /// run processed everything but recorded failures (carries the first)
    Failed(WorkerFailure),
}

/// How a single wrapped worker invocation ended
enum TaskEnd<R> {
    Done(R),
    Cancelled,
    Failed(WorkerFailure),
}

/// Wrap one worker invocation with the entry-side cancellation check and
/// failure capture
fn wrap_task<I, R>(
    core: Arc<JobCore>,
    worker: WorkerFn<I, R>,
    item: I,
) -> BoxFuture<'static, TaskEnd<R>>
where
    I: std::fmt::Debug + Send + 'static,
    R: Send + 'static,
{
    Box::pin(async move {
        if core.status().is_cancelled() {
            return TaskEnd::Cancelled;
        }
        let attempt = core.next_attempt();
        let input = format!("{item:?}");
        match (worker)(item).await {
            Ok(result) => TaskEnd::Done(result),
            Err(Error::Job(JobError::Cancelled { .. })) => TaskEnd::Cancelled,
            Err(error) => {
                let failure = WorkerFailure {
                    attempt,
                    input,
                    error: Arc::new(error),
                };
                core.record_failure(failure.clone());
                TaskEnd::Failed(failure)
            }
        }
    })
}

/// The two pooled strategies behind one submit / next-completed / shutdown
/// interface
enum ExecutionPool<T> {
    Inline(FuturesUnordered<BoxFuture<'static, T>>),
    Spawned(JoinSet<T>),
}

impl<T: Send + 'static> ExecutionPool<T> {
    fn for_mode(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Spawned => ExecutionPool::Spawned(JoinSet::new()),
            // Sequential never builds a pool; treat it like Inline if it
            // ever reaches here.
            ExecutionMode::Inline | ExecutionMode::Sequential => {
                ExecutionPool::Inline(FuturesUnordered::new())
            }
        }
    }

    fn submit(&mut self, task: BoxFuture<'static, T>) {
        match self {
            ExecutionPool::Inline(futures) => futures.push(task),
            ExecutionPool::Spawned(set) => {
                set.spawn(task);
            }
        }
    }

    /// Next result in completion order; `None` once the pool is drained
    async fn next_completed(&mut self) -> Option<T> {
        match self {
            ExecutionPool::Inline(futures) => futures.next().await,
            ExecutionPool::Spawned(set) => loop {
                match set.join_next().await? {
                    Ok(value) => return Some(value),
                    Err(join_error) if join_error.is_cancelled() => continue,
                    Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
                }
            },
        }
    }

    /// Tear the pool down without waiting on in-flight work
    fn shutdown_detached(self) {
        match self {
            // Dropping the set drops its pending futures outright.
            ExecutionPool::Inline(_) => {}
            ExecutionPool::Spawned(mut set) => {
                set.detach_all();
            }
        }
    }
}

/// Run a job's items to a [`RunEnd`]
pub(crate) async fn execute<I, R>(params: RunParams<I, R>) -> RunEnd
where
    I: std::fmt::Debug + Send + 'static,
    R: Clone + Send + 'static,
{
    match params.options.mode {
        ExecutionMode::Sequential => run_sequential(params).await,
        ExecutionMode::Inline | ExecutionMode::Spawned => run_pooled(params).await,
    }
}

async fn run_pooled<I, R>(params: RunParams<I, R>) -> RunEnd
where
    I: std::fmt::Debug + Send + 'static,
    R: Clone + Send + 'static,
{
    let RunParams {
        core,
        worker,
        items,
        callback,
        finished_callback,
        options,
        output,
    } = params;

    let token = core.token();
    let total = items.len();
    let in_flight_limit = options.max_concurrency.max(1);
    let mut pool = ExecutionPool::for_mode(options.mode);
    let mut pending = items.into_iter();
    let mut first_failure: Option<WorkerFailure> = None;
    let mut completed = 0usize;

    for item in pending.by_ref().take(in_flight_limit) {
        pool.submit(wrap_task(core.clone(), worker.clone(), item));
    }

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(
                    job = %core.id(),
                    completed,
                    total,
                    "cancellation observed; shutting pool down without waiting"
                );
                pool.shutdown_detached();
                return RunEnd::Cancelled;
            }
            next = pool.next_completed() => next,
        };
        let Some(task_end) = next else { break };

        match task_end {
            TaskEnd::Done(result) => {
                completed += 1;
                lock(&output).push(result.clone());
                if let Some(cb) = &callback {
                    cb(&result);
                }
            }
            TaskEnd::Cancelled => {
                pool.shutdown_detached();
                return RunEnd::Cancelled;
            }
            TaskEnd::Failed(failure) => {
                completed += 1;
                if !options.suppress_errors {
                    tracing::error!(
                        job = %core.id(),
                        input = %failure.input,
                        error = %failure.error,
                        "worker failed; aborting remaining collection"
                    );
                    pool.shutdown_detached();
                    return RunEnd::Failed(failure);
                }
                tracing::warn!(
                    job = %core.id(),
                    input = %failure.input,
                    error = %failure.error,
                    "worker failed; error suppressed"
                );
                first_failure.get_or_insert(failure);
            }
        }

        // Cancellation is polled after every collected item.
        if core.status().is_cancelled() {
            pool.shutdown_detached();
            return RunEnd::Cancelled;
        }
        if let Some(item) = pending.next() {
            pool.submit(wrap_task(core.clone(), worker.clone(), item));
        }
    }

    if let Some(failure) = first_failure {
        return RunEnd::Failed(failure);
    }
    if let Some(cb) = &finished_callback {
        let snapshot = lock(&output).clone();
        cb(&snapshot);
    }
    RunEnd::Completed
}

async fn run_sequential<I, R>(params: RunParams<I, R>) -> RunEnd
where
    I: std::fmt::Debug + Send + 'static,
    R: Clone + Send + 'static,
{
    let RunParams {
        core,
        worker,
        items,
        callback,
        finished_callback,
        options,
        output,
    } = params;

    let mut first_failure: Option<WorkerFailure> = None;

    for item in items {
        match wrap_task(core.clone(), worker.clone(), item).await {
            TaskEnd::Done(result) => {
                lock(&output).push(result.clone());
                if let Some(cb) = &callback {
                    cb(&result);
                }
            }
            TaskEnd::Cancelled => return RunEnd::Cancelled,
            TaskEnd::Failed(failure) => {
                if !options.suppress_errors {
                    tracing::error!(
                        job = %core.id(),
                        input = %failure.input,
                        error = %failure.error,
                        "worker failed; aborting remaining items"
                    );
                    return RunEnd::Failed(failure);
                }
                tracing::warn!(
                    job = %core.id(),
                    input = %failure.input,
                    error = %failure.error,
                    "worker failed; error suppressed"
                );
                first_failure.get_or_insert(failure);
            }
        }
        if core.status().is_cancelled() {
            return RunEnd::Cancelled;
        }
    }

    if let Some(failure) = first_failure {
        return RunEnd::Failed(failure);
    }
    if let Some(cb) = &finished_callback {
        let snapshot = lock(&output).clone();
        cb(&snapshot);
    }
    RunEnd::Completed
}
