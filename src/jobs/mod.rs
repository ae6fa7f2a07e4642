//! Cancellable batch jobs
//!
//! A [`Job`] is one logical unit of cancellable, parallelizable work: a
//! worker function fanned out over a list of input items on an execution
//! pool, with per-item callbacks, completion-order output collection, and an
//! explicit state machine (`pending → running → finished | error |
//! cancelled`). The workflow layer registers jobs in a [`JobRegistry`] under
//! stable ids (`"search"`, `"download"`) so an embedding UI can look them up,
//! watch their status, and cancel them from any thread via a [`JobHandle`].
//!
//! Cancellation is cooperative: it is polled at worker entry and after every
//! collected result, never preemptive. Results collected before the
//! cancellation was observed always remain on the job.

mod registry;
pub(crate) mod runner;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use registry::JobRegistry;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, JobError, Result};
use crate::types::{JobId, JobStatus};

/// Default bound on simultaneously in-flight worker invocations
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Worker function fanned out over a job's items
///
/// Workers take their input by value and resolve to a single result. They
/// typically close over an `Arc` of the portal client.
pub type WorkerFn<I, R> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<R>> + Send + Sync>;

/// Callback invoked on the collecting task after each completed item
pub type ItemCallback<R> = Arc<dyn Fn(&R) + Send + Sync>;

/// Callback invoked once with every collected result after a normal run
pub type FinishedCallback<R> = Arc<dyn Fn(&[R]) + Send + Sync>;

/// Wrap a plain async closure into a [`WorkerFn`]
pub fn worker_fn<I, R, F, Fut>(f: F) -> WorkerFn<I, R>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    Arc::new(move |item| -> BoxFuture<'static, Result<R>> { Box::pin(f(item)) })
}

/// Lock a mutex, recovering from poisoning
///
/// A panicking worker callback must not wedge every later status query.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a job's items are executed
///
/// A closed set of pool strategies; the runner drives all of them through
/// one submit / next-completed / shutdown interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One item at a time on the calling task
    Sequential,
    /// Concurrent futures polled on the calling task; cancellation drops
    /// pending work immediately
    Inline,
    /// Tasks spawned onto the tokio runtime; cancellation detaches stragglers
    /// rather than waiting for them
    #[default]
    Spawned,
}

/// Execution options for a [`Job`]
#[derive(Clone, Copy, Debug)]
pub struct JobOptions {
    /// Pool strategy (default [`ExecutionMode::Spawned`])
    pub mode: ExecutionMode,

    /// Bound on simultaneously in-flight worker invocations (default 10)
    pub max_concurrency: usize,

    /// Record worker failures instead of aborting the run
    ///
    /// When set, a failed item's result is simply omitted and the run
    /// continues; the failure is still captured in the job's failure map and
    /// the job still ends `errored`.
    pub suppress_errors: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            suppress_errors: false,
        }
    }
}

/// A captured worker failure
///
/// Retained on the job keyed by attempt sequence number, so failures can be
/// inspected post-mortem even when they were suppressed during the run.
#[derive(Clone, Debug)]
pub struct WorkerFailure {
    /// Worker invocation sequence number (1-based, across runs)
    pub attempt: u64,

    /// Debug rendering of the input that produced the failure
    pub input: String,

    /// The underlying error
    pub error: Arc<Error>,
}

impl WorkerFailure {
    /// Render this failure as a [`JobError::Worker`] for the given job
    pub fn to_job_error(&self, id: &JobId) -> JobError {
        JobError::Worker {
            id: id.clone(),
            input: self.input.clone(),
            message: self.error.to_string(),
        }
    }
}

/// Tagged outcome of a job run
///
/// Cancellation and worker failure are expected outcomes a caller branches
/// on, not exceptional control flow; `Job::start()` reserves `Err` for
/// invalid starts (double start, start after cancel without reset).
#[derive(Clone, Debug)]
pub enum Outcome<R> {
    /// Every item completed; carries all collected results
    Finished(Vec<R>),
    /// The run was cancelled; carries the results collected before the
    /// cancellation was observed
    Cancelled(Vec<R>),
    /// A worker failure ended the run errored
    Failed {
        /// The failure that ended the run (the first one, when suppressed)
        failure: WorkerFailure,
        /// Results collected from items that succeeded
        partial: Vec<R>,
    },
}

impl<R> Outcome<R> {
    /// The collected results, regardless of how the run ended
    pub fn results(&self) -> &[R] {
        match self {
            Outcome::Finished(results) | Outcome::Cancelled(results) => results,
            Outcome::Failed { partial, .. } => partial,
        }
    }

    /// Consume the outcome, yielding the collected results
    pub fn into_results(self) -> Vec<R> {
        match self {
            Outcome::Finished(results) | Outcome::Cancelled(results) => results,
            Outcome::Failed { partial, .. } => partial,
        }
    }

    /// True if every item completed
    pub fn is_finished(&self) -> bool {
        matches!(self, Outcome::Finished(_))
    }

    /// True if the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled(_))
    }

    /// True if a worker failure ended the run
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// Shared, type-erased job state
///
/// Everything a cross-thread [`JobHandle`] or the runner needs: the status
/// word, the cancellation token, and the failure map. Output stays on the
/// typed [`Job`].
pub(crate) struct JobCore {
    id: JobId,
    status: AtomicU8,
    token: Mutex<CancellationToken>,
    runs: AtomicU64,
    attempts: AtomicU64,
    failures: Mutex<BTreeMap<u64, WorkerFailure>>,
}

impl JobCore {
    fn new(id: JobId) -> Self {
        Self {
            id,
            status: AtomicU8::new(JobStatus::Pending.to_u8()),
            token: Mutex::new(CancellationToken::new()),
            runs: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            failures: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn id(&self) -> &JobId {
        &self.id
    }

    pub(crate) fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Unconditional status store (registry `set_job_status` escape hatch)
    fn set_status(&self, status: JobStatus) {
        self.status.store(status.to_u8(), Ordering::SeqCst);
    }

    pub(crate) fn token(&self) -> CancellationToken {
        lock(&self.token).clone()
    }

    /// `pending → running` or the reason it cannot start
    fn begin(&self) -> std::result::Result<(), JobError> {
        match self.status.compare_exchange(
            JobStatus::Pending.to_u8(),
            JobStatus::Running.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(actual) => Err(match JobStatus::from_u8(actual) {
                JobStatus::Running => JobError::AlreadyRunning {
                    id: self.id.clone(),
                },
                JobStatus::Cancelled => JobError::Cancelled {
                    id: self.id.clone(),
                },
                status => JobError::AlreadyEnded {
                    id: self.id.clone(),
                    status,
                },
            }),
        }
    }

    /// Idempotent cancel from any non-terminal state
    ///
    /// Returns whether this call performed the transition. Safe from any
    /// thread; the running collector observes the token and tears the pool
    /// down without waiting.
    pub(crate) fn cancel(&self) -> bool {
        loop {
            let current = self.status.load(Ordering::SeqCst);
            if JobStatus::from_u8(current).is_terminal() {
                return false;
            }
            if self
                .status
                .compare_exchange(
                    current,
                    JobStatus::Cancelled.to_u8(),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                lock(&self.token).cancel();
                return true;
            }
        }
    }

    /// `running → to`, unless something else (a cancel) got there first;
    /// returns the resulting status either way
    fn transition_from_running(&self, to: JobStatus) -> JobStatus {
        match self.status.compare_exchange(
            JobStatus::Running.to_u8(),
            to.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => to,
            Err(actual) => JobStatus::from_u8(actual),
        }
    }

    pub(crate) fn next_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_failure(&self, failure: WorkerFailure) {
        lock(&self.failures).insert(failure.attempt, failure);
    }

    /// Re-arm a terminal job back to `pending`
    fn reset(&self) -> std::result::Result<(), JobError> {
        let current = self.status();
        match current {
            JobStatus::Running => Err(JobError::AlreadyRunning {
                id: self.id.clone(),
            }),
            JobStatus::Pending => Ok(()),
            _ => {
                *lock(&self.token) = CancellationToken::new();
                lock(&self.failures).clear();
                self.status
                    .store(JobStatus::Pending.to_u8(), Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

/// Cheap cross-thread handle to a job's status and cancellation
///
/// This is what a UI keeps while `start()` runs on a background task: it can
/// poll the status or request cancellation without touching the typed job.
#[derive(Clone)]
pub struct JobHandle {
    core: Arc<JobCore>,
}

impl JobHandle {
    /// The job's id
    pub fn id(&self) -> &JobId {
        self.core.id()
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.core.status()
    }

    /// Request cancellation; returns whether this call performed the
    /// transition (false if the job already ended)
    pub fn cancel(&self) -> bool {
        self.core.cancel()
    }

    /// True once the job reached any terminal state
    pub fn ended(&self) -> bool {
        self.core.status().is_terminal()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", self.core.id())
            .field("status", &self.core.status())
            .finish()
    }
}

/// One cancellable, trackable unit of batch work
///
/// Built with a worker and its input items, then driven with
/// [`start()`](Job::start). The output list grows in completion order and is
/// never truncated, even under cancellation.
pub struct Job<I, R> {
    core: Arc<JobCore>,
    worker: WorkerFn<I, R>,
    items: Vec<I>,
    callback: Option<ItemCallback<R>>,
    finished_callback: Option<FinishedCallback<R>>,
    options: JobOptions,
    output: Arc<Mutex<Vec<R>>>,
}

impl<I, R> Job<I, R>
where
    I: Clone + std::fmt::Debug + Send + 'static,
    R: Clone + Send + 'static,
{
    /// Create a job with default options
    pub fn new(id: impl Into<JobId>, worker: WorkerFn<I, R>, items: Vec<I>) -> Self {
        Self {
            core: Arc::new(JobCore::new(id.into())),
            worker,
            items,
            callback: None,
            finished_callback: None,
            options: JobOptions::default(),
            output: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a job from a plain async closure
    pub fn from_fn<F, Fut>(id: impl Into<JobId>, f: F, items: Vec<I>) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self::new(id, worker_fn(f), items)
    }

    /// Set the per-item callback, invoked on the collecting task after each
    /// completed item
    pub fn with_callback(mut self, callback: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Set the finished callback, invoked once with every result after a
    /// normal (uncancelled, unfailed) run
    pub fn with_finished_callback(
        mut self,
        callback: impl Fn(&[R]) + Send + Sync + 'static,
    ) -> Self {
        self.finished_callback = Some(Arc::new(callback));
        self
    }

    /// Replace all execution options
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the pool strategy
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Bound the number of simultaneously in-flight worker invocations
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.options.max_concurrency = max_concurrency;
        self
    }

    /// Record worker failures instead of aborting the run
    pub fn suppress_errors(mut self, suppress: bool) -> Self {
        self.options.suppress_errors = suppress;
        self
    }

    /// The job's id
    pub fn id(&self) -> &JobId {
        self.core.id()
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.core.status()
    }

    /// True if the job was created but never started
    pub fn pending(&self) -> bool {
        self.status().is_pending()
    }

    /// True while a run is in flight
    pub fn running(&self) -> bool {
        self.status().is_running()
    }

    /// True once a run completed every item
    pub fn finished(&self) -> bool {
        self.status().is_finished()
    }

    /// True once a run was aborted by a worker failure
    pub fn errored(&self) -> bool {
        self.status().is_errored()
    }

    /// True once the job was cancelled
    pub fn cancelled(&self) -> bool {
        self.status().is_cancelled()
    }

    /// True once the job reached any terminal state
    pub fn ended(&self) -> bool {
        self.status().is_terminal()
    }

    /// Number of input items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of completed runs started on this job
    pub fn runs(&self) -> u64 {
        self.core.runs.load(Ordering::Relaxed)
    }

    /// Snapshot of the output collected so far, in completion order
    pub fn output(&self) -> Vec<R> {
        lock(&self.output).clone()
    }

    /// Snapshot of captured worker failures, keyed by attempt sequence number
    pub fn failures(&self) -> BTreeMap<u64, WorkerFailure> {
        lock(&self.core.failures).clone()
    }

    /// Number of captured worker failures
    pub fn failure_count(&self) -> usize {
        lock(&self.core.failures).len()
    }

    /// A cheap handle for cross-thread status checks and cancellation
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            core: self.core.clone(),
        }
    }

    /// Request cancellation; returns whether this call performed the
    /// transition
    ///
    /// Valid from any non-terminal state. Cancelling a `pending` job makes a
    /// later `start()` fail with [`JobError::Cancelled`]; cancelling a
    /// `running` job makes the in-flight `start()` resolve to
    /// [`Outcome::Cancelled`] with the partial output retained.
    pub fn cancel(&self) -> bool {
        let transitioned = self.core.cancel();
        if transitioned {
            tracing::info!(job = %self.core.id(), "job cancelled");
        }
        transitioned
    }

    /// Re-arm a terminal job back to `pending`, clearing output and failures
    pub fn reset(&self) -> Result<()> {
        self.core.reset().map_err(Error::from)?;
        lock(&self.output).clear();
        Ok(())
    }

    /// Run the job to a terminal state
    ///
    /// Resolves only when every item completed, a worker failure aborted the
    /// run, or cancellation was observed. Returns the tagged [`Outcome`];
    /// `Err` is reserved for invalid starts:
    ///
    /// - [`JobError::AlreadyRunning`] if a run is already in flight
    /// - [`JobError::Cancelled`] if the job was cancelled before starting
    /// - [`JobError::AlreadyEnded`] if it ended and was never `reset()`
    pub async fn start(&self) -> Result<Outcome<R>> {
        self.core.begin().map_err(Error::from)?;
        self.core.runs.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            job = %self.core.id(),
            items = self.items.len(),
            mode = ?self.options.mode,
            max_concurrency = self.options.max_concurrency,
            "job starting"
        );

        let end = runner::execute(runner::RunParams {
            core: self.core.clone(),
            worker: self.worker.clone(),
            items: self.items.clone(),
            callback: self.callback.clone(),
            finished_callback: self.finished_callback.clone(),
            options: self.options,
            output: self.output.clone(),
        })
        .await;

        match end {
            runner::RunEnd::Completed => {
                match self.core.transition_from_running(JobStatus::Finished) {
                    JobStatus::Finished => {
                        tracing::debug!(
                            job = %self.core.id(),
                            results = lock(&self.output).len(),
                            "job finished"
                        );
                        Ok(Outcome::Finished(self.output()))
                    }
                    // A cancel won the race against the last item; the
                    // collected output stands.
                    _ => Ok(Outcome::Cancelled(self.output())),
                }
            }
            runner::RunEnd::Cancelled => {
                // Covers workers that surface cancellation themselves while
                // nobody called cancel(); the transition is idempotent.
                self.core.cancel();
                tracing::info!(
                    job = %self.core.id(),
                    partial = lock(&self.output).len(),
                    "job run ended by cancellation"
                );
                Ok(Outcome::Cancelled(self.output()))
            }
            runner::RunEnd::Failed(failure) => {
                match self.core.transition_from_running(JobStatus::Error) {
                    JobStatus::Cancelled => Ok(Outcome::Cancelled(self.output())),
                    _ => {
                        tracing::error!(
                            job = %self.core.id(),
                            input = %failure.input,
                            error = %failure.error,
                            "job run ended by worker failure"
                        );
                        Ok(Outcome::Failed {
                            failure,
                            partial: self.output(),
                        })
                    }
                }
            }
        }
    }
}

/// Type-erased job interface stored by the [`JobRegistry`]
///
/// Lets one registry hold jobs with different item/result types while still
/// offering status, cancellation, and start passthroughs.
#[async_trait]
pub trait ManagedJob: Send + Sync {
    /// The job's id
    fn id(&self) -> &JobId;

    /// Current status
    fn status(&self) -> JobStatus;

    /// Unconditionally overwrite the status (controller escape hatch)
    fn set_status(&self, status: JobStatus);

    /// Request cancellation; returns whether this call performed the
    /// transition
    fn cancel(&self) -> bool;

    /// Re-arm a terminal job back to `pending`
    fn reset(&self) -> Result<()>;

    /// Number of captured worker failures
    fn failure_count(&self) -> usize;

    /// Run the job to a terminal state, returning the final status
    ///
    /// Typed callers use [`Job::start`] directly to get the typed
    /// [`Outcome`]; this passthrough exists for registry-driven callers that
    /// branch on status alone.
    async fn run(&self) -> Result<JobStatus>;
}

#[async_trait]
impl<I, R> ManagedJob for Job<I, R>
where
    I: Clone + std::fmt::Debug + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn id(&self) -> &JobId {
        Job::id(self)
    }

    fn status(&self) -> JobStatus {
        Job::status(self)
    }

    fn set_status(&self, status: JobStatus) {
        self.core.set_status(status);
    }

    fn cancel(&self) -> bool {
        Job::cancel(self)
    }

    fn reset(&self) -> Result<()> {
        Job::reset(self)
    }

    fn failure_count(&self) -> usize {
        Job::failure_count(self)
    }

    async fn run(&self) -> Result<JobStatus> {
        self.start().await?;
        Ok(self.status())
    }
}
