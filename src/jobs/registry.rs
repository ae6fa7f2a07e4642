//! Keyed job store
//!
//! The registry is the integration point a controller/UI layer talks to: it
//! owns the id → job map, hands out passthroughs by id, and supports bulk
//! cancellation. It is the only cross-job shared mutable structure in the
//! crate and is mutex-guarded throughout; no method holds the guard across
//! an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Job, JobOptions, ManagedJob, WorkerFn, lock};
use crate::error::{JobError, Result};
use crate::types::{JobId, JobStatus};

/// Keyed collection of jobs
///
/// Ids are unique; registering a job under an existing id replaces the old
/// entry (last write wins) — callers keep one id per logical operation.
/// Entries are never evicted automatically; cleanup is the caller's job.
/// Nothing here persists across a process restart.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<dyn ManagedJob>>>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, replacing any existing entry with the same id
    ///
    /// Returns the typed `Arc` so the caller keeps access to the job's
    /// typed output while the registry holds the erased view.
    pub fn register<I, R>(&self, job: Job<I, R>) -> Arc<Job<I, R>>
    where
        I: Clone + std::fmt::Debug + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let erased: Arc<dyn ManagedJob> = job.clone();
        let previous = lock(&self.jobs).insert(job.id().clone(), erased);
        if previous.is_some() {
            tracing::debug!(job = %job.id(), "replaced existing job registration");
        }
        job
    }

    /// Build a job from a worker and items and register it
    pub fn create_job<I, R>(
        &self,
        id: impl Into<JobId>,
        worker: WorkerFn<I, R>,
        items: Vec<I>,
        options: JobOptions,
    ) -> Arc<Job<I, R>>
    where
        I: Clone + std::fmt::Debug + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        self.register(Job::new(id, worker, items).with_options(options))
    }

    /// Look up a job by id
    pub fn job(&self, id: &JobId) -> Result<Arc<dyn ManagedJob>> {
        lock(&self.jobs)
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound { id: id.clone() }.into())
    }

    /// True if a job is registered under the id
    pub fn contains(&self, id: &JobId) -> bool {
        lock(&self.jobs).contains_key(id)
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    /// True if no jobs are registered
    pub fn is_empty(&self) -> bool {
        lock(&self.jobs).is_empty()
    }

    /// Fresh snapshot of every registered job
    pub fn jobs(&self) -> HashMap<JobId, Arc<dyn ManagedJob>> {
        lock(&self.jobs).clone()
    }

    /// Run the named job to a terminal state, returning the final status
    pub async fn start_job(&self, id: &JobId) -> Result<JobStatus> {
        let job = self.job(id)?;
        job.run().await
    }

    /// Cancel the named job; returns whether this call performed the
    /// transition
    pub fn cancel_job(&self, id: &JobId) -> Result<bool> {
        Ok(self.job(id)?.cancel())
    }

    /// Current status of the named job
    pub fn job_status(&self, id: &JobId) -> Result<JobStatus> {
        Ok(self.job(id)?.status())
    }

    /// Unconditionally overwrite the named job's status (controller escape
    /// hatch; prefer `cancel_job`/`start_job` for real transitions)
    pub fn set_job_status(&self, id: &JobId, status: JobStatus) -> Result<()> {
        self.job(id)?.set_status(status);
        Ok(())
    }

    /// Remove the named job from the registry
    ///
    /// The job itself is unaffected; anyone holding its `Arc` or a handle
    /// keeps it alive.
    pub fn delete_job(&self, id: &JobId) -> Result<()> {
        lock(&self.jobs)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| JobError::NotFound { id: id.clone() }.into())
    }

    /// Cancel every registered job, returning how many transitions were
    /// performed
    ///
    /// Iterates a snapshot of the map; each job is cancelled independently,
    /// so no single job can abort the sweep. Already-ended jobs are skipped.
    pub fn cancel_all(&self) -> usize {
        let snapshot: Vec<Arc<dyn ManagedJob>> = lock(&self.jobs).values().cloned().collect();
        let mut transitions = 0;
        for job in snapshot {
            if job.cancel() {
                transitions += 1;
                tracing::info!(job = %job.id(), "job cancelled by cancel_all");
            } else {
                tracing::debug!(
                    job = %job.id(),
                    status = %job.status(),
                    "cancel_all skipped already-ended job"
                );
            }
        }
        transitions
    }

    fn partition(&self, predicate: fn(JobStatus) -> bool) -> HashMap<JobId, Arc<dyn ManagedJob>> {
        lock(&self.jobs)
            .iter()
            .filter(|(_, job)| predicate(job.status()))
            .map(|(id, job)| (id.clone(), job.clone()))
            .collect()
    }

    /// Fresh snapshot of jobs currently running
    pub fn running_jobs(&self) -> HashMap<JobId, Arc<dyn ManagedJob>> {
        self.partition(JobStatus::is_running)
    }

    /// Fresh snapshot of jobs that finished normally
    pub fn finished_jobs(&self) -> HashMap<JobId, Arc<dyn ManagedJob>> {
        self.partition(JobStatus::is_finished)
    }

    /// Fresh snapshot of jobs that ended errored
    pub fn failed_jobs(&self) -> HashMap<JobId, Arc<dyn ManagedJob>> {
        self.partition(JobStatus::is_errored)
    }

    /// Fresh snapshot of jobs that were cancelled
    pub fn cancelled_jobs(&self) -> HashMap<JobId, Arc<dyn ManagedJob>> {
        self.partition(JobStatus::is_cancelled)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let jobs = lock(&self.jobs);
        let mut map = f.debug_map();
        for (id, job) in jobs.iter() {
            map.entry(&id.as_str(), &job.status());
        }
        map.finish()
    }
}
