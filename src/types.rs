//! Core types for storefront-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a job within a [`crate::jobs::JobRegistry`]
///
/// Callers pick the id per logical operation (the workflow layer uses
/// `"search"` and `"download"`); re-registering an id replaces the previous
/// job.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job status
///
/// A job starts `Pending`, moves to `Running` on `start()`, and ends in
/// exactly one of the three terminal states. Terminal states are absorbing
/// until an explicit `reset()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created but never started
    Pending,
    /// A run is in flight
    Running,
    /// The run completed every item
    Finished,
    /// The run was aborted by an unsuppressed worker failure
    Error,
    /// The run was cancelled (partial output is retained)
    Cancelled,
}

impl JobStatus {
    /// Convert integer status code to JobStatus
    ///
    /// Unknown codes fall back to `Error` so corrupted state surfaces visibly.
    pub fn from_u8(status: u8) -> Self {
        match status {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Finished,
            3 => JobStatus::Error,
            4 => JobStatus::Cancelled,
            _ => JobStatus::Error,
        }
    }

    /// Convert JobStatus to integer status code
    pub fn to_u8(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Finished => 2,
            JobStatus::Error => 3,
            JobStatus::Cancelled => 4,
        }
    }

    /// True for `Finished`, `Error`, and `Cancelled`
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// True if the status is `Pending`
    pub fn is_pending(self) -> bool {
        self == JobStatus::Pending
    }

    /// True if the status is `Running`
    pub fn is_running(self) -> bool {
        self == JobStatus::Running
    }

    /// True if the status is `Finished`
    pub fn is_finished(self) -> bool {
        self == JobStatus::Finished
    }

    /// True if the status is `Error`
    pub fn is_errored(self) -> bool {
        self == JobStatus::Error
    }

    /// True if the status is `Cancelled`
    pub fn is_cancelled(self) -> bool {
        self == JobStatus::Cancelled
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Progress snapshot reported to per-item callbacks
///
/// The workflow layer fills this in after every completed chunk/record so an
/// embedding UI can drive a progress bar. Callbacks run on whatever task is
/// collecting results; marshaling onto a UI thread is the embedder's job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Progress {
    /// Number of input items processed so far
    pub processed: usize,

    /// Total number of input items in the run
    pub total: usize,

    /// Number of matching records found so far
    pub found: usize,

    /// Human-readable status line
    pub message: String,
}
