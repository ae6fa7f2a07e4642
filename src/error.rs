//! Error types for storefront-dl
//!
//! This module provides the error handling for the library:
//! - Domain-specific sub-errors (job lifecycle, portal session, export)
//! - `#[from]` conversions for the underlying HTTP/serde/io failures
//! - A crate-wide [`Result`] alias

use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Result type alias for storefront-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for storefront-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "portal.base_url")
        key: Option<String>,
    },

    /// Job lifecycle error (cancellation, double start, lookup miss, worker failure)
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Portal session error (login, authentication, unexpected payloads)
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Export error (table building, output writing)
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Portal returned a non-success HTTP status
    #[error("portal returned {status} for {endpoint}")]
    Portal {
        /// HTTP status code returned by the portal
        status: u16,
        /// The endpoint that produced the status
        endpoint: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Job lifecycle errors
///
/// Cancellation is deliberately an error *variant* rather than a panic or a
/// silent return: a cancelled run is a first-class outcome the caller is
/// expected to branch on, and the variant carries the job id so partial
/// results can be looked up afterwards.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job was cancelled before or during a run
    #[error("job {id} cancelled")]
    Cancelled {
        /// The cancelled job's id
        id: JobId,
    },

    /// `start()` was called while the job was already running
    #[error("job {id} is already running")]
    AlreadyRunning {
        /// The running job's id
        id: JobId,
    },

    /// `start()` was called on a job that already reached a terminal state
    #[error("job {id} already ended with status {status}; reset it before starting again")]
    AlreadyEnded {
        /// The ended job's id
        id: JobId,
        /// The terminal status the job ended with
        status: JobStatus,
    },

    /// Registry lookup for an unknown job id
    #[error("job {id} not found")]
    NotFound {
        /// The id that was looked up
        id: JobId,
    },

    /// A worker invocation failed on a specific input
    #[error("worker for job {id} failed on input {input}: {message}")]
    Worker {
        /// The owning job's id
        id: JobId,
        /// Debug rendering of the input that produced the failure
        input: String,
        /// Message of the underlying error
        message: String,
    },
}

/// Portal session errors (login and authentication)
#[derive(Debug, Error)]
pub enum SessionError {
    /// The portal rejected the supplied username/password
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The auth redirect landed somewhere other than the expected login page
    #[error("login redirect landed on {actual}, expected {expected}")]
    BadLoginRedirect {
        /// The login page URL the redirect should have reached
        expected: String,
        /// The URL the redirect actually reached
        actual: String,
    },

    /// The login page contained no recognizable form
    #[error("login form not found on {url}")]
    LoginFormNotFound {
        /// The page that was fetched
        url: String,
    },

    /// A request requiring an authenticated session was made without one
    #[error("session is not authenticated; call login() first")]
    NotAuthenticated,

    /// The portal answered with a payload the client could not interpret
    #[error("unexpected response from {endpoint}: {detail}")]
    UnexpectedResponse {
        /// The endpoint that produced the payload
        endpoint: String,
        /// What was wrong with it
        detail: String,
    },
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// An export was requested for an empty record set
    #[error("nothing to export: no records were supplied")]
    NoRecords,

    /// Writing the output file failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// The output path
        path: std::path::PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },
}
