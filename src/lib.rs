//! # storefront-dl
//!
//! Embeddable automation library for retailer storefront portals: form-based
//! session login, chunked product search, parallel record download, and
//! spreadsheet export.
//!
//! ## Design Philosophy
//!
//! storefront-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Cancellable everywhere** - Long operations run as jobs a UI can
//!   cancel from any thread, keeping whatever partial results landed
//! - **Sensible defaults** - Works against a portal with zero configuration
//!   beyond credentials
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_dl::{Config, ExportTable, SearchWorkflow, StorefrontClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::from_file("config.json")?;
//!     config.portal.credentials_from_env();
//!     config.validate()?;
//!
//!     let client = Arc::new(StorefrontClient::new(
//!         config.portal.clone(),
//!         config.retry.clone(),
//!     )?);
//!     client.login().await?;
//!
//!     let workflow = SearchWorkflow::new(client, config.search.clone());
//!     let search = workflow.search("oats granola 036000291452", None).await?;
//!     let download = workflow.download(search.hits, None).await?;
//!
//!     let table = ExportTable::from_records(download.records.iter())?;
//!     table.write_to_path(&config.export.output_path, config.export.delimiter)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Query tokenization and character-budget chunking
pub mod chunking;
/// Authenticated portal client and the `StorefrontApi` seam
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Spreadsheet export
pub mod export;
/// Cancellable batch jobs, the task runner, and the job registry
pub mod jobs;
/// Typed records mapped from portal JSON
pub mod models;
/// Retry logic with exponential backoff
pub mod retry;
/// Core identifier, status, and progress types
pub mod types;
/// Search/download orchestration
pub mod workflow;

// Re-export commonly used types
pub use client::{StorefrontApi, StorefrontClient};
pub use config::{Config, Delimiter, ExportConfig, PortalConfig, RetryConfig, SearchConfig};
pub use error::{Error, ExportError, JobError, Result, SessionError};
pub use export::{ExportRecord, ExportTable, invoice_rows, order_rows};
pub use jobs::{
    ExecutionMode, Job, JobHandle, JobOptions, JobRegistry, ManagedJob, Outcome, WorkerFailure,
    WorkerFn, worker_fn,
};
pub use models::{
    Invoice, InvoiceLine, InvoiceList, InvoiceSummary, OpenOrder, OpenOrders, OrderLine, Party,
    Pricing, ProductHit, ProductRecord, Promotion, SearchPage, Upc,
};
pub use types::{JobId, JobStatus, Progress};
pub use workflow::{
    DOWNLOAD_JOB_ID, DownloadReport, ProgressFn, SEARCH_JOB_ID, SearchReport, SearchWorkflow,
};
