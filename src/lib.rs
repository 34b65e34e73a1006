//! # Report Downloader Library
//!
//! A client for downloading server-generated report documents from a backend
//! that may answer "busy, try again in N seconds" (HTTP 429) while it is
//! generating. Busy answers are waited out with a visible countdown and a
//! bounded number of attempts instead of failing outright.
//!
//! ## Features
//!
//! - **Server-driven backoff**: honours `Retry-After`, falls back to a default wait
//! - **Bounded retries**: at most `max_attempts` attempts per run
//! - **Observable state**: `Idle → Downloading → Queued → Success | Error`
//!   published on `tokio::sync::watch` and `broadcast` channels
//! - **Cancellation**: closing or restarting halts any in-flight run
//! - **Atomic saves**: reports land under their final name only once complete
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use report_downloader::downloader::{DownloadController, DownloadExecutor, ReportRequest};
//! use report_downloader::fetcher::{HttpSettings, ReportHttpClient};
//! use report_downloader::output::DirectorySink;
//! use report_downloader::session::SessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = ReportHttpClient::new(
//!     Arc::new(SessionStore::new(SessionStore::default_path())),
//!     Arc::new(DirectorySink::new("./reports")),
//!     HttpSettings::default(),
//! );
//! let controller = DownloadController::new(DownloadExecutor::new(Arc::new(fetcher)));
//!
//! let mut states = controller.subscribe();
//! let handle = controller.start(ReportRequest::new(
//!     "https://reports.example.com/invoices/2024-06",
//!     "invoice-2024-06.pdf",
//! )?);
//! tokio::spawn(async move {
//!     while states.changed().await.is_ok() {
//!         println!("{:?}", *states.borrow());
//!     }
//! });
//! handle.finished().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - One HTTP attempt, classified into a [`fetcher::DownloadOutcome`]
//! - [`downloader`] - Retry loop, countdown, progress state and controller
//! - [`session`] - Persisted bearer token
//! - [`output`] - Saving the downloaded report
//! - [`metrics`] - Prometheus metrics
//! - [`cli`] - Command-line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod downloader;
pub mod fetcher;
pub mod metrics;
pub mod output;
pub mod session;

pub use downloader::{
    DownloadController, DownloadError, ProgressState, ProgressView, ReportRequest, RetryConfig,
};
pub use fetcher::{DownloadOutcome, ReportFetcher};
