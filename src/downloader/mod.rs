//! Download orchestration
//!
//! This module turns single report fetch attempts into a bounded, observable
//! run that honours the server's "try again later" signal.
//!
//! # Overview
//!
//! 1. **Request**: describe what to fetch with [`job::ReportRequest`]
//! 2. **Execution**: [`executor::DownloadExecutor`] runs up to
//!    `max_attempts` attempts, waiting out each 429 with a
//!    [`countdown::Countdown`]
//! 3. **Presentation**: [`controller::DownloadController`] maps the run onto
//!    a [`progress::ProgressState`] that a UI renders
//!
//! # Quick Start
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
//! let request = ReportRequest::new("https://reports.example.com/sales/2024-q3", "sales.pdf")?;
//! let summary = controller.start(request).finished().await?;
//! println!("saved {} bytes", summary.bytes);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Runs end in [`DownloadError`]:
//! - Auth, server, network and save errors are not retried
//! - Rate limiting is retried and only surfaces as [`DownloadError::Exhausted`]
//! - A panic inside a run surfaces as [`DownloadError::Internal`]
//! - [`DownloadError::Cancelled`] means the run was closed or superseded

pub mod config;
pub mod controller;
pub mod countdown;
pub mod executor;
pub mod job;
pub mod progress;

pub use config::RetryConfig;
pub use controller::{DownloadController, RunHandle};
pub use countdown::Countdown;
pub use executor::{DownloadExecutor, DownloadSummary, RetryObserver};
pub use job::{ReportRequest, RequestError};
pub use progress::{ProgressState, ProgressView};

use crate::fetcher::retry_formatter::FailureKind;

/// Terminal failure of a download run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// Credential rejected
    #[error("{0}")]
    AuthError(String),

    /// Server answered with an error
    #[error("{0}")]
    ServerError(String),

    /// No response obtained
    #[error("{0}")]
    NetworkError(String),

    /// Report fetched but not persisted
    #[error("{0}")]
    SaveError(String),

    /// Every attempt was rate limited
    #[error("The server is busy. Please try again later.")]
    Exhausted {
        /// Attempts issued before giving up
        attempts: u32,
    },

    /// The run aborted on a panic
    #[error("Something went wrong while downloading the report.")]
    Internal,

    /// Run stopped by close or by a newer start
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// User-facing failure classification; `None` for cancellation, which is
    /// never shown as an error.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::AuthError(_) => Some(FailureKind::SessionExpired),
            Self::ServerError(_) => Some(FailureKind::ServerError),
            Self::NetworkError(_) => Some(FailureKind::NetworkError),
            Self::SaveError(_) => Some(FailureKind::SaveFailed),
            Self::Exhausted { .. } => Some(FailureKind::ServerBusy),
            Self::Internal => Some(FailureKind::Internal),
            Self::Cancelled => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuthError(_) => "auth_error",
            Self::ServerError(_) => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::SaveError(_) => "save_failed",
            Self::Exhausted { .. } => "server_busy",
            Self::Internal => "internal_error",
            Self::Cancelled => "cancelled",
        }
    }
}
