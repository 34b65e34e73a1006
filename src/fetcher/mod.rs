//! Single-attempt report fetching and outcome classification

use crate::downloader::ReportRequest;
use async_trait::async_trait;
use bytes::Bytes;

pub mod report_http;
pub mod retry_formatter;

pub use report_http::{HttpSettings, ReportHttpClient};

/// Classified result of exactly one download attempt.
///
/// Only [`DownloadOutcome::RateLimited`] is retried; every other variant ends
/// the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Report fetched and handed to the local save
    Success {
        /// Raw report bytes
        payload: Bytes,
    },
    /// Server asked us to come back later
    RateLimited {
        /// Seconds to wait before the next attempt
        wait_secs: u64,
    },
    /// Credential rejected (401/403)
    AuthError {
        /// User-facing message
        message: String,
    },
    /// Any other non-success status
    ServerError {
        /// Message from the error body, or a generic one
        message: String,
    },
    /// No response obtained
    NetworkError {
        /// User-facing message
        message: String,
    },
    /// Report fetched but could not be saved locally
    SaveFailed {
        /// User-facing message
        message: String,
    },
}

impl DownloadOutcome {
    /// Whether this outcome ends the retry loop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::RateLimited { .. })
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthError { .. } => "auth_error",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError { .. } => "network_error",
            Self::SaveFailed { .. } => "save_failed",
        }
    }
}

/// Transport primitive: issue one request and classify what came back.
///
/// Implementations must perform exactly one network call and must not retry.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Fetch the report described by `request` once.
    async fn attempt(&self, request: &ReportRequest) -> DownloadOutcome;
}
