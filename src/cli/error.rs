//! CLI error types and conversions

use crate::downloader::{DownloadError, RequestError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Request could not be built from the arguments
    #[error("invalid request: {0}")]
    RequestError(#[from] RequestError),

    /// Download run failed
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),
}
