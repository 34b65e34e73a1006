//! Report download request (the controller's remembered `LastRequest`).

use reqwest::Url;
use std::fmt;

/// Request validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Locator is not an absolute http(s) URL
    #[error("invalid report locator: {0}")]
    InvalidLocator(String),

    /// Output name is empty
    #[error("output name cannot be empty")]
    EmptyOutputName,
}

/// One report download: where to fetch it and what to call it locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    locator: Url,
    output_name: String,
}

impl ReportRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the locator is not an absolute `http`/`https` URL or
    /// the output name is empty.
    pub fn new(locator: &str, output_name: impl Into<String>) -> Result<Self, RequestError> {
        let locator = Url::parse(locator.trim())
            .map_err(|e| RequestError::InvalidLocator(format!("{locator}: {e}")))?;
        if !matches!(locator.scheme(), "http" | "https") {
            return Err(RequestError::InvalidLocator(format!(
                "unsupported scheme '{}'",
                locator.scheme()
            )));
        }

        let output_name = output_name.into();
        if output_name.is_empty() {
            return Err(RequestError::EmptyOutputName);
        }

        Ok(Self {
            locator,
            output_name,
        })
    }

    /// Resource locator
    pub fn locator(&self) -> &Url {
        &self.locator
    }

    /// Suggested local file name, used verbatim
    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl fmt::Display for ReportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.locator, self.output_name)
    }
}
