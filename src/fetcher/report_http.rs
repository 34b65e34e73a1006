//! HTTP implementation of a single report download attempt
//!
//! One GET per call, classified by status code:
//! - 2xx: body saved through the [`ArtifactSink`]
//! - 429: wait hint from `Retry-After`
//! - 401/403: session expired
//! - other non-2xx: message from the JSON error body
//! - no response: network error

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::retry_formatter::{
    GENERIC_SERVER_MESSAGE, NETWORK_ERROR_MESSAGE, SESSION_EXPIRED_MESSAGE,
};
use super::{DownloadOutcome, ReportFetcher};
use crate::downloader::config::{DEFAULT_WAIT_SECS, REQUEST_TIMEOUT};
use crate::downloader::ReportRequest;
use crate::metrics::HttpRequestMetrics;
use crate::output::ArtifactSink;
use crate::session::TokenSource;

/// Default `Accept` header for report documents
pub const DEFAULT_ACCEPT: &str = "application/pdf";

/// Default query parameter carrying the credential
pub const DEFAULT_TOKEN_PARAM: &str = "token";

/// Request-level settings for [`ReportHttpClient`]
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Media type announced in `Accept`
    pub accept: String,
    /// Query parameter name for the bearer token
    pub token_param: String,
    /// Wait used when a 429 carries no usable hint
    pub default_wait_secs: u64,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            accept: DEFAULT_ACCEPT.to_string(),
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            default_wait_secs: DEFAULT_WAIT_SECS,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 429
    RateLimited,
    /// 401 or 403
    Unauthorized,
    /// Anything else
    Failure,
}

/// Classify a response status.
pub fn classify_status(status: StatusCode) -> StatusClass {
    match status.as_u16() {
        429 => StatusClass::RateLimited,
        401 | 403 => StatusClass::Unauthorized,
        _ if status.is_success() => StatusClass::Success,
        _ => StatusClass::Failure,
    }
}

/// Read `Retry-After` as whole seconds.
///
/// Returns `None` when the header is missing or not a non-negative integer.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(e) => {
            warn!("Ignoring unparseable Retry-After '{}': {}", raw, e);
            None
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Looks at `message`, then `detail`, then `error`; only string values count.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| value.get(key)?.as_str())
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// Report fetcher over HTTP
pub struct ReportHttpClient {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    sink: Arc<dyn ArtifactSink>,
    settings: HttpSettings,
}

impl ReportHttpClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `tokens` - Credential source, read on every attempt
    /// * `sink` - Where successful payloads are saved
    /// * `settings` - Accept type, token parameter, timeouts
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        sink: Arc<dyn ArtifactSink>,
        settings: HttpSettings,
    ) -> Self {
        // Fall back to reqwest defaults if builder creation fails for any reason.
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, tokens, sink, settings)
    }

    /// Create a client around an existing [`reqwest::Client`].
    pub fn with_client(
        client: Client,
        tokens: Arc<dyn TokenSource>,
        sink: Arc<dyn ArtifactSink>,
        settings: HttpSettings,
    ) -> Self {
        Self {
            client,
            tokens,
            sink,
            settings,
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Locator with the current credential appended to its query string.
    fn authorized_url(&self, locator: &Url) -> Url {
        let mut url = locator.clone();
        match self.tokens.bearer_token() {
            Some(token) => {
                url.query_pairs_mut()
                    .append_pair(&self.settings.token_param, &token);
            }
            None => warn!("No session token available, requesting without credential"),
        }
        url
    }
}

#[async_trait]
impl ReportFetcher for ReportHttpClient {
    async fn attempt(&self, request: &ReportRequest) -> DownloadOutcome {
        let url = self.authorized_url(request.locator());
        let metrics = HttpRequestMetrics::start();
        debug!(
            correlation_id = metrics.correlation_id(),
            locator = %request.locator(),
            "Requesting report"
        );

        let response = match self
            .client
            .get(url)
            .header(ACCEPT, &self.settings.accept)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                // reqwest embeds the request URL, which carries the token
                let e = e.without_url();
                warn!(
                    error = %e,
                    locator = %request.locator(),
                    timeout = e.is_timeout(),
                    "Network error requesting report"
                );
                metrics.record_outcome("network_error", None);
                return DownloadOutcome::NetworkError {
                    message: NETWORK_ERROR_MESSAGE.to_string(),
                };
            }
        };

        let status = response.status();
        let outcome = match classify_status(status) {
            StatusClass::RateLimited => {
                let hint = parse_retry_after(response.headers());
                let wait_secs = hint.unwrap_or(self.settings.default_wait_secs);
                info!(wait_secs, hinted = hint.is_some(), "Server busy (429)");
                DownloadOutcome::RateLimited { wait_secs }
            }
            StatusClass::Unauthorized => {
                warn!(status = status.as_u16(), "Report request rejected as unauthorized");
                DownloadOutcome::AuthError {
                    message: SESSION_EXPIRED_MESSAGE.to_string(),
                }
            }
            StatusClass::Failure => {
                let body = response.bytes().await.unwrap_or_default();
                let message = extract_error_message(&body)
                    .unwrap_or_else(|| GENERIC_SERVER_MESSAGE.to_string());
                warn!(status = status.as_u16(), message = %message, "Report request failed");
                DownloadOutcome::ServerError { message }
            }
            StatusClass::Success => match response.bytes().await {
                Ok(payload) => match self.sink.save(request.output_name(), &payload) {
                    Ok(path) => {
                        info!(path = ?path, bytes = payload.len(), "Report saved");
                        DownloadOutcome::Success { payload }
                    }
                    Err(e) => {
                        warn!(error = %e, "Report fetched but could not be saved");
                        DownloadOutcome::SaveFailed {
                            message: format!("The report was downloaded but could not be saved: {e}"),
                        }
                    }
                },
                Err(e) => {
                    let e = e.without_url();
                    warn!(
                        error = %e,
                        locator = %request.locator(),
                        "Connection lost while reading report body"
                    );
                    DownloadOutcome::NetworkError {
                        message: NETWORK_ERROR_MESSAGE.to_string(),
                    }
                }
            },
        };

        metrics.record_outcome(outcome.label(), Some(status.as_u16()));
        outcome
    }
}
