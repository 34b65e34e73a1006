//! Bounded retry loop over single report fetch attempts
//!
//! Only rate-limited attempts are retried. Each one before the last is
//! followed by a countdown of the server-provided wait; a rate-limited final
//! attempt ends the run with [`DownloadError::Exhausted`] straight away.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::RetryConfig;
use super::countdown::Countdown;
use super::{DownloadError, ReportRequest};
use crate::fetcher::retry_formatter::RetryContext;
use crate::fetcher::{DownloadOutcome, ReportFetcher};
use crate::metrics::{record_retry_backoff, DownloadMetrics};

/// Receives progress notifications from a run.
pub trait RetryObserver: Send {
    /// An attempt was rate limited; a wait of `wait_secs` starts now.
    fn on_queued(&mut self, wait_secs: u64, attempt: u32, max_attempts: u32);

    /// One countdown tick, from `wait_secs` down to `0`.
    fn on_tick(&mut self, seconds_left: u64);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_queued(&mut self, _wait_secs: u64, _attempt: u32, _max_attempts: u32) {}

    fn on_tick(&mut self, _seconds_left: u64) {}
}

/// Result of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Size of the saved report
    pub bytes: usize,
    /// Attempts it took
    pub attempts: u32,
}

/// Runs the bounded retry loop
pub struct DownloadExecutor {
    fetcher: Arc<dyn ReportFetcher>,
    config: RetryConfig,
    countdown: Countdown,
}

impl DownloadExecutor {
    /// Create an executor with default configuration
    pub fn new(fetcher: Arc<dyn ReportFetcher>) -> Self {
        let config = RetryConfig::default();
        Self {
            fetcher,
            countdown: Countdown::new(config.tick_period),
            config,
        }
    }

    /// Replace the retry configuration
    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.countdown = Countdown::new(config.tick_period);
        self.config = config;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run attempts until a terminal outcome, exhaustion or cancellation.
    ///
    /// `observer` sees `on_queued` for every rate-limited attempt that will be
    /// retried, followed by one `on_tick` per second of the wait, including the
    /// final `0`.
    pub async fn execute(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
        observer: &mut dyn RetryObserver,
    ) -> Result<DownloadSummary, DownloadError> {
        let metrics = DownloadMetrics::start(request.output_name());
        let mut ctx = RetryContext::new(self.config.max_attempts);

        let error = loop {
            debug!(attempt = ctx.attempt, max_attempts = ctx.max_attempts, "Issuing attempt");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt = ctx.attempt, "Run cancelled during request");
                    return Err(DownloadError::Cancelled);
                }
                outcome = self.fetcher.attempt(request) => outcome,
            };

            let error = match outcome {
                DownloadOutcome::Success { payload } => {
                    if ctx.attempt > 1 {
                        info!("{}", ctx.format_success());
                    }
                    metrics.record_success(payload.len(), ctx.attempt);
                    return Ok(DownloadSummary {
                        bytes: payload.len(),
                        attempts: ctx.attempt,
                    });
                }
                DownloadOutcome::RateLimited { wait_secs } => {
                    info!("{}", ctx.format_retry(wait_secs));
                    let Some(next) = ctx.next() else {
                        break DownloadError::Exhausted {
                            attempts: ctx.attempt,
                        };
                    };

                    record_retry_backoff(Duration::from_secs(wait_secs), ctx.attempt);
                    observer.on_queued(wait_secs, ctx.attempt, ctx.max_attempts);

                    if self
                        .countdown
                        .wait(wait_secs, cancel, |left| observer.on_tick(left))
                        .await
                        .is_err()
                    {
                        info!(attempt = ctx.attempt, "Run cancelled during backoff");
                        return Err(DownloadError::Cancelled);
                    }

                    ctx = next;
                    continue;
                }
                DownloadOutcome::AuthError { message } => DownloadError::AuthError(message),
                DownloadOutcome::ServerError { message } => DownloadError::ServerError(message),
                DownloadOutcome::NetworkError { message } => DownloadError::NetworkError(message),
                DownloadOutcome::SaveFailed { message } => DownloadError::SaveError(message),
            };
            break error;
        };

        warn!(attempt = ctx.attempt, error = %error, "Run ended without a report");
        metrics.record_failure(error.label());
        Err(error)
    }
}
