//! Observability metrics for report downloads
//!
//! Tracks attempts by outcome, 429 responses, backoff waits and run results.
//!
//! ## Architecture
//!
//! - Uses the `metrics` facade, so recording is a no-op until a recorder is
//!   installed
//! - Optional Prometheus exporter for a scrape endpoint (`--metrics-addr`)

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
#[error("failed to install Prometheus exporter: {0}")]
pub struct MetricsError(String);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored once a recorder is installed.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError(e.to_string()))?;

    describe_counter!(
        "report_requests_total",
        Unit::Count,
        "Report download attempts by outcome"
    );
    describe_counter!(
        "report_429_total",
        Unit::Count,
        "Rate-limited responses received"
    );
    describe_counter!(
        "report_retries_total",
        Unit::Count,
        "Backoff waits started before another attempt"
    );
    describe_histogram!(
        "report_request_duration_seconds",
        Unit::Seconds,
        "Duration of a single attempt"
    );
    describe_histogram!(
        "report_backoff_seconds",
        Unit::Seconds,
        "Server-requested wait durations"
    );
    describe_counter!(
        "report_downloads_completed_total",
        Unit::Count,
        "Runs ending in a saved report"
    );
    describe_counter!(
        "report_downloads_failed_total",
        Unit::Count,
        "Runs ending in a user-visible error"
    );

    *initialized = true;
    info!("Metrics system initialized on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one attempt
pub struct HttpRequestMetrics {
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start recording an attempt
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
            correlation_id: generate_correlation_id(),
        }
    }

    /// Record the classified outcome, with the HTTP status when one arrived
    pub fn record_outcome(&self, outcome: &'static str, status: Option<u16>) {
        let duration = self.start_time.elapsed();

        counter!("report_requests_total", "outcome" => outcome).increment(1);
        histogram!("report_request_duration_seconds").record(duration.as_secs_f64());

        if status == Some(429) {
            counter!("report_429_total").increment(1);
        }

        debug!(
            correlation_id = %self.correlation_id,
            outcome = outcome,
            status = status,
            duration_ms = duration.as_millis() as u64,
            "Attempt completed"
        );
    }

    /// Correlation ID for this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a server-requested wait
pub fn record_retry_backoff(wait: Duration, attempt: u32) {
    counter!("report_retries_total").increment(1);
    histogram!("report_backoff_seconds").record(wait.as_secs_f64());
    debug!(
        attempt = attempt,
        backoff_secs = wait.as_secs(),
        "Retry backoff recorded"
    );
}

/// Run-level metrics
pub struct DownloadMetrics {
    output_name: String,
    start_time: Instant,
}

impl DownloadMetrics {
    /// Start tracking a run
    pub fn start(output_name: impl Into<String>) -> Self {
        Self {
            output_name: output_name.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a saved report
    pub fn record_success(&self, bytes: usize, attempts: u32) {
        counter!("report_downloads_completed_total").increment(1);
        info!(
            output = %self.output_name,
            bytes = bytes,
            attempts = attempts,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Report download completed"
        );
    }

    /// Record a user-visible failure
    pub fn record_failure(&self, kind: &'static str) {
        counter!("report_downloads_failed_total", "kind" => kind).increment(1);
        warn!(
            output = %self.output_name,
            kind = kind,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Report download failed"
        );
    }
}
