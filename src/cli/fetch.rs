//! Fetch command implementation

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::render::ProgressRenderer;
use super::CliError;
use crate::downloader::config::{DEFAULT_WAIT_SECS, MAX_ATTEMPTS, REQUEST_TIMEOUT};
use crate::downloader::{
    DownloadController, DownloadError, DownloadExecutor, DownloadSummary, ReportRequest,
    RetryConfig, RunHandle,
};
use crate::fetcher::report_http::{DEFAULT_ACCEPT, DEFAULT_TOKEN_PARAM};
use crate::fetcher::retry_formatter::format_failure;
use crate::fetcher::{HttpSettings, ReportHttpClient};
use crate::output::DirectorySink;
use crate::session::SessionStore;

/// Report Downloader CLI
#[derive(Parser, Debug)]
#[command(name = "report-downloader")]
#[command(about = "Download generated reports, waiting out server backpressure", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Maximum attempts per download, rate-limited ones included (range: 1-10)
    #[arg(long, global = true, default_value_t = MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: u32,

    /// Wait in seconds when the server is busy but sends no Retry-After
    #[arg(long, global = true, default_value_t = DEFAULT_WAIT_SECS)]
    pub default_wait: u64,

    /// Seconds the success confirmation stays up
    #[arg(long, global = true, default_value_t = 2)]
    pub dismiss_after: u64,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = REQUEST_TIMEOUT.as_secs(), value_parser = parse_timeout)]
    pub timeout: u64,

    /// Session file holding the bearer token
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    /// Query parameter that carries the token
    #[arg(long, global = true, default_value = DEFAULT_TOKEN_PARAM)]
    pub token_param: String,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Retry settings from the global flags
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_success_dismiss_delay(Duration::from_secs(self.dismiss_after))
    }

    /// HTTP settings from the global flags and the requested media type
    pub fn http_settings(&self, accept: &str) -> HttpSettings {
        HttpSettings {
            accept: accept.to_string(),
            token_param: self.token_param.clone(),
            default_wait_secs: self.default_wait,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// Parse a request timeout; zero would fail every request
fn parse_timeout(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == 0 {
        return Err("timeout must be at least 1 second".to_string());
    }
    Ok(value)
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one report
    Fetch(FetchArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Fetch command arguments
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Report URL
    #[arg(long)]
    pub url: String,

    /// File name to save the report as
    #[arg(long)]
    pub output: String,

    /// Directory to save into
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Media type requested in the Accept header
    #[arg(long, default_value = DEFAULT_ACCEPT)]
    pub accept: String,

    /// Never offer an interactive retry after a failure
    #[arg(long, default_value_t = false)]
    pub no_prompt: bool,
}

impl FetchArgs {
    /// Wire the HTTP fetcher, session store and save directory into a controller
    pub fn build_controller(&self, cli: &Cli) -> DownloadController {
        let session_path = cli
            .session_file
            .clone()
            .unwrap_or_else(SessionStore::default_path);
        debug!(session = ?session_path, dir = ?self.dir, "Building download controller");

        let fetcher = ReportHttpClient::new(
            Arc::new(SessionStore::new(session_path)),
            Arc::new(DirectorySink::new(self.dir.clone())),
            cli.http_settings(&self.accept),
        );
        let executor = DownloadExecutor::new(Arc::new(fetcher)).with_config(cli.retry_config());
        DownloadController::new(executor)
    }

    /// Execute the fetch on `controller`.
    ///
    /// In human mode a failed run may be retried interactively; each retry
    /// replays the same request through [`DownloadController::retry`].
    pub async fn execute(
        &self,
        cli: &Cli,
        controller: &DownloadController,
    ) -> Result<DownloadSummary, CliError> {
        let request = ReportRequest::new(&self.url, self.output.clone())?;
        let mut handle = controller.start(request.clone());

        loop {
            let result = self.await_run(cli.output_format, controller, handle).await;

            match result {
                Ok(summary) => {
                    self.report_success(cli.output_format, &request, &summary);
                    return Ok(summary);
                }
                Err(DownloadError::Cancelled) => {
                    info!("Download cancelled");
                    return Err(DownloadError::Cancelled.into());
                }
                Err(e) => {
                    self.report_failure(cli.output_format, &request, &e);
                    if self.should_prompt(cli.output_format) && prompt_retry().await {
                        if let Some(next) = controller.retry() {
                            handle = next;
                            continue;
                        }
                    }
                    return Err(e.into());
                }
            }
        }
    }

    async fn await_run(
        &self,
        format: OutputFormat,
        controller: &DownloadController,
        handle: RunHandle,
    ) -> Result<DownloadSummary, DownloadError> {
        match format {
            OutputFormat::Human => {
                let renderer = ProgressRenderer::spawn(controller.subscribe());
                let result = handle.finished().await;
                renderer.finish().await;
                result
            }
            OutputFormat::Json => handle.finished().await,
        }
    }

    fn should_prompt(&self, format: OutputFormat) -> bool {
        format == OutputFormat::Human && !self.no_prompt && std::io::stdin().is_terminal()
    }

    fn report_success(&self, format: OutputFormat, request: &ReportRequest, summary: &DownloadSummary) {
        let path = self.dir.join(request.output_name());
        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "success": true,
                    "url": request.locator().as_str(),
                    "output_path": path.display().to_string(),
                    "bytes": summary.bytes,
                    "attempts": summary.attempts,
                    "error": null,
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                println!("\nReport saved to {}", path.display());
                println!("Size: {} bytes", summary.bytes);
                println!("Attempts: {}", summary.attempts);
            }
        }
    }

    fn report_failure(&self, format: OutputFormat, request: &ReportRequest, error: &DownloadError) {
        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "success": false,
                    "url": request.locator().as_str(),
                    "output_path": self.dir.join(request.output_name()).display().to_string(),
                    "error": error.to_string(),
                    "error_kind": error.label(),
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                if let Some(kind) = error.kind() {
                    eprintln!("\n{}", format_failure(kind, &error.to_string()));
                }
            }
        }
    }
}

/// Ask on stdin whether to retry; anything but `y`/`yes` declines.
async fn prompt_retry() -> bool {
    eprint!("Retry? [y/N] ");
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
        _ => false,
    }
}
