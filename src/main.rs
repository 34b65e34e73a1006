//! Main entry point for the report-downloader CLI

use anyhow::Context;
use clap::Parser;
use report_downloader::cli::{Cli, Commands};
use report_downloader::metrics::init_metrics;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("report_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)
            .await
            .with_context(|| format!("could not serve metrics on {addr}"))?;
    }

    match &cli.command {
        Commands::Fetch(args) => {
            let controller = args.build_controller(&cli);

            tokio::spawn({
                let controller = controller.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Ctrl+C received - cancelling download");
                        controller.close();
                    }
                }
            });

            args.execute(&cli, &controller)
                .await
                .with_context(|| format!("fetch of {} failed", args.url))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
