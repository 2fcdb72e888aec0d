//! Main entry point for the airtable-kit CLI

use airtable_kit::cli::{whoami, Cli, Commands};
use airtable_kit::metrics;
use airtable_kit::shutdown::{self, ShutdownSignal};
use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("airtable_kit=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr).context("starting metrics exporter")?;
    }

    let api = cli.connect()?;

    // Listings check this between pages
    let shutdown = ShutdownSignal::shared();
    shutdown::spawn_ctrl_c_handler(shutdown.clone());

    match &cli.command {
        Commands::Whoami => whoami::execute(&api, cli.output_format).await?,
        Commands::Records(cmd) => cmd.execute(&api, cli.output_format, shutdown).await?,
        Commands::Comments(cmd) => cmd.execute(&api, cli.output_format).await?,
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
