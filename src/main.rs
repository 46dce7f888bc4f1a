//! Main entry point for the youtube-data-collector CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use youtube_data_collector::cli::{Cli, Commands};
use youtube_data_collector::shutdown::ShutdownCoordinator;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("youtube_data_collector=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C asks the run to halt at its next safe boundary
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing current page and saving progress...");
                shutdown.request_halt();
            }
        }
    });

    let result = match cli.command {
        Commands::Collect(ref args) => args
            .execute(shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Sources(ref sources_cmd) => {
            sources_cmd.execute().await.map_err(|e| anyhow::anyhow!(e))
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
