// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use country_service::{App, ServiceConfig};

#[derive(Parser)]
#[command(name = "country-service")]
#[command(version)]
#[command(about = "Country reference data service with cached reads and scheduled ingestion")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (TOML). Missing file means defaults.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve HTTP and run scheduled ingestion (default)
    Serve {
        /// Do not start the ingestion scheduler
        #[arg(long)]
        no_ingest: bool,
    },
    /// Run one ingestion pass and exit
    Ingest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("country_service={},tower_http={}", cli.log_level, cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting country-service v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load(Some(&cli.config))
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let app = App::build(config).await.context("starting up")?;

    match cli.command.unwrap_or(Command::Serve { no_ingest: false }) {
        Command::Ingest => {
            let report = app.pipeline.run_once().await.context("ingestion run failed")?;
            info!(new = report.new, updated = report.updated, unchanged = report.unchanged, "Done");
        }
        Command::Serve { no_ingest } => serve(app, no_ingest).await?,
    }
    Ok(())
}

async fn serve(app: App, no_ingest: bool) -> Result<()> {
    let addr = app.config.socket_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if no_ingest {
        info!("Ingestion scheduler disabled");
        None
    } else {
        let scheduler = app.scheduler();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move { scheduler.run(rx).await }))
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive; dropping it would stop the server
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });

    country_service::web::serve(addr, app.state(), shutdown_rx)
        .await
        .context("HTTP server failed")?;

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(error = %e, "Ingestion scheduler task ended abnormally");
        }
    }
    info!("Shutdown complete");
    Ok(())
}
