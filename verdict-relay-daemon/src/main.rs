use anyhow::{Context, Result};
use clap::Parser;

use verdict_relay_core::error::RelayError;
use verdict_relay_daemon::cli::DaemonCli;
use verdict_relay_daemon::signals::{ShutdownSignals, spawn_signal_forwarder};
use verdict_relay_daemon::{load_config, logging, metrics_server};
use verdict_relay_pipeline::{RelayServerBuilder, ShutdownOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "verdict-relay-daemon starting");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    // 바인드 전에 설치
    let signals = ShutdownSignals::install()
        .map_err(|e| anyhow::anyhow!("failed to install signal handlers: {}", e))?;

    let server = RelayServerBuilder::new()
        .config(config)
        .bind()
        .await
        .map_err(RelayError::from)
        .context("failed to start relay")?;

    let forwarder = spawn_signal_forwarder(signals, server.shutdown_handle());

    match server.run().await.map_err(RelayError::from)? {
        ShutdownOutcome::Completed { undelivered } => {
            tracing::info!(undelivered, "verdict-relay-daemon shut down");
        }
        ShutdownOutcome::AlreadyTriggered => {
            tracing::debug!("shutdown already performed");
        }
    }

    if let Err(e) = forwarder.await {
        tracing::error!(error = %e, "signal forwarder task failed");
    }
    Ok(())
}
