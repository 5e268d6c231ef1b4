//! verdict-relay daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production, `verdict-relay-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod signals;

use anyhow::Result;
use verdict_relay_core::config::RelayConfig;

use crate::cli::DaemonCli;

/// Build the effective configuration for a daemon invocation.
///
/// Order: config file (or built-in defaults when `--config` is absent),
/// `RELAY_*` environment overrides, CLI log overrides, validation.
pub async fn load_config(cli: &DaemonCli) -> Result<RelayConfig> {
    let mut config = match &cli.config {
        Some(path) => RelayConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => RelayConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}
