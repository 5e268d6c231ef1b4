//! CLI argument definitions for verdict-relay-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Scan verdict relay daemon.
///
/// Accepts newline-delimited sandbox verdict logs over TCP, filters them by
/// severity and forwards accepted verdicts to a chat channel under a rate limit.
#[derive(Parser, Debug)]
#[command(name = "verdict-relay-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the relay.toml configuration file.
    ///
    /// When omitted, built-in defaults plus `RELAY_*` environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without binding the listener.
    #[arg(long)]
    pub validate: bool,
}
