//! OS signal handling.
//!
//! On Unix, SIGINT and SIGTERM are handled. On other platforms only
//! [`tokio::signal::ctrl_c`] is awaited.
//!
//! Handlers are installed once and stay installed, so a second signal arriving
//! while the relay is draining is observed (and ignored) instead of killing the process.

use tokio::task::JoinHandle;
use tracing::info;

use verdict_relay_pipeline::ShutdownHandle;

/// Installed termination signal handlers.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Install SIGINT and SIGTERM handlers.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

/// Installed termination signal handlers.
#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    /// Install the ctrl-c handler.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Wait for the next ctrl-c and return its name.
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        "CTRL_C"
    }
}

/// Forward every received signal to `handle` until the relay has stopped.
///
/// Repeated signals are harmless: [`ShutdownHandle::request`] is idempotent.
pub fn spawn_signal_forwarder(
    mut signals: ShutdownSignals,
    handle: ShutdownHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                signal = signals.recv() => {
                    info!(signal, "shutdown signal received");
                    handle.request();
                }
                _ = handle.wait_stopped() => break,
            }
        }
    })
}
