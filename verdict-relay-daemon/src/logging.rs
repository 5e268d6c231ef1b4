//! Logging initialization for verdict-relay-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section of `RelayConfig`.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use verdict_relay_core::config::GeneralConfig;

/// HTTP client crates log every request at debug level.
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "rustls=warn",
];

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Formats
///
/// * `"json"` - one JSON object per line (default)
/// * `"pretty"` - human-readable multi-line output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        "pretty" => registry.with(fmt::layer().pretty()).try_init(),
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };

    installed.map_err(|e| {
        anyhow::anyhow!(
            "failed to initialize {} tracing subscriber: {}",
            config.log_format,
            e
        )
    })
}

fn default_directives(level: &str) -> String {
    let mut directives = vec![level];
    directives.extend_from_slice(QUIET_DEPENDENCIES);
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn default_directives_quiet_http_client() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
