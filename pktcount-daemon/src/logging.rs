//! Logging initialization for the `pktcount` binary.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `PktcountConfig`. `RUST_LOG` takes precedence over the configured level.

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pktcount_core::config::GeneralConfig;

/// Build the level filter: `RUST_LOG` if set, otherwise the configured level.
pub fn build_filter(log_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level '{log_level}'")),
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called once, before the first log line.
///
/// # Formats
///
/// * `"json"` - one JSON object per line (default)
/// * `"pretty"` - human-readable multi-line output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(&config.log_level)?);

    let result = match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };

    result.with_context(|| {
        format!(
            "failed to initialize {} tracing subscriber",
            config.log_format
        )
    })
}
