//! CLI argument definitions for the `pktcount` binary.
//!
//! Flags override values from the config file and environment variables.

use std::path::PathBuf;

use clap::Parser;

use pktcount_core::config::PktcountConfig;
use pktcount_core::error::PktcountError;

/// Exit status for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Exit status for any other fatal error.
pub const EXIT_FAILURE: u8 = 1;

/// XDP packet counter.
///
/// Attaches a counting program to a network interface, logs the total
/// packet count every poll interval, and detaches on SIGINT/SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "pktcount")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to a pktcount.toml configuration file.
    ///
    /// Without it, built-in defaults and environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Network interface to attach to (default: enp0s3, or $IFACE).
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Poll interval in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Path to the compiled eBPF object.
    #[arg(long)]
    pub object: Option<PathBuf>,

    /// XDP attach mode (default, skb, native, hw).
    #[arg(long)]
    pub xdp_mode: Option<String>,

    /// Log each CPU's contribution on every tick.
    #[arg(long)]
    pub per_cpu: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without attaching.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// When the poll interval is shortened below the configured read timeout,
    /// the timeout is shrunk to half the interval so the pair stays valid.
    pub fn apply_overrides(&self, config: &mut PktcountConfig) {
        if let Some(interface) = &self.interface {
            config.counter.interface.clone_from(interface);
        }
        if let Some(interval_ms) = self.interval_ms {
            config.counter.poll_interval_ms = interval_ms;
            if config.counter.read_timeout_ms >= interval_ms {
                config.counter.read_timeout_ms = (interval_ms / 2).max(1);
            }
        }
        if let Some(object) = &self.object {
            config.counter.object_path = object.display().to_string();
        }
        if let Some(mode) = &self.xdp_mode {
            config.counter.xdp_mode.clone_from(mode);
        }
        if self.per_cpu {
            config.counter.per_cpu_detail = true;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }

    /// Load the configuration file (if any), apply environment and CLI
    /// overrides, then validate the result.
    pub async fn load_config(&self) -> Result<PktcountConfig, PktcountError> {
        let mut config = match &self.config {
            Some(path) => PktcountConfig::from_file(path).await?,
            None => PktcountConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Map a fatal error to the process exit status.
pub fn failure_exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PktcountError>() {
        Some(PktcountError::Config(_)) => EXIT_CONFIG_ERROR,
        _ => EXIT_FAILURE,
    }
}
