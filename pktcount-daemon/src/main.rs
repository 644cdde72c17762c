use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use pktcount_daemon::cli::{self, DaemonCli};
use pktcount_daemon::logging;
use pktcount_daemon::orchestrator::Orchestrator;
use pktcount_daemon::runtime;

fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    let rt = match runtime::build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("pktcount: failed to start async runtime: {e}");
            return ExitCode::from(cli::EXIT_FAILURE);
        }
    };
    let code = rt.block_on(async_main(cli));
    // An abandoned counter read must not hold the process open.
    runtime::shutdown(rt);
    code
}

async fn async_main(cli: DaemonCli) -> ExitCode {
    // Logging is not up yet, so configuration errors go to stderr.
    let config = match cli.load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pktcount: {e}");
            return ExitCode::from(cli::EXIT_CONFIG_ERROR);
        }
    };

    if let Err(e) = logging::init_tracing(&config.general) {
        eprintln!("pktcount: {e:#}");
        return ExitCode::from(cli::EXIT_FAILURE);
    }

    if cli.validate {
        tracing::info!(
            interface = config.counter.interface.as_str(),
            "configuration is valid"
        );
        return ExitCode::SUCCESS;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "pktcount terminated");
            ExitCode::from(cli::failure_exit_code(&e))
        }
    }
}

async fn run(config: pktcount_core::PktcountConfig) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pktcount starting");

    let summary = Orchestrator::build(config)?.run().await?;

    tracing::info!(
        interface = summary.interface.as_str(),
        ticks = summary.ticks,
        successful_reads = summary.successful_reads,
        failed_reads = summary.failed_reads,
        last_total = summary.last_total,
        "pktcount shut down"
    );
    Ok(())
}
