//! Process orchestration -- session startup, signal wiring, shutdown.
//!
//! The [`Orchestrator`] owns the validated configuration and the counter
//! backend. `run()` performs the full lifecycle:
//!
//! 1. Spawn the SIGINT/SIGTERM listener (it cancels the shutdown token)
//! 2. Open the counter session on the blocking pool (memlock, resolve, load, attach)
//! 3. Poll until the token is cancelled
//! 4. Detach and release (the session is torn down on every exit path)
//!
//! A signal that arrives during startup is honored right after attach.

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pktcount_core::config::PktcountConfig;
use pktcount_core::event::TickReport;
use pktcount_core::pipeline::CounterBackend;
use pktcount_ebpf_engine::{AyaBackend, CounterEngine, CounterSession, EngineConfig, RunSummary};

use crate::metrics_server;

/// Top-level process context.
pub struct Orchestrator<B: CounterBackend> {
    /// Loaded and validated configuration.
    config: PktcountConfig,
    /// Engine settings derived from `config.counter`.
    engine_config: EngineConfig,
    /// Loader and process boundary.
    backend: B,
    /// Cancelled by the signal listener (or by tests).
    shutdown: CancellationToken,
    /// Optional consumer of per-tick reports.
    report_tx: Option<mpsc::Sender<TickReport>>,
}

impl Orchestrator<AyaBackend> {
    /// Build the production orchestrator backed by aya.
    ///
    /// Also installs the Prometheus recorder when `[metrics]` is enabled.
    pub fn build(config: PktcountConfig) -> Result<Self> {
        let engine_config = EngineConfig::from_core(&config.counter)?;
        let backend = AyaBackend::new(engine_config.object_path.clone(), engine_config.xdp_mode);
        let orchestrator = Self::with_backend(config, backend)?;

        if orchestrator.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&orchestrator.config.metrics)?;
        }
        Ok(orchestrator)
    }
}

impl<B: CounterBackend + 'static> Orchestrator<B> {
    /// Build with an explicit backend.
    ///
    /// # Errors
    ///
    /// Returns a `PktcountError::Config` if the configuration is invalid.
    pub fn with_backend(config: PktcountConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let engine_config = EngineConfig::from_core(&config.counter)?;

        tracing::debug!(
            backend = backend.name(),
            interface = engine_config.interface.as_str(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            engine_config,
            backend,
            shutdown: CancellationToken::new(),
            report_tx: None,
        })
    }

    /// Forward every tick report to `tx` (dropped when the channel is full).
    pub fn report_sender(mut self, tx: mpsc::Sender<TickReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    /// Token that stops the run loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Loaded configuration.
    pub fn config(&self) -> &PktcountConfig {
        &self.config
    }

    /// Attach, poll until shutdown, then detach and release.
    ///
    /// Startup failures are returned after everything acquired so far has
    /// been released. Nothing is left attached on any error path.
    pub async fn run(self) -> Result<RunSummary> {
        let listener = spawn_signal_listener(self.shutdown.clone());
        let result = self.run_session().await;
        listener.abort();
        result
    }

    async fn run_session(self) -> Result<RunSummary> {
        let interface = self.engine_config.interface.clone();
        tracing::info!(
            interface = interface.as_str(),
            xdp_mode = self.engine_config.xdp_mode.as_str(),
            object = %self.engine_config.object_path.display(),
            "starting packet counter"
        );

        let mut builder = CounterEngine::builder()
            .config(self.engine_config)
            .cancel_token(self.shutdown);
        if let Some(tx) = self.report_tx {
            builder = builder.report_sender(tx);
        }
        let engine = builder.build()?;

        // memlock, interface lookup, ELF load and the verifier all block
        let backend = self.backend;
        let session =
            tokio::task::spawn_blocking(move || CounterSession::open(backend, &interface))
                .await
                .map_err(|e| anyhow::anyhow!("counter session startup task failed: {e}"))??;
        Ok(engine.run(session).await?)
    }
}

/// Spawn a task that cancels `token` on SIGINT or SIGTERM.
fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            signal = wait_for_shutdown_signal() => match signal {
                Ok(name) => {
                    tracing::info!(signal = name, "shutdown signal received");
                    token.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install signal handlers");
                }
            },
        }
    })
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL_C")
}
