#![forbid(unsafe_code)]

//! `camelot-bridge`: Platform ⇄ Camelot line relay binary.
//!
//! Loads configuration, opens the run's log file, starts the relay, and
//! waits for shutdown: either a link escalating a terminal failure or
//! Ctrl-C / SIGTERM.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use camelot_bridge::logging::{self, LogFormat};
use camelot_bridge::{AppError, Relay, RelayConfig, Result, ShutdownCoordinator, ShutdownReason};

#[derive(Debug, Parser)]
#[command(
    name = "camelot-bridge",
    about = "Platform ⇄ Camelot line relay",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the directory log files are written to.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Override the Camelot script path.
    #[arg(long)]
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = RelayConfig::load_from_path(&args.config)?;
    if let Some(dir) = args.log_dir {
        config.logging.dir = dir;
    }
    if let Some(script) = args.script {
        config.camelot.script = script;
    }
    config.validate()?;

    let guard = logging::init_logging(&config.logging, args.log_format)?;
    info!(log_file = %guard.path().display(), "camelot-bridge bootstrap");

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(config));

    if let Err(err) = &result {
        error!(%err, "camelot-bridge stopped on failure");
    }
    drop(guard);
    result
}

async fn run(config: RelayConfig) -> Result<()> {
    let coordinator = ShutdownCoordinator::new();
    let relay = Relay::start(&config, coordinator.clone());
    info!(run_id = %relay.run_id(), "relay running");

    tokio::select! {
        () = coordinator.cancelled() => {}
        () = shutdown_signal() => {
            coordinator.interrupt_everything(ShutdownReason::Signal);
        }
    }

    let report = relay.join(config.shutdown_grace()).await;
    if !report.is_clean() {
        error!("relay links were aborted after the shutdown grace period");
    }

    match report.reason {
        Some(reason) if reason.is_failure() => Err(AppError::Shutdown(reason.to_string())),
        _ => {
            info!("camelot-bridge shut down");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
