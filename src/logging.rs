//! Logging setup: stderr plus a timestamped log file per run.
//!
//! Each run writes to `<dir>/<prefix>YYYYMMDDHHMMSS.log` (local time) through
//! a non-blocking `tracing-appender` writer, and mirrors every event to
//! stderr. Filtering follows `RUST_LOG`, defaulting to `info`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::{AppError, Result};

/// Log line format for both sinks.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text.
    Text,
    /// One JSON object per line.
    Json,
}

/// Keeps the file writer alive; dropping it flushes and closes the log file.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of this run's log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// File name for a run started at `started`.
#[must_use]
pub fn log_file_name(prefix: &str, started: DateTime<Local>) -> String {
    format!("{prefix}{}.log", started.format("%Y%m%d%H%M%S"))
}

/// Create the log directory if needed and return the path for a new log file.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the directory cannot be created.
pub fn prepare_log_file(config: &LoggingConfig, started: DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(&config.dir).map_err(|err| {
        AppError::Io(format!(
            "failed to create log directory {}: {err}",
            config.dir.display()
        ))
    })?;
    Ok(config.dir.join(log_file_name(&config.file_prefix, started)))
}

/// Install the global subscriber writing to stderr and to a new log file.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the log directory cannot be created, or
/// [`AppError::Config`] if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, format: LogFormat) -> Result<LoggingGuard> {
    let started = Local::now();
    let path = prepare_log_file(config, started)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(log_file_name(&config.file_prefix, started))
        .build(&config.dir)
        .map_err(|err| AppError::Io(format!("failed to open log file {}: {err}", path.display())))?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(file_writer))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(fmt::layer().json().with_writer(file_writer))
            .try_init(),
    };
    installed.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}
