//! Relay configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Platform socket endpoints.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PlatformConfig {
    /// Address read from (and written to, when `outbound_address` is unset).
    pub address: String,
    /// Separate write-only endpoint, for deployments that split directions
    /// across two sockets.
    #[serde(default)]
    pub outbound_address: Option<String>,
    /// Maximum time for a single connect attempt.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

/// Camelot child process launch settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CamelotConfig {
    /// Interpreter used to run the script (e.g. `python`).
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Path to the Camelot communicator entry script.
    pub script: PathBuf,
    /// Extra arguments appended after the script path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Wrap the command in the platform shell (`bash -c` / `cmd.exe /c`).
    #[serde(default = "default_true")]
    pub shell: bool,
    /// Working directory for the child; inherits ours when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Time the child gets to exit after its stdin closes before it is killed.
    #[serde(default = "default_child_exit_grace")]
    pub child_exit_grace_seconds: u64,
}

/// Relay queue sizing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Maximum messages buffered per direction before producers wait.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

/// What a link does once it has used up its restart budget.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// Stop relaying on this link and keep the rest of the relay running.
    #[default]
    Degrade,
    /// Stop the whole relay.
    Shutdown,
}

/// Reconnect / relaunch policy for one link.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RestartPolicy {
    /// Consecutive restarts allowed before escalating; 0 disables restarts.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Delay before the first restart.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on the restart delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// A link that ran at least this long before failing starts a fresh budget.
    #[serde(default = "default_healthy_after")]
    pub healthy_after_seconds: u64,
    /// Behavior once `max_restarts` is exhausted.
    #[serde(default)]
    pub on_exhausted: Escalation,
}

impl RestartPolicy {
    /// Delay before the first restart.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Upper bound on the restart delay.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Minimum run time that counts as a healthy link.
    #[must_use]
    pub fn healthy_after(&self) -> Duration {
        Duration::from_secs(self.healthy_after_seconds)
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            healthy_after_seconds: default_healthy_after(),
            on_exhausted: Escalation::default(),
        }
    }
}

/// Restart policies for both links.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RestartConfig {
    /// Platform socket reconnect policy.
    #[serde(default)]
    pub platform: RestartPolicy,
    /// Camelot child relaunch policy.
    #[serde(default)]
    pub camelot: RestartPolicy,
}

/// Log file placement.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Directory holding timestamped log files; created when missing.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// File name prefix preceding the `YYYYMMDDHHMMSS` timestamp.
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_log_prefix(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_interpreter() -> String {
    "python".into()
}

fn default_true() -> bool {
    true
}

fn default_child_exit_grace() -> u64 {
    5
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_restarts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_healthy_after() -> u64 {
    30
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_prefix() -> String {
    "camelot-bridge-".into()
}

fn default_shutdown_grace() -> u64 {
    10
}

/// Relay configuration parsed from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RelayConfig {
    /// Platform socket settings.
    pub platform: PlatformConfig,
    /// Camelot child process settings.
    pub camelot: CamelotConfig,
    /// Queue sizing shared by both directions.
    #[serde(default)]
    pub queues: QueueConfig,
    /// Per-link restart policies.
    #[serde(default)]
    pub restart: RestartConfig,
    /// Log file placement.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Time link supervisors get to wind down after shutdown is requested.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl RelayConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Maximum time for a single Platform connect attempt.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.platform.connect_timeout_seconds)
    }

    /// Time the child gets to exit on its own during shutdown.
    #[must_use]
    pub fn child_exit_grace(&self) -> Duration {
        Duration::from_secs(self.camelot.child_exit_grace_seconds)
    }

    /// Time link supervisors get to finish after shutdown is requested.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Check invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.platform.address.trim().is_empty() {
            return Err(AppError::Config("platform.address must not be empty".into()));
        }

        if self
            .platform
            .outbound_address
            .as_deref()
            .is_some_and(|addr| addr.trim().is_empty())
        {
            return Err(AppError::Config(
                "platform.outbound_address must not be empty when set".into(),
            ));
        }

        if self.camelot.script.as_os_str().is_empty() {
            return Err(AppError::Config("camelot.script must not be empty".into()));
        }

        if self.camelot.interpreter.trim().is_empty() {
            return Err(AppError::Config(
                "camelot.interpreter must not be empty".into(),
            ));
        }

        if self.queues.capacity == 0 {
            return Err(AppError::Config(
                "queues.capacity must be greater than zero".into(),
            ));
        }

        for (link, policy) in [
            ("platform", &self.restart.platform),
            ("camelot", &self.restart.camelot),
        ] {
            if policy.initial_backoff_ms > policy.max_backoff_ms {
                return Err(AppError::Config(format!(
                    "restart.{link}.initial_backoff_ms must not exceed max_backoff_ms"
                )));
            }
        }

        Ok(())
    }
}
