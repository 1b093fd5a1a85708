//! Error types shared across the relay.

use std::fmt::{Display, Formatter};

/// Shared relay result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Relay error enumeration covering every failure mode a link can report.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or stream I/O failure.
    Io(String),
    /// The Camelot child process could not be launched.
    Spawn(String),
    /// Platform socket connect, read, or write failure.
    Platform(String),
    /// Camelot stdin/stdout read or write failure.
    Camelot(String),
    /// Non-blocking enqueue rejected because the queue is at capacity.
    QueueFull(String),
    /// The opposite end of a relay queue has gone away.
    QueueClosed(String),
    /// The relay stopped on a terminal failure.
    Shutdown(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Platform(msg) => write!(f, "platform: {msg}"),
            Self::Camelot(msg) => write!(f, "camelot: {msg}"),
            Self::QueueFull(msg) => write!(f, "queue full: {msg}"),
            Self::QueueClosed(msg) => write!(f, "queue closed: {msg}"),
            Self::Shutdown(msg) => write!(f, "shutdown: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
