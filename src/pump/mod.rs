//! The four relay pumps.
//!
//! A pump moves lines from exactly one source to exactly one sink:
//!
//! | Pump               | Source            | Sink              |
//! |--------------------|-------------------|-------------------|
//! | `PlatformReceiver` | Platform socket   | inbound queue     |
//! | `CamelotSender`    | inbound queue     | Camelot stdin     |
//! | `CamelotReceiver`  | Camelot stdout    | outbound queue    |
//! | `PlatformSender`   | outbound queue    | Platform socket   |
//!
//! Receivers are driven by [`receiver::run_receiver`], senders by
//! [`sender::run_sender`]. Both race every suspension point against a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and finish
//! with a [`PumpExit`] or a typed error for the link supervisor.

pub mod codec;
pub mod receiver;
pub mod sender;

use std::fmt::{Display, Formatter};

use crate::AppError;

/// One of the two relay endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The remote evaluation platform, reached over TCP.
    Platform,
    /// The Camelot child process, reached over its stdio.
    Camelot,
}

impl Endpoint {
    /// Lower-case name used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Camelot => "camelot",
        }
    }

    /// Wrap `detail` in the error variant belonging to this endpoint.
    #[must_use]
    pub fn error(self, detail: impl Into<String>) -> AppError {
        match self {
            Self::Platform => AppError::Platform(detail.into()),
            Self::Camelot => AppError::Camelot(detail.into()),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pump {
    /// Platform socket → inbound queue.
    PlatformReceiver,
    /// Outbound queue → Platform socket.
    PlatformSender,
    /// Camelot stdout → outbound queue.
    CamelotReceiver,
    /// Inbound queue → Camelot stdin.
    CamelotSender,
}

impl Pump {
    /// Name used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlatformReceiver => "platform_receiver",
            Self::PlatformSender => "platform_sender",
            Self::CamelotReceiver => "camelot_receiver",
            Self::CamelotSender => "camelot_sender",
        }
    }

    /// Endpoint whose stream this pump reads or writes.
    #[must_use]
    pub fn endpoint(self) -> Endpoint {
        match self {
            Self::PlatformReceiver | Self::PlatformSender => Endpoint::Platform,
            Self::CamelotReceiver | Self::CamelotSender => Endpoint::Camelot,
        }
    }
}

impl Display for Pump {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pump stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// Its cancellation token fired.
    Cancelled,
    /// The source stream reached end of file.
    EndOfStream,
    /// The queue's other end is gone.
    QueueClosed,
}
