//! Relay-wide shutdown coordination.
//!
//! [`ShutdownCoordinator`] owns the root [`CancellationToken`]. Every link
//! supervisor and pump observes this token (or a child of it), so a single
//! call to [`ShutdownCoordinator::interrupt_everything`] reaches every
//! suspension point in the relay. The token only ever moves from running to
//! cancelled; the first caller's [`ShutdownReason`] is the one recorded.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pump::Endpoint;

/// Why the relay is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Shutdown requested programmatically.
    Requested,
    /// The process received Ctrl-C or SIGTERM.
    Signal,
    /// A link exhausted its restart budget with `on_exhausted = "shutdown"`.
    LinkFailed {
        /// The link that gave up.
        endpoint: Endpoint,
        /// Rendered last error seen on that link.
        error: String,
    },
}

impl ShutdownReason {
    /// Whether the shutdown reflects a failure rather than a request.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::LinkFailed { .. })
    }
}

impl Display for ShutdownReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("shutdown requested"),
            Self::Signal => f.write_str("shutdown signal received"),
            Self::LinkFailed { endpoint, error } => {
                write!(f, "{endpoint} link failed: {error}")
            }
        }
    }
}

/// Shared shutdown handle; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every link and pump.
    ///
    /// Idempotent: later calls neither change the recorded reason nor have
    /// any other effect. Returns `true` for the call that initiated shutdown.
    pub fn interrupt_everything(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason.clone()).is_ok();
        if first {
            info!(%reason, "interrupt everything: stopping all pumps");
        } else {
            debug!(%reason, "interrupt everything: shutdown already in progress");
        }
        self.token.cancel();
        first
    }

    /// Whether shutdown has not been requested yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Wait until shutdown is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The root token; link generations derive their own tokens from it.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Reason recorded by the first [`interrupt_everything`](Self::interrupt_everything) call.
    #[must_use]
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().cloned()
    }
}
