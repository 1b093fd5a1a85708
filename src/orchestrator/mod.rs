//! Link supervision and relay wiring.
//!
//! A *link* is one endpoint connection (Platform socket or Camelot child)
//! together with its two pumps. Each link supervisor runs its pumps as one
//! *generation*, inspects how the generation ended, and then reconnects or
//! relaunches with backoff, or escalates once its restart budget is spent.

pub mod backoff;
pub mod camelot_link;
pub mod platform_link;
pub mod relay;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::{Escalation, RestartPolicy};
use crate::pump::receiver::run_receiver;
use crate::pump::sender::run_sender;
use crate::pump::{Endpoint, Pump, PumpExit};
use crate::queue::{QueueReceiver, QueueSender};
use crate::shutdown::{ShutdownCoordinator, ShutdownReason};
use crate::{AppError, Result};

pub use relay::{Relay, RelayReport};

/// How a link supervisor finished.
#[derive(Debug)]
pub enum LinkOutcome {
    /// Shutdown was requested while the link was healthy or restarting.
    Stopped,
    /// The link gave up and idled until shutdown, leaving the relay running.
    Degraded(AppError),
    /// The link gave up and stopped the whole relay.
    Escalated(AppError),
}

/// Everything a link supervisor needs besides its endpoint settings.
#[derive(Debug, Clone)]
pub struct LinkContext {
    /// Relay-wide shutdown handle.
    pub coordinator: ShutdownCoordinator,
    /// Restart budget and escalation for this link.
    pub policy: RestartPolicy,
}

/// How one generation of a link's pumps ended.
#[derive(Debug)]
pub(crate) enum GenerationEnd {
    /// Both pumps were cancelled from outside the link.
    Cancelled,
    /// A queue lost its other end.
    QueueClosed,
    /// A pump hit end of stream or a stream error.
    Failed(AppError),
}

/// Run a receiver and a sender against one endpoint until either stops.
///
/// The pumps share a generation token derived from `shutdown`; whichever
/// pump finishes first cancels it, which stops its sibling.
pub(crate) async fn run_generation<R, W>(
    endpoint: Endpoint,
    pumps: (Pump, Pump),
    reader: R,
    writer: W,
    produce: &QueueSender,
    consume: &mut QueueReceiver,
    shutdown: &CancellationToken,
) -> GenerationEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (receiver_pump, sender_pump) = pumps;
    let link = shutdown.child_token();

    let (received, sent) = tokio::join!(
        async {
            let result = run_receiver(receiver_pump, reader, produce, &link, shutdown).await;
            link.cancel();
            result
        },
        async {
            let result = run_sender(sender_pump, writer, consume, &link).await;
            link.cancel();
            result
        },
    );

    match (classify(endpoint, received), classify(endpoint, sent)) {
        (GenerationEnd::Failed(err), _) | (_, GenerationEnd::Failed(err)) => {
            GenerationEnd::Failed(err)
        }
        (GenerationEnd::QueueClosed, _) | (_, GenerationEnd::QueueClosed) => {
            GenerationEnd::QueueClosed
        }
        _ => GenerationEnd::Cancelled,
    }
}

fn classify(endpoint: Endpoint, result: Result<PumpExit>) -> GenerationEnd {
    match result {
        Ok(PumpExit::Cancelled) => GenerationEnd::Cancelled,
        Ok(PumpExit::QueueClosed) => GenerationEnd::QueueClosed,
        Ok(PumpExit::EndOfStream) => GenerationEnd::Failed(endpoint.error("stream closed by peer")),
        Err(err) => GenerationEnd::Failed(err),
    }
}

/// Sleep for `delay` unless shutdown comes first; returns `false` on shutdown.
pub(crate) async fn sleep_or_shutdown(coordinator: &ShutdownCoordinator, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = coordinator.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Apply the link's `on_exhausted` policy after its last restart failed.
///
/// In degraded mode this waits for relay shutdown before returning, so the
/// caller keeps its queue ends alive and the other link keeps flowing.
pub(crate) async fn escalate(ctx: &LinkContext, endpoint: Endpoint, err: AppError) -> LinkOutcome {
    match ctx.policy.on_exhausted {
        Escalation::Shutdown => {
            error!(%endpoint, error = %err, "link restart budget exhausted, shutting relay down");
            ctx.coordinator
                .interrupt_everything(ShutdownReason::LinkFailed {
                    endpoint,
                    error: err.to_string(),
                });
            LinkOutcome::Escalated(err)
        }
        Escalation::Degrade => {
            warn!(%endpoint, error = %err, "link restart budget exhausted, running degraded");
            ctx.coordinator.cancelled().await;
            LinkOutcome::Degraded(err)
        }
    }
}
