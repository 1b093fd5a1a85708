//! Sender pumps: queue → stream.
//!
//! Waits on a relay queue and writes each message, terminated by `\n`, to a
//! byte stream (Camelot stdin or Platform socket), flushing after every line
//! so the peer observes it immediately.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::pump::{Pump, PumpExit};
use crate::queue::QueueReceiver;
use crate::Result;

/// Sender pump: write every message dequeued from `queue` into `sink`.
///
/// Waiting for the next message never busy-polls. Both the wait and the
/// write are raced against `cancel`. A message that was dequeued but not
/// fully written, because the write failed or was cancelled, is handed back
/// to the queue with [`QueueReceiver::hold_back`] so the next pump generation
/// delivers it first.
///
/// # Returns
///
/// - [`PumpExit::Cancelled`] when `cancel` fires.
/// - [`PumpExit::QueueClosed`] when every producer is gone and the queue is
///   drained.
///
/// # Errors
///
/// Returns the endpoint's error variant ([`AppError::Platform`] or
/// [`AppError::Camelot`]) when writing or flushing `sink` fails.
///
/// [`AppError::Platform`]: crate::AppError::Platform
/// [`AppError::Camelot`]: crate::AppError::Camelot
pub async fn run_sender<W>(
    pump: Pump,
    mut sink: W,
    queue: &mut QueueReceiver,
    cancel: &CancellationToken,
) -> Result<PumpExit>
where
    W: AsyncWrite + Unpin,
{
    let mut delivered: u64 = 0;

    loop {
        let message = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(%pump, delivered, "sender: cancellation received, stopping");
                return Ok(PumpExit::Cancelled);
            }

            next = queue.dequeue() => match next {
                None => {
                    debug!(%pump, delivered, "sender: queue closed, stopping");
                    return Ok(PumpExit::QueueClosed);
                }
                Some(message) => message,
            },
        };

        let written = tokio::select! {
            biased;

            () = cancel.cancelled() => None,

            result = write_line(&mut sink, &message) => Some(result),
        };

        match written {
            None => {
                debug!(%pump, delivered, "sender: cancelled mid-write, holding message back");
                queue.hold_back(message);
                return Ok(PumpExit::Cancelled);
            }
            Some(Err(err)) => {
                warn!(%pump, error = %err, %message, "sender: write failed, holding message back");
                queue.hold_back(message);
                return Err(pump.endpoint().error(format!("write failed: {err}")));
            }
            Some(Ok(())) => {
                delivered += 1;
                trace!(%pump, bytes = message.len(), "sender: line written");
            }
        }
    }
}

/// Write `message` plus the `\n` delimiter as one buffer, then flush.
async fn write_line<W>(sink: &mut W, message: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = Vec::with_capacity(message.len() + 1);
    bytes.extend_from_slice(message.as_bytes());
    bytes.push(b'\n');

    sink.write_all(&bytes).await?;
    sink.flush().await
}
