//! Receiver pumps: stream → queue.
//!
//! Reads newline-delimited text from a byte stream (Platform socket or
//! Camelot stdout) and appends every line to a relay queue. The stream is
//! driven by [`FramedRead`] over [`LineCodec`], so over-long or non-UTF-8
//! lines are skipped inside the codec rather than ending the pump.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::pump::codec::LineCodec;
use crate::pump::{Pump, PumpExit};
use crate::queue::QueueSender;
use crate::Result;

/// Receiver pump: forward each line read from `source` into `queue`.
///
/// Reads are raced against `cancel`, the token scoping this pump's
/// generation. Once `cancel` fires no more bytes are read, but the line in
/// hand and every complete line already buffered by the framer are still
/// enqueued, so stopping one generation never loses a line that was read.
/// Only `shutdown`, the relay-wide token, interrupts an enqueue (which
/// waits while the queue is full); lines dropped that way are logged at
/// `DEBUG`. `cancel` is expected to be a child of `shutdown`.
///
/// # Returns
///
/// - [`PumpExit::Cancelled`] when `cancel` or `shutdown` fires.
/// - [`PumpExit::EndOfStream`] when `source` reaches EOF.
/// - [`PumpExit::QueueClosed`] when the queue's consumer is gone.
///
/// # Errors
///
/// Returns the endpoint's error variant ([`AppError::Platform`] or
/// [`AppError::Camelot`]) when reading from `source` fails.
///
/// [`AppError::Platform`]: crate::AppError::Platform
/// [`AppError::Camelot`]: crate::AppError::Camelot
pub async fn run_receiver<R>(
    pump: Pump,
    source: R,
    queue: &QueueSender,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
) -> Result<PumpExit>
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(source, LineCodec::new());
    let mut forwarded: u64 = 0;

    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = framed.next() => item,
        };

        let line = match item {
            None => {
                debug!(
                    %pump,
                    forwarded,
                    skipped = framed.decoder().skipped(),
                    "receiver: end of stream"
                );
                return Ok(PumpExit::EndOfStream);
            }
            Some(Err(err)) => {
                warn!(
                    %pump,
                    error = %err,
                    skipped = framed.decoder().skipped(),
                    "receiver: read failed, stopping"
                );
                return Err(pump.endpoint().error(format!("read failed: {err}")));
            }
            Some(Ok(line)) => line,
        };

        trace!(%pump, bytes = line.len(), "receiver: line read");
        match deliver(pump, queue, line, shutdown).await {
            Delivery::Queued => forwarded += 1,
            Delivery::Closed => return Ok(PumpExit::QueueClosed),
            Delivery::Shutdown => return Ok(PumpExit::Cancelled),
        }
    }

    // Lines the framer already split off the stream still belong in the queue.
    let mut parts = framed.into_parts();
    loop {
        let line = match parts.codec.decode(&mut parts.read_buf) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%pump, error = %err, "receiver: buffered lines unreadable, discarding");
                break;
            }
        };
        match deliver(pump, queue, line, shutdown).await {
            Delivery::Queued => forwarded += 1,
            Delivery::Closed => return Ok(PumpExit::QueueClosed),
            Delivery::Shutdown => return Ok(PumpExit::Cancelled),
        }
    }

    debug!(
        %pump,
        forwarded,
        skipped = parts.codec.skipped(),
        partial_bytes = parts.read_buf.len(),
        "receiver: cancellation received, stopping"
    );
    Ok(PumpExit::Cancelled)
}

enum Delivery {
    Queued,
    Closed,
    Shutdown,
}

/// Enqueue one line, giving up only on relay shutdown or a closed queue.
async fn deliver(
    pump: Pump,
    queue: &QueueSender,
    line: String,
    shutdown: &CancellationToken,
) -> Delivery {
    tokio::select! {
        biased;

        () = shutdown.cancelled() => {
            debug!(%pump, "receiver: shutdown while enqueueing, line dropped");
            Delivery::Shutdown
        }

        result = queue.enqueue(line) => match result {
            Ok(()) => Delivery::Queued,
            Err(err) => {
                debug!(%pump, error = %err, "receiver: queue closed, stopping");
                Delivery::Closed
            }
        },
    }
}
