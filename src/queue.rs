//! Bounded FIFO queues decoupling receiver pumps from sender pumps.
//!
//! Each direction of the relay owns one queue: the inbound queue carries
//! Platform lines towards Camelot, the outbound queue carries Camelot lines
//! towards the Platform. A queue is a thin wrapper over a bounded tokio
//! [`mpsc`] channel, so enqueue and dequeue are safe to call concurrently
//! without extra locking and delivery order always equals insertion order.
//!
//! Producers either wait for room ([`QueueSender::enqueue`]) or are told the
//! queue is full ([`QueueSender::try_enqueue`]). The consumer side keeps a
//! single hold-back slot so a sender pump can return a message it failed to
//! write; the next dequeue yields it again ahead of everything else.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{AppError, Result};

/// Constructor namespace for relay queues.
pub struct RelayQueue;

impl RelayQueue {
    /// Create a bounded queue holding at most `capacity` messages.
    ///
    /// `name` appears in log lines and error messages. A `capacity` of zero
    /// is raised to one.
    #[must_use]
    pub fn bounded(name: &'static str, capacity: usize) -> (QueueSender, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            QueueSender { name, tx },
            QueueReceiver {
                name,
                rx,
                held: None,
            },
        )
    }
}

/// Producer end of a relay queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    name: &'static str,
    tx: mpsc::Sender<String>,
}

impl QueueSender {
    /// Queue name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append `message`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QueueClosed`] once the consumer end is gone.
    pub async fn enqueue(&self, message: String) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| AppError::QueueClosed(self.name.to_owned()))
    }

    /// Append `message` without waiting.
    ///
    /// A rejected message is dropped; the caller is expected to report it.
    ///
    /// # Errors
    ///
    /// - [`AppError::QueueFull`] when the queue is at capacity.
    /// - [`AppError::QueueClosed`] once the consumer end is gone.
    pub fn try_enqueue(&self, message: String) -> Result<()> {
        self.tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => AppError::QueueFull(format!(
                "{} (capacity {})",
                self.name,
                self.tx.max_capacity()
            )),
            TrySendError::Closed(_) => AppError::QueueClosed(self.name.to_owned()),
        })
    }

    /// Messages currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered messages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Whether the consumer end has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Observer that reports queue depth without keeping the queue open.
    #[must_use]
    pub fn probe(&self) -> QueueProbe {
        QueueProbe {
            name: self.name,
            tx: self.tx.downgrade(),
        }
    }
}

/// Consumer end of a relay queue.
#[derive(Debug)]
pub struct QueueReceiver {
    name: &'static str,
    rx: mpsc::Receiver<String>,
    held: Option<String>,
}

impl QueueReceiver {
    /// Queue name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the next message.
    ///
    /// A message handed back with [`hold_back`](Self::hold_back) is returned
    /// first. Returns `None` once every producer is gone and the queue is
    /// drained. Cancel-safe: dropping the future never loses a message.
    pub async fn dequeue(&mut self) -> Option<String> {
        if let Some(message) = self.held.take() {
            return Some(message);
        }
        self.rx.recv().await
    }

    /// Take the next message if one is immediately available.
    pub fn try_dequeue(&mut self) -> Option<String> {
        self.held.take().or_else(|| self.rx.try_recv().ok())
    }

    /// Return an undelivered message to the front of the queue.
    ///
    /// Only one message can be held back; a second call replaces the first,
    /// which never happens with a single sender pump per queue.
    pub fn hold_back(&mut self, message: String) {
        self.held = Some(message);
    }

    /// Whether a held-back message is waiting for redelivery.
    #[must_use]
    pub fn has_held(&self) -> bool {
        self.held.is_some()
    }
}

/// Weak observer of a queue's depth.
#[derive(Debug, Clone)]
pub struct QueueProbe {
    name: &'static str,
    tx: mpsc::WeakSender<String>,
}

impl QueueProbe {
    /// Queue name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Messages currently buffered, or `None` once the producers are gone.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.tx
            .upgrade()
            .map(|tx| tx.max_capacity() - tx.capacity())
    }
}
