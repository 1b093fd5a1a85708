//! The Platform endpoint: newline-delimited text over TCP.
//!
//! The Platform is reached either through one duplex connection, or through
//! two one-way connections (one read from, one written to) when
//! `platform.outbound_address` is configured.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::{AppError, Result};

/// Boxed read half handed to the Platform receiver.
pub type PlatformReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half handed to the Platform sender.
pub type PlatformWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An established Platform connection, split by direction.
pub struct PlatformConnection {
    /// Lines from the Platform.
    pub reader: PlatformReader,
    /// Lines to the Platform.
    pub writer: PlatformWriter,
    /// Human-readable peer description for logs.
    pub peer: String,
}

impl std::fmt::Debug for PlatformConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConnection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Connect to the Platform as described by `config`.
///
/// Every connect attempt is bounded by `timeout`.
///
/// # Errors
///
/// Returns [`AppError::Platform`] when a connection cannot be established
/// within `timeout`.
pub async fn connect(config: &PlatformConfig, timeout: Duration) -> Result<PlatformConnection> {
    let inbound = connect_one(&config.address, timeout).await?;

    match config.outbound_address.as_deref() {
        None => {
            let peer = config.address.clone();
            let (reader, writer) = inbound.into_split();
            info!(%peer, "platform connected (duplex)");
            Ok(PlatformConnection {
                reader: Box::new(reader),
                writer: Box::new(writer),
                peer,
            })
        }
        Some(outbound_address) => {
            let outbound = connect_one(outbound_address, timeout).await?;
            let peer = format!("{} / {}", config.address, outbound_address);
            info!(%peer, "platform connected (split)");
            // The inbound socket is kept whole: dropping a write half would
            // send FIN, which the Platform may treat as a disconnect.
            Ok(PlatformConnection {
                reader: Box::new(inbound),
                writer: Box::new(outbound),
                peer,
            })
        }
    }
}

async fn connect_one(address: &str, timeout: Duration) -> Result<TcpStream> {
    debug!(address, "platform: connecting");
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| {
            AppError::Platform(format!("connect to {address} timed out after {timeout:?}"))
        })?
        .map_err(|err| AppError::Platform(format!("connect to {address} failed: {err}")))?;

    stream
        .set_nodelay(true)
        .map_err(|err| AppError::Platform(format!("set_nodelay on {address} failed: {err}")))?;

    Ok(stream)
}
