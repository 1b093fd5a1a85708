//! Newline-delimited text codec for relay streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! peer that never sends `\n` cannot make the relay buffer without bound.
//!
//! Unlike a bare `LinesCodec`, framing problems never surface as decoder
//! errors: an over-long line or a line that is not valid UTF-8 is logged,
//! counted, and skipped, and decoding carries on with the next line. A
//! decoder error would otherwise terminate the surrounding
//! [`FramedRead`](tokio_util::codec::FramedRead) stream. Only genuine I/O
//! failures of the underlying reader reach the caller.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use camelot_bridge::pump::codec::LineCodec;
//!
//! let lines = FramedRead::new(child_stdout, LineCodec::new());
//! ```

use std::io::ErrorKind;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum line length accepted by the relay codec: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line codec shared by all four pumps.
///
/// Each `\n`-terminated UTF-8 string is one message; a trailing `\r` is
/// stripped so CRLF peers are relayed unchanged.
#[derive(Debug)]
pub struct LineCodec {
    inner: LinesCodec,
    skipped: u64,
}

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            skipped: 0,
        }
    }

    /// Number of lines dropped for framing problems so far.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn decode_with<F>(&mut self, src: &mut BytesMut, mut step: F) -> Result<Option<String>>
    where
        F: FnMut(
            &mut LinesCodec,
            &mut BytesMut,
        ) -> std::result::Result<Option<String>, LinesCodecError>,
    {
        loop {
            match step(&mut self.inner, src) {
                Ok(line) => return Ok(line),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.skipped += 1;
                    warn!(
                        max_bytes = self.inner.max_length(),
                        "line codec: line too long, discarding"
                    );
                }
                Err(LinesCodecError::Io(err)) if err.kind() == ErrorKind::InvalidData => {
                    self.skipped += 1;
                    warn!(error = %err, "line codec: line is not valid utf-8, discarding");
                }
                Err(LinesCodecError::Io(err)) => return Err(AppError::Io(err.to_string())),
            }
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next complete line from `src`.
    ///
    /// Returns `Ok(None)` while `src` holds no complete line yet.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.decode_with(src, LinesCodec::decode)
    }

    /// Decode the final, possibly unterminated, line at end of stream.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.decode_with(src, LinesCodec::decode_eof)
    }
}
