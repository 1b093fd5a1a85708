//! Unit tests for the relay line codec.
//!
//! Covers line splitting, buffering of partial lines, CRLF handling, and the
//! skip-and-continue behavior for over-long and non-UTF-8 lines.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use camelot_bridge::pump::codec::{LineCodec, MAX_LINE_BYTES};

/// A single newline-terminated line decodes without its delimiter.
#[test]
fn single_line_decodes_without_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("move Knight to Castle\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("move Knight to Castle"));
    assert!(buf.is_empty(), "the delimiter must be consumed");
}

/// Several lines in one buffer come out one per `decode` call, in order.
#[test]
fn batched_lines_decode_in_order() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("A\nB\nC\n");

    let mut lines = Vec::new();
    while let Some(line) = codec.decode(&mut buf).expect("decode must succeed") {
        lines.push(line);
    }

    assert_eq!(lines, vec!["A", "B", "C"]);
}

/// A fragment without `\n` is buffered until the rest arrives.
#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("ack");

    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(b"1\n");
    assert_eq!(codec.decode(&mut buf).expect("decode").as_deref(), Some("ack1"));
}

/// Lines from CRLF peers are relayed without the carriage return.
#[test]
fn carriage_return_is_stripped() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("ack1\r\n");

    assert_eq!(codec.decode(&mut buf).expect("decode").as_deref(), Some("ack1"));
}

/// An over-long line is skipped and the following line is still delivered.
#[test]
fn over_long_line_is_skipped_and_decoding_continues() {
    let mut codec = LineCodec::with_max_length(8);
    let mut buf = BytesMut::from("0123456789abc\nok\n");

    let line = codec.decode(&mut buf).expect("over-long lines must not error");

    assert_eq!(line.as_deref(), Some("ok"));
    assert_eq!(codec.skipped(), 1);
}

/// A line that is not valid UTF-8 is skipped without ending the stream.
#[test]
fn invalid_utf8_line_is_skipped() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from(&b"\xff\xfe\nok\n"[..]);

    let line = codec.decode(&mut buf).expect("invalid utf-8 must not error");

    assert_eq!(line.as_deref(), Some("ok"));
    assert_eq!(codec.skipped(), 1);
}

/// At end of stream an unterminated final line is still delivered.
#[test]
fn unterminated_final_line_is_delivered_at_eof() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("last words");

    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
    assert_eq!(
        codec.decode_eof(&mut buf).expect("decode_eof").as_deref(),
        Some("last words")
    );
    assert_eq!(codec.decode_eof(&mut buf).expect("decode_eof"), None);
}

/// The default limit is 1 MiB.
#[test]
fn default_limit_is_one_mebibyte() {
    assert_eq!(MAX_LINE_BYTES, 1024 * 1024);
}
