//! Newline-delimited transport codec for JSON-RPC messages.
//!
//! Every message is one UTF-8 JSON document followed by `\n`. The decoder
//! yields one [`Frame`] per non-blank line; a line that fails to decode is
//! reported as a [`FrameError`] item and never ends the stream.
//!
//! ```text
//! {"jsonrpc":"2.0","method":"import_rooms","id":"1"}\n
//! {"jsonrpc":"2.0","id":"1","result":{"rooms":[]}}\n
//! ```

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::Message;

/// Maximum line length accepted by default (16 MB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Result of decoding a single line
pub type Frame = Result<Value, FrameError>;

/// Codec for newline-delimited JSON-RPC messages
#[derive(Debug)]
pub struct LineCodec {
    // Offset into the buffer already scanned for a newline
    next_index: usize,
    max_line_length: usize,
    is_discarding: bool,
}

impl LineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    #[must_use]
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            next_index: 0,
            max_line_length,
            is_discarding: false,
        }
    }

    #[must_use]
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(line: &[u8]) -> Frame {
    let text = std::str::from_utf8(line)?;
    Ok(serde_json::from_str(text)?)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let read_to = src.len().min(self.max_line_length.saturating_add(1));
            let newline_offset = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.is_discarding, newline_offset) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.is_discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_index = self.next_index + offset;
                    self.next_index = 0;
                    let mut line = src.split_to(newline_index + 1);
                    line.truncate(newline_index);
                    if line.last() == Some(&b'\r') {
                        line.truncate(newline_index - 1);
                    }
                    if is_blank(&line) {
                        continue;
                    }
                    return Ok(Some(decode_line(&line)));
                }
                (false, None) if src.len() > self.max_line_length => {
                    self.is_discarding = true;
                    return Ok(Some(Err(FrameError::LineTooLong(self.max_line_length))));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        self.next_index = 0;
        if self.is_discarding || is_blank(buf) {
            self.is_discarding = false;
            buf.clear();
            return Ok(None);
        }

        // Final line without a terminating newline
        let line = buf.split();
        Ok(Some(decode_line(&line)))
    }
}

impl Encoder<Message> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;

        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');

        Ok(())
    }
}

/// Errors that end the stream
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors confined to a single line
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Line too long (max: {0} bytes)")]
    LineTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Notification, Response, RpcError};
    use futures_util::StreamExt;
    use serde_json::json;
    use tokio_util::codec::FramedRead;

    fn expect_value(frame: Option<Frame>) -> Value {
        match frame {
            Some(Ok(value)) => value,
            other => panic!("expected a decoded value, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_single_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"method\":\"import_rooms\",\"id\":\"1\"}\n"[..]);

        let value = expect_value(codec.decode(&mut buf).unwrap());
        assert_eq!(value["method"], "import_rooms");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(b"{\"method\":\"imp");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ort_rooms\"}");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n");
        let value = expect_value(codec.decode(&mut buf).unwrap());
        assert_eq!(value["method"], "import_rooms");
    }

    #[test]
    fn test_multiple_lines_in_buffer() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"n\":1}\n{\"n\":2}\r\n{\"n\":3}\n"[..]);

        for expected in 1..=3 {
            let value = expect_value(codec.decode(&mut buf).unwrap());
            assert_eq!(value["n"], expected);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\n   \n\r\n{\"n\":1}\n"[..]);

        let value = expect_value(codec.decode(&mut buf).unwrap());
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_malformed_line_does_not_stop_decoding() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"not json\n{\"n\":2}\n"[..]);

        let first = codec.decode(&mut buf).unwrap();
        assert!(matches!(first, Some(Err(FrameError::Json(_)))));

        let value = expect_value(codec.decode(&mut buf).unwrap());
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_invalid_utf8_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&[0xff, 0xfe, b'\n'][..]);

        let frame = codec.decode(&mut buf).unwrap();
        assert!(matches!(frame, Some(Err(FrameError::Utf8(_)))));
    }

    #[test]
    fn test_line_too_long_is_discarded() {
        let mut codec = LineCodec::with_max_line_length(8);
        let mut buf = BytesMut::from(&b"{\"padding\":\"xxxx"[..]);

        let frame = codec.decode(&mut buf).unwrap();
        assert!(matches!(frame, Some(Err(FrameError::LineTooLong(8)))));

        // Remainder of the long line arrives along with a valid one
        buf.extend_from_slice(b"xxxxxxxx\"}\n{\"n\":1}\n");
        let value = expect_value(codec.decode(&mut buf).unwrap());
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_decode_eof_unterminated_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"n\":1}"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        let value = expect_value(codec.decode_eof(&mut buf).unwrap());
        assert_eq!(value["n"], 1);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_eof_trailing_whitespace() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"  "[..]);

        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        let response = Response::success("3".into(), json!({"rooms": []}));
        codec.encode(Message::Response(response), &mut buf).unwrap();

        assert_eq!(buf.last(), Some(&b'\n'));
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);

        let value: Value = serde_json::from_slice(&buf[..buf.len() - 1]).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": "3", "result": {"rooms": []}}));
    }

    #[test]
    fn test_encode_escapes_embedded_newlines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        let notification = Notification::new("chat_room_updated", Some(json!({"text": "a\nb"})));
        codec.encode(notification.into(), &mut buf).unwrap();
        let response = Response::error(7u64.into(), RpcError::unknown_error());
        codec.encode(response.into(), &mut buf).unwrap();

        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 2);
    }

    #[tokio::test]
    async fn test_framed_read_over_stream() {
        let input: &[u8] = b"{\"n\":1}\ngarbage\n\n{\"n\":2}";
        let mut frames = FramedRead::new(input, LineCodec::new());

        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(first.unwrap()["n"], 1);

        let second = frames.next().await.unwrap().unwrap();
        assert!(second.is_err());

        let third = frames.next().await.unwrap().unwrap();
        assert_eq!(third.unwrap()["n"], 2);

        assert!(frames.next().await.is_none());
    }

    #[test]
    fn test_codec_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err = CodecError::from(io_err);
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("pipe closed"));
    }

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::LineTooLong(16);
        assert!(err.to_string().contains("16"));
    }
}
