//! Newline-delimited framing and JSON message encoding
//!
//! Every frame on the wire is one UTF-8 line terminated by `\n`. [`LineCodec`]
//! splits a byte stream into those lines (and refuses to emit a frame that
//! would contain a raw newline); [`encode`]/[`decode`] map between lines and
//! JSON values.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::Response;

/// Maximum length of a single frame (256 MiB).
///
/// Pulled files travel base64-encoded inside one frame, so this has to be
/// generous; it only exists so a peer that never sends a newline cannot make
/// the client buffer forever.
pub const MAX_LINE_LENGTH: usize = 256 * 1024 * 1024;

/// Serialize a message into a single JSON line (without the trailing newline)
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse one line into a response object
///
/// Any JSON object is accepted regardless of which keys it carries; anything
/// else is [`ProtocolError::Malformed`].
pub fn decode(line: &str) -> Result<Response, ProtocolError> {
    match serde_json::from_str::<Value>(line)? {
        Value::Object(map) => Ok(Response::from(map)),
        other => Err(ProtocolError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Codec that splits a byte stream on `\n`
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index up to which the buffer is known not to contain a newline
    next_index: usize,
    /// Largest frame accepted before giving up
    max_length: usize,
}

impl LineCodec {
    /// Create a codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line limit
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
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
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| offset + self.next_index);

        let Some(index) = newline else {
            if src.len() > self.max_length {
                return Err(ProtocolError::LineTooLong {
                    max: self.max_length,
                });
            }
            // Need more data
            self.next_index = src.len();
            return Ok(None);
        };

        self.next_index = 0;
        let frame = src.split_to(index + 1);
        let mut line = &frame[..index];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        // Invalid UTF-8 is left for the JSON layer to reject
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            // Stream ended in the middle of a frame
            None => {
                tracing::debug!(pending = src.len(), "Discarding partial frame at EOF");
                src.clear();
                self.next_index = 0;
                Err(ProtocolError::ConnectionClosed)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if line.contains('\n') {
            return Err(ProtocolError::Malformed(
                "frame payload contains a raw newline".to_string(),
            ));
        }
        if line.len() > self.max_length {
            return Err(ProtocolError::LineTooLong {
                max: self.max_length,
            });
        }

        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_roundtrip() {
        let messages = [
            json!({"type": "shell", "command": "ls -la"}),
            json!({"type": "push", "path": "/sdcard/a.txt", "data": "aGVsbG8="}),
            json!({"success": true, "output": "file1\nfile2\n", "exitCode": 0}),
            json!({}),
        ];

        for message in messages {
            let line = encode(&message).unwrap();
            assert!(!line.contains('\n'));
            let decoded = decode(&line).unwrap();
            assert_eq!(Value::Object(decoded.into_map()), message);
        }
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(
            decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(decode("[1,2]"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode("\"ok\""), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let response = decode(r#"{"type":"ok","future":{"nested":[1]}}"#).unwrap();
        assert_eq!(response.kind(), Some("ok"));
    }

    #[test]
    fn test_codec_two_frames_in_one_read() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), r#"{"a":1}"#);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), r#"{"b":2}"#);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"type\":"[..]);

        // Should return None (need more data)
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\"ok\"}\r\n{\"ne");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), r#"{"type":"ok"}"#);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"{\"ne");
    }

    #[test]
    fn test_codec_eof_mid_frame() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\"partial"[..]);

        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_codec_clean_eof() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_invalid_utf8_keeps_stream_usable() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\xff\xfe garbage\n{\"type\":\"pong\"}\n"[..]);

        let garbage = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(decode(&garbage), Err(ProtocolError::Malformed(_))));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_codec_line_too_long() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::LineTooLong { max: 8 })
        ));
    }

    #[test]
    fn test_encoder_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(r#"{"type":"ping"}"#.to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"{\"type\":\"ping\"}\n");
    }

    #[test]
    fn test_encoder_rejects_embedded_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode("a\nb".to_string(), &mut buf),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(buf.is_empty());
    }
}
