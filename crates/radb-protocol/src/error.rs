//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing, sending or receiving messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The transport rejected a write
    #[error("Transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),

    /// No complete frame arrived within the read timeout
    #[error("Timed out waiting for a response after {0:?}")]
    TransportTimeout(std::time::Duration),

    /// The peer closed the stream (possibly in the middle of a frame)
    #[error("Connection closed")]
    ConnectionClosed,

    /// The peer sent something that is not a JSON object
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// A single frame exceeded the codec's line limit
    #[error("Line too long: exceeds maximum of {max} bytes")]
    LineTooLong { max: usize },

    /// I/O error while reading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}
