//! radb-protocol: Wire protocol for the radb remote shell client
//!
//! Messages are single-line JSON objects separated by `\n`, exchanged with a
//! remote shell agent over a tunneled TCP stream. This crate owns the framing
//! codec, the request/response value types, and the framed channel that pairs
//! them with a live transport.

pub mod channel;
pub mod codec;
pub mod error;
pub mod message;

pub use channel::FramedChannel;
pub use codec::{decode, encode, LineCodec, MAX_LINE_LENGTH};
pub use error::ProtocolError;
pub use message::{
    CommandResult, Dialect, PullOutcome, RemoteFailure, Request, Response, StreamFrame,
    TransferOutcome, Welcome, DEFAULT_LOG_COMMAND,
};
