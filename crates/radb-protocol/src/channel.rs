//! Framed channel over a raw byte stream
//!
//! Wraps any `AsyncRead + AsyncWrite` transport in a [`LineCodec`] so callers
//! deal in whole lines. Partial input stays buffered inside the `Framed`
//! between calls, which also makes [`FramedChannel::receive`] cancel-safe.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::codec::LineCodec;
use crate::error::ProtocolError;

/// One live transport exchanging newline-delimited messages
pub struct FramedChannel<T> {
    /// `None` once closed or after the stream failed
    framed: Option<Framed<T, LineCodec>>,
    /// Bound applied by [`FramedChannel::receive`]
    read_timeout: Option<Duration>,
}

impl<T> FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream with the default codec and no read timeout
    pub fn new(stream: T) -> Self {
        Self::with_codec(stream, LineCodec::new())
    }

    /// Wrap a stream with a custom codec
    pub fn with_codec(stream: T, codec: LineCodec) -> Self {
        Self {
            framed: Some(Framed::new(stream, codec)),
            read_timeout: None,
        }
    }

    /// Set the timeout used by [`FramedChannel::receive`]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Whether the channel has been closed or lost its stream
    pub fn is_closed(&self) -> bool {
        self.framed.is_none()
    }

    /// Send one message; the trailing newline is added by the codec
    pub async fn send(&mut self, message: &str) -> Result<(), ProtocolError> {
        let framed = self.framed.as_mut().ok_or(ProtocolError::ConnectionClosed)?;

        let result = framed.send(message.to_string()).await;
        match result {
            Ok(()) => Ok(()),
            Err(ProtocolError::Io(e)) => {
                self.framed = None;
                Err(ProtocolError::TransportWrite(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Receive the next line, bounded by the configured read timeout
    pub async fn receive(&mut self) -> Result<String, ProtocolError> {
        match self.read_timeout {
            Some(timeout) => self.receive_timeout(timeout).await,
            None => self.receive_untimed().await,
        }
    }

    /// Receive the next line, failing with `TransportTimeout` after `timeout`
    pub async fn receive_timeout(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        tokio::time::timeout(timeout, self.receive_untimed())
            .await
            .map_err(|_| ProtocolError::TransportTimeout(timeout))?
    }

    /// Receive the next line, waiting as long as it takes
    pub async fn receive_untimed(&mut self) -> Result<String, ProtocolError> {
        let framed = self.framed.as_mut().ok_or(ProtocolError::ConnectionClosed)?;

        let result = match framed.next().await {
            Some(result) => result,
            None => Err(ProtocolError::ConnectionClosed),
        };

        if let Err(e) = &result {
            if matches!(
                e,
                ProtocolError::ConnectionClosed
                    | ProtocolError::Io(_)
                    | ProtocolError::LineTooLong { .. }
            ) {
                tracing::debug!(error = %e, "Dropping framed channel");
                self.framed = None;
            }
        }
        result
    }

    /// Flush and shut down the transport; safe to call more than once
    pub async fn close(&mut self) {
        if let Some(mut framed) = self.framed.take() {
            if let Err(e) = SinkExt::<String>::close(&mut framed).await {
                tracing::debug!(error = %e, "Error while closing channel");
            }
        }
    }
}
