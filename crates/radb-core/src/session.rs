//! Protocol session
//!
//! A [`Session`] owns one [`FramedChannel`] and enforces the protocol's only
//! correlation rule: one request in flight, answered by the next frame.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──greeting──▶ Connected ──close──▶ Closed
//!                                                        │
//!                                            transport lost ──▶ Disconnected
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use radb_protocol::{
    codec, Dialect, FramedChannel, LineCodec, ProtocolError, Request, Response, Welcome,
    MAX_LINE_LENGTH,
};

use crate::config::{RadbConfig, SessionConfig};
use crate::error::RadbError;
use crate::tunnel::{wait_for_listener, Endpoint, ProvisionedTunnel, TunnelProvider};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable transport (never opened, or lost mid-session)
    Disconnected,
    /// Transport open, waiting for the optional greeting
    Connecting,
    /// Ready for requests
    Connected,
    /// Closed by the caller
    Closed,
}

/// Per-session protocol settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Request dialect
    pub dialect: Dialect,
    /// Read timeout for request/response exchanges
    pub io_timeout: Option<Duration>,
    /// How long to wait for the welcome frame
    pub greeting_timeout: Duration,
    /// Largest frame accepted from the device
    pub max_line_length: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            dialect: config.dialect,
            io_timeout: (!config.io_timeout.is_zero()).then_some(config.io_timeout),
            greeting_timeout: config.greeting_timeout,
            max_line_length: if config.max_line_length == 0 {
                MAX_LINE_LENGTH
            } else {
                config.max_line_length
            },
        }
    }
}

/// One logical connection to a device
pub struct Session<T = TcpStream> {
    channel: FramedChannel<T>,
    state: SessionState,
    options: SessionOptions,
    welcome: Option<Welcome>,
    /// A request was sent whose response has not been consumed yet
    outstanding: bool,
    /// Keeps the tunnel helper alive for the session's lifetime
    tunnel: Option<ProvisionedTunnel>,
}

impl Session<TcpStream> {
    /// Provision the transport for `endpoint` and open a session over it
    pub async fn connect(
        endpoint: &Endpoint,
        provider: &dyn TunnelProvider,
        config: &RadbConfig,
    ) -> Result<Self, RadbError> {
        tracing::info!(hostname = %endpoint.hostname(), "Connecting");

        let mut tunnel = provider.provision(endpoint).await?;
        let stream = match wait_for_listener(
            &mut tunnel,
            config.tunnel.connect_timeout,
            &config.tunnel.backoff,
        )
        .await
        {
            Ok(stream) => stream,
            Err(e) => {
                tunnel.shutdown().await;
                return Err(e.into());
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not set TCP_NODELAY");
        }

        let mut session = Session::new(stream, SessionOptions::from(&config.session));
        session.tunnel = Some(tunnel);
        session.greet().await?;
        Ok(session)
    }
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an open stream; the session stays `Connecting` until greeted
    pub fn new(stream: T, options: SessionOptions) -> Self {
        let channel = FramedChannel::with_codec(
            stream,
            LineCodec::with_max_length(options.max_line_length),
        )
        .with_read_timeout(options.io_timeout);

        Self {
            channel,
            state: SessionState::Connecting,
            options,
            welcome: None,
            outstanding: false,
            tunnel: None,
        }
    }

    /// Wrap an open stream and read the optional greeting
    pub async fn from_stream(stream: T, options: SessionOptions) -> Result<Self, RadbError> {
        let mut session = Self::new(stream, options);
        session.greet().await?;
        Ok(session)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Connected if self.channel.is_closed() => SessionState::Disconnected,
            state => state,
        }
    }

    /// Greeting received from the device, if any
    pub fn welcome(&self) -> Option<&Welcome> {
        self.welcome.as_ref()
    }

    /// Read the optional welcome frame
    ///
    /// Only transport failures are errors here. A timeout, an unparsable frame
    /// or a frame of some other type all mean "no greeting".
    async fn greet(&mut self) -> Result<(), RadbError> {
        self.ensure_open()?;
        self.state = SessionState::Connecting;

        match self
            .channel
            .receive_timeout(self.options.greeting_timeout)
            .await
        {
            Ok(line) => match codec::decode(&line) {
                Ok(response) => match Welcome::from_response(&response) {
                    Some(welcome) => {
                        tracing::info!(
                            mode = welcome.mode.as_deref().unwrap_or("unknown"),
                            version = welcome.version.as_deref().unwrap_or("unknown"),
                            "Device greeted"
                        );
                        self.welcome = Some(welcome);
                    }
                    None => tracing::debug!(frame = %line, "First frame was not a greeting"),
                },
                Err(e) => tracing::debug!(error = %e, "Ignoring unparsable greeting"),
            },
            Err(ProtocolError::TransportTimeout(_)) => {
                tracing::debug!("No greeting from device");
            }
            Err(ProtocolError::Malformed(e)) => {
                tracing::debug!(error = %e, "Ignoring unparsable greeting");
            }
            Err(e) => return Err(e.into()),
        }

        self.state = SessionState::Connected;
        Ok(())
    }

    /// Send `request` and return the single response frame that answers it
    pub async fn request(&mut self, request: &Request) -> Result<Response, RadbError> {
        self.send(request).await?;
        let result = self.receive().await;
        // After a timeout the answer may still arrive; leave it to be drained
        if !matches!(
            result,
            Err(RadbError::Protocol(ProtocolError::TransportTimeout(_)))
        ) {
            self.complete();
        }
        result
    }

    /// Send a request without waiting for the answer
    ///
    /// Callers that use this directly must consume the response frames and
    /// then call [`Session::complete`].
    pub async fn send(&mut self, request: &Request) -> Result<(), RadbError> {
        self.ensure_open()?;
        if self.outstanding {
            self.drain_stale().await?;
        }

        let line = codec::encode(&request.to_value(self.options.dialect))?;
        tracing::debug!(kind = request.name(), bytes = line.len(), "Sending request");

        self.outstanding = true;
        self.channel.send(&line).await?;
        Ok(())
    }

    /// Receive the next response frame, bounded by the I/O timeout
    pub async fn receive(&mut self) -> Result<Response, RadbError> {
        self.next_response(true).await
    }

    /// Receive the next response frame with no timeout (for streams)
    pub async fn receive_untimed(&mut self) -> Result<Response, RadbError> {
        self.next_response(false).await
    }

    /// Mark the current exchange as fully consumed
    pub fn complete(&mut self) {
        self.outstanding = false;
    }

    /// Whether a response is still owed for an earlier request
    pub fn has_outstanding(&self) -> bool {
        self.outstanding
    }

    /// Liveness probe; accepts `{success: true}` or `{type: pong}`
    pub async fn ping(&mut self) -> Result<(), RadbError> {
        let response = self.request(&Request::Ping).await?;
        if response.bool_field("success") == Some(true) || response.kind() == Some("pong") {
            Ok(())
        } else {
            Err(RadbError::RemoteOperation(
                response
                    .error_message()
                    .unwrap_or("Unexpected ping response")
                    .to_string(),
            ))
        }
    }

    /// Release the channel and stop the tunnel helper; safe to call twice
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.channel.close().await;
        if let Some(mut tunnel) = self.tunnel.take() {
            tunnel.shutdown().await;
        }
        self.state = SessionState::Closed;
        tracing::debug!("Session closed");
    }

    fn ensure_open(&self) -> Result<(), RadbError> {
        match self.state {
            SessionState::Closed => Err(RadbError::SessionClosed),
            _ => Ok(()),
        }
    }

    async fn next_response(&mut self, timed: bool) -> Result<Response, RadbError> {
        self.ensure_open()?;
        loop {
            let line = if timed {
                self.channel.receive().await?
            } else {
                self.channel.receive_untimed().await?
            };
            let response = codec::decode(&line)?;

            // A greeting that lost the race with the greeting timeout
            if response.is_welcome() {
                tracing::debug!("Skipping late greeting");
                if self.welcome.is_none() {
                    self.welcome = Welcome::from_response(&response);
                }
                continue;
            }
            return Ok(response);
        }
    }

    /// Discard the answer to an interrupted request so replies stay aligned
    async fn drain_stale(&mut self) -> Result<(), RadbError> {
        let wait = self
            .options
            .io_timeout
            .unwrap_or(self.options.greeting_timeout);
        tracing::info!(?wait, "Waiting for the response to an interrupted request");

        match self.channel.receive_timeout(wait).await {
            Ok(line) => tracing::debug!(bytes = line.len(), "Discarded stale response"),
            Err(ProtocolError::TransportTimeout(_)) => {
                tracing::debug!("No stale response arrived");
            }
            Err(ProtocolError::Malformed(e)) => {
                tracing::debug!(error = %e, "Discarded unparsable stale response");
            }
            Err(e) => return Err(e.into()),
        }
        self.outstanding = false;
        Ok(())
    }
}
