//! Core error types for radb

use std::path::PathBuf;
use std::time::Duration;

use radb_protocol::{ProtocolError, RemoteFailure};
use thiserror::Error;

/// Top-level error type for radb operations
#[derive(Error, Debug)]
pub enum RadbError {
    /// Could not establish the connection
    #[error("Connection failed: {0}")]
    Connect(#[from] ConnectError),

    /// Transport or framing failure mid-session
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The session was closed before the request
    #[error("Session is closed")]
    SessionClosed,

    /// Push source does not exist
    #[error("{} not found", .0.display())]
    LocalFileNotFound(PathBuf),

    /// The device reported a failure
    #[error("{0}")]
    RemoteOperation(String),

    /// The device sent a file payload that is not valid base64
    #[error("Invalid file payload from device: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RemoteFailure> for RadbError {
    fn from(failure: RemoteFailure) -> Self {
        RadbError::RemoteOperation(failure.0)
    }
}

impl RadbError {
    /// Whether the connection behind the session is unusable after this error
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RadbError::Connect(_)
                | RadbError::SessionClosed
                | RadbError::Protocol(
                    ProtocolError::TransportWrite(_)
                        | ProtocolError::TransportTimeout(_)
                        | ProtocolError::ConnectionClosed
                        | ProtocolError::Io(_)
                )
        )
    }
}

/// Transport provisioning and socket-open errors
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The tunnel helper executable could not be found
    #[error("Tunnel helper '{binary}' not found")]
    HelperMissing { binary: String },

    /// The tunnel helper could not be started
    #[error("Failed to launch tunnel helper '{binary}': {source}")]
    HelperSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The tunnel helper quit before the local endpoint came up
    #[error("Tunnel helper exited before the tunnel was ready ({status})")]
    HelperExited { status: String },

    /// Nothing accepted connections on the local endpoint in time
    #[error("Timed out after {timeout:?} waiting for {address}: {last_error}")]
    NotReady {
        address: String,
        timeout: Duration,
        last_error: String,
    },

    /// The socket could not be opened
    #[error("Failed to connect to {address}: {source}")]
    Socket {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
