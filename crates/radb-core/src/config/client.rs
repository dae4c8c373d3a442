//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use radb_protocol::{Dialect, DEFAULT_LOG_COMMAND, MAX_LINE_LENGTH};

use super::serde_utils::{duration_millis, duration_secs};
use crate::error::ConfigError;

/// Domain appended to device ids to form the tunnel hostname
pub const DEFAULT_DOMAIN: &str = "676967.xyz";

/// Top-level `config.toml` layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadbConfig {
    /// Transport provisioning
    pub tunnel: TunnelConfig,
    /// Protocol session behaviour
    pub session: SessionConfig,
}

impl RadbConfig {
    /// Reject values that would make every connection fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tunnel.domain.trim().is_empty() {
            return Err(ConfigError::Invalid("tunnel.domain must not be empty".into()));
        }
        if self.tunnel.local_port == 0 {
            return Err(ConfigError::Invalid("tunnel.local_port must not be 0".into()));
        }
        if self.tunnel.backoff.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "tunnel.backoff.multiplier must be at least 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tunnel.backoff.jitter) {
            return Err(ConfigError::Invalid(
                "tunnel.backoff.jitter must be between 0.0 and 1.0".into(),
            ));
        }
        if self.session.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "session.max_line_length must not be 0".into(),
            ));
        }
        Ok(())
    }
}

/// How the local tunnel endpoint is provisioned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Domain the device id is prefixed to
    pub domain: String,

    /// Tunnel helper executable
    pub binary: String,

    /// Host the helper listens on
    pub local_host: String,

    /// Port the helper listens on
    pub local_port: u16,

    /// How long to keep probing the local endpoint before giving up
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Delay between connect probes
    pub backoff: BackoffConfig,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            binary: "cloudflared".to_string(),
            local_host: "127.0.0.1".to_string(),
            local_port: 15555,
            connect_timeout: Duration::from_secs(15),
            backoff: BackoffConfig::default(),
        }
    }
}

impl TunnelConfig {
    /// Get the local endpoint address (host:port)
    pub fn local_address(&self) -> String {
        format!("{}:{}", self.local_host, self.local_port)
    }
}

/// Session and protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Request dialect sent to the device
    pub dialect: Dialect,

    /// Read timeout for request/response exchanges (0 disables it)
    #[serde(with = "duration_secs")]
    pub io_timeout: Duration,

    /// How long to wait for the optional welcome frame
    #[serde(with = "duration_millis")]
    pub greeting_timeout: Duration,

    /// Largest frame accepted from the device, in bytes
    pub max_line_length: usize,

    /// Command run by `logcat`
    pub log_command: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::A,
            io_timeout: Duration::from_secs(30),
            greeting_timeout: Duration::from_millis(3000),
            max_line_length: MAX_LINE_LENGTH,
            log_command: DEFAULT_LOG_COMMAND.to_string(),
        }
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
