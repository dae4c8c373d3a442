//! Transport provisioning
//!
//! Turns a device id into a connectable local socket. In normal operation the
//! `cloudflared` helper is launched with `access tcp`, which listens locally
//! and forwards to `{device_id}.{domain}`; readiness is detected by probing the
//! local port until it accepts a connection.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::backoff::ExponentialBackoff;
use crate::config::{BackoffConfig, TunnelConfig};
use crate::error::ConnectError;

/// A device id and the tunnel hostname it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    device_id: String,
    hostname: String,
}

impl Endpoint {
    /// Map a device id onto `domain`
    pub fn new(device_id: impl Into<String>, domain: &str) -> Self {
        let device_id = device_id.into();
        let hostname = resolve_hostname(&device_id, domain);
        Self {
            device_id,
            hostname,
        }
    }

    /// Get the device id as given
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Get the tunnel hostname
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

/// Resolve a device id to its tunnel hostname
/// If the id already contains a dot, assumes it's already a full hostname
pub fn resolve_hostname(device_id: &str, domain: &str) -> String {
    if device_id.contains('.') {
        device_id.to_string()
    } else {
        format!("{}.{}", device_id, domain.trim_matches('.'))
    }
}

/// Produces a connectable local address for an endpoint
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Start whatever is needed so the returned address accepts connections
    async fn provision(&self, endpoint: &Endpoint) -> Result<ProvisionedTunnel, ConnectError>;
}

/// A local address plus the helper process keeping it alive
#[derive(Debug)]
pub struct ProvisionedTunnel {
    address: String,
    helper: Option<Child>,
}

impl ProvisionedTunnel {
    /// An address that needs no helper
    pub fn direct(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            helper: None,
        }
    }

    /// An address served by a spawned helper process
    pub fn with_helper(address: impl Into<String>, helper: Child) -> Self {
        Self {
            address: address.into(),
            helper: Some(helper),
        }
    }

    /// Get the local address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether a helper process backs this address
    pub fn has_helper(&self) -> bool {
        self.helper.is_some()
    }

    /// Fail if the helper has already exited
    fn check_helper(&mut self) -> Result<(), ConnectError> {
        let Some(helper) = self.helper.as_mut() else {
            return Ok(());
        };
        match helper.try_wait() {
            Ok(Some(status)) => {
                self.helper = None;
                Err(ConnectError::HelperExited {
                    status: status.to_string(),
                })
            }
            Ok(None) => Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "Could not poll tunnel helper");
                Ok(())
            }
        }
    }

    /// Stop the helper, if any
    pub async fn shutdown(&mut self) {
        if let Some(mut helper) = self.helper.take() {
            if let Err(e) = helper.kill().await {
                tracing::debug!(error = %e, "Failed to stop tunnel helper");
            }
        }
    }
}

/// Launches `cloudflared access tcp` for each endpoint
#[derive(Debug, Clone)]
pub struct CloudflaredTunnel {
    binary: String,
    local_address: String,
}

impl CloudflaredTunnel {
    /// Create a provider from the tunnel configuration
    pub fn from_config(config: &TunnelConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            local_address: config.local_address(),
        }
    }

    /// Arguments passed to the helper
    pub fn helper_args(&self, endpoint: &Endpoint) -> Vec<String> {
        vec![
            "access".to_string(),
            "tcp".to_string(),
            "--hostname".to_string(),
            endpoint.hostname().to_string(),
            "--url".to_string(),
            self.local_address.clone(),
        ]
    }
}

#[async_trait]
impl TunnelProvider for CloudflaredTunnel {
    async fn provision(&self, endpoint: &Endpoint) -> Result<ProvisionedTunnel, ConnectError> {
        let args = self.helper_args(endpoint);
        tracing::debug!(binary = %self.binary, ?args, "Launching tunnel helper");

        let helper = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConnectError::HelperMissing {
                        binary: self.binary.clone(),
                    }
                } else {
                    ConnectError::HelperSpawn {
                        binary: self.binary.clone(),
                        source: e,
                    }
                }
            })?;

        tracing::info!(
            hostname = %endpoint.hostname(),
            local = %self.local_address,
            pid = ?helper.id(),
            "Tunnel helper started"
        );
        Ok(ProvisionedTunnel::with_helper(
            self.local_address.clone(),
            helper,
        ))
    }
}

/// Connects straight to a fixed address, skipping the helper
#[derive(Debug, Clone)]
pub struct DirectTunnel {
    address: String,
}

impl DirectTunnel {
    /// Create a provider for a fixed `host:port`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl TunnelProvider for DirectTunnel {
    async fn provision(&self, endpoint: &Endpoint) -> Result<ProvisionedTunnel, ConnectError> {
        tracing::debug!(
            device = %endpoint.device_id(),
            address = %self.address,
            "Using direct address"
        );
        Ok(ProvisionedTunnel::direct(self.address.clone()))
    }
}

/// Open a TCP stream to the provisioned address
///
/// Helper-backed addresses are probed with backoff until `timeout` elapses,
/// since the helper needs a moment before it listens. Direct addresses get a
/// single attempt bounded by `timeout`.
pub async fn wait_for_listener(
    tunnel: &mut ProvisionedTunnel,
    timeout: Duration,
    backoff: &BackoffConfig,
) -> Result<TcpStream, ConnectError> {
    let deadline = Instant::now() + timeout;
    let mut backoff = ExponentialBackoff::from_config(backoff);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tunnel.check_helper()?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let error = match tokio::time::timeout(remaining, TcpStream::connect(tunnel.address()))
            .await
        {
            Ok(Ok(stream)) => {
                tracing::debug!(attempt, address = %tunnel.address(), "Local endpoint ready");
                return Ok(stream);
            }
            Ok(Err(e)) => e,
            Err(_) => std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        };

        if !tunnel.has_helper() {
            return Err(ConnectError::Socket {
                address: tunnel.address().to_string(),
                source: error,
            });
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ConnectError::NotReady {
                address: tunnel.address().to_string(),
                timeout,
                last_error: error.to_string(),
            });
        }

        let delay = std::cmp::min(backoff.next_delay(), remaining);
        tracing::trace!(attempt, error = %error, ?delay, "Local endpoint not ready");
        tokio::time::sleep(delay).await;
    }
}

/// Get platform-specific instructions for installing the tunnel helper
pub fn get_install_instructions() -> String {
    #[cfg(target_os = "macos")]
    {
        r#"cloudflared is not installed. Install it with:

    brew install cloudflared

Or download from: https://developers.cloudflare.com/cloudflare-one/connections/connect-networks/downloads/"#
            .to_string()
    }

    #[cfg(target_os = "windows")]
    {
        r#"cloudflared is not installed. Install it with:

    winget install --id Cloudflare.cloudflared

Or download from: https://developers.cloudflare.com/cloudflare-one/connections/connect-networks/downloads/"#
            .to_string()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        r#"cloudflared is not installed. Download it from:

    https://developers.cloudflare.com/cloudflare-one/connections/connect-networks/downloads/

and make sure it is on your PATH (or set tunnel.binary in config.toml)."#
            .to_string()
    }
}
