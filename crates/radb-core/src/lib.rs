//! radb-core: Session engine for the radb remote shell client
//!
//! This crate provides configuration, transport provisioning, the protocol
//! session, and the operations built on it (command execution, file
//! transfer, log streaming) used by the `radb` binary.

pub mod backoff;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod ops;
pub mod session;
pub mod tunnel;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ConfigError, ConnectError, RadbError};
pub use interrupt::{InterruptSender, Interrupts};
pub use session::{Session, SessionOptions, SessionState};
pub use tunnel::{CloudflaredTunnel, DirectTunnel, Endpoint, ProvisionedTunnel, TunnelProvider};
