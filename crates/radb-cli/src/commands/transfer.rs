//! File push and pull commands

use std::path::Path;

use anyhow::Result;

use radb_core::ops::{pull, push};
use radb_core::Session;

use crate::output::{format_bytes, print_success};

/// Push a local file to the device
pub async fn push_command(session: &mut Session, local: &Path, remote: &str) -> Result<()> {
    let bytes = push(session, local, remote).await?;
    print_success(&format!(
        "Pushed {} -> {} ({})",
        local.display(),
        remote,
        format_bytes(bytes)
    ));
    Ok(())
}

/// Pull a device file to the local machine
pub async fn pull_command(session: &mut Session, remote: &str, local: &Path) -> Result<()> {
    let bytes = pull(session, remote, local).await?;
    print_success(&format!(
        "Pulled {} -> {} ({})",
        remote,
        local.display(),
        format_bytes(bytes)
    ));
    Ok(())
}
