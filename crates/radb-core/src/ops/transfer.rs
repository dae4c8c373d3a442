//! Whole-file push and pull

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncRead, AsyncWrite};

use radb_protocol::{PullOutcome, Request, TransferOutcome};

use crate::error::RadbError;
use crate::session::Session;

/// Copy a local file to `remote` on the device
///
/// Returns the number of bytes sent. A missing local file is reported before
/// anything goes over the wire.
pub async fn push<T>(
    session: &mut Session<T>,
    local: &Path,
    remote: &str,
) -> Result<usize, RadbError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    if !tokio::fs::try_exists(local).await.unwrap_or(false) {
        return Err(RadbError::LocalFileNotFound(local.to_path_buf()));
    }
    let content = tokio::fs::read(local).await?;
    let data = STANDARD.encode(&content);
    tracing::debug!(
        local = %local.display(),
        remote,
        bytes = content.len(),
        "Pushing file"
    );

    let response = session.request(&Request::push(remote, data)).await?;
    match TransferOutcome::from_response(&response) {
        TransferOutcome::Ok => Ok(content.len()),
        TransferOutcome::Failed(failure) => Err(failure.into()),
    }
}

/// Copy `remote` from the device into a local file, overwriting it
///
/// Returns the number of bytes written. On any failure the local file is left
/// as it was.
pub async fn pull<T>(
    session: &mut Session<T>,
    remote: &str,
    local: &Path,
) -> Result<usize, RadbError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let response = session.request(&Request::pull(remote)).await?;
    let data = match PullOutcome::from_response(&response) {
        PullOutcome::Data(data) => data,
        PullOutcome::Failed(failure) => return Err(failure.into()),
    };

    // Android's Base64.DEFAULT wraps lines
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let content = STANDARD.decode(compact)?;

    tokio::fs::write(local, &content).await?;
    tracing::debug!(
        remote,
        local = %local.display(),
        bytes = content.len(),
        "Pulled file"
    );
    Ok(content.len())
}
