//! Device log streaming

use anyhow::Result;

use radb_core::ops::{stream_log, StreamEnd};
use radb_core::{Interrupts, Session};

use crate::output::print_info;

/// Stream `command` until the device ends it or the user presses Ctrl+C
pub async fn logcat_command(
    session: &mut Session,
    command: &str,
    interrupts: &mut Interrupts,
) -> Result<()> {
    print_info("Streaming logcat (Ctrl+C to stop)...");

    let end = stream_log(
        session,
        command,
        interrupts,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await?;

    if end == StreamEnd::Interrupted {
        print_info("Stopped");
    }
    Ok(())
}
