//! Interactive shell and one-shot command execution

use std::io::Write;

use anyhow::Result;

use radb_core::ops::{execute_once, interactive_loop};
use radb_core::{Interrupts, Session};

use crate::input::StdinLines;
use crate::output::print_info;

/// Run the interactive shell until `exit`, `quit` or end of input
pub async fn shell_command(session: &mut Session, interrupts: &mut Interrupts) -> Result<()> {
    let mode = session
        .welcome()
        .and_then(|w| w.mode.clone())
        .unwrap_or_else(|| "unknown".to_string());
    print_info(&format!("Remote ADB Shell ({} mode)", mode));
    print_info("Type 'exit' to quit");

    let mut input = StdinLines::new();
    let executed = interactive_loop(
        session,
        &mut input,
        interrupts,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await?;

    tracing::debug!(executed, "Interactive shell finished");
    Ok(())
}

/// Run a single command, forwarding its output; returns the remote exit code
pub async fn exec_command(session: &mut Session, command: &str) -> Result<i32> {
    let result = execute_once(session, command).await?;

    let mut stdout = std::io::stdout();
    stdout.write_all(result.stdout.as_bytes())?;
    stdout.flush()?;

    let mut stderr = std::io::stderr();
    stderr.write_all(result.stderr.as_bytes())?;
    stderr.flush()?;

    Ok(result.exit_code)
}
