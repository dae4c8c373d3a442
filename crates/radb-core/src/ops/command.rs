//! Shell command execution

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use radb_protocol::{CommandResult, Request};

use crate::error::RadbError;
use crate::interrupt::Interrupts;
use crate::session::Session;

/// Prompt shown before each interactive line
pub const PROMPT: &str = "$ ";

/// Printed when an interrupt aborts the current line
pub const EXIT_HINT: &str = "Use 'exit' to quit";

/// Printed before a command that first has to wait out an interrupted one
pub const WAIT_NOTICE: &str = "(waiting for the previous command to finish)";

/// Run one command and return its normalized result
pub async fn execute_once<T>(
    session: &mut Session<T>,
    command: &str,
) -> Result<CommandResult, RadbError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let response = session.request(&Request::shell(command)).await?;
    let result = CommandResult::from_response(&response)?;
    tracing::debug!(
        exit_code = result.exit_code,
        stdout = result.stdout.len(),
        stderr = result.stderr.len(),
        "Command finished"
    );
    Ok(result)
}

/// Where the interactive loop gets its input
#[async_trait]
pub trait LineSource: Send {
    /// Show `prompt` and read one line; `None` at end of input
    async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>>;
}

enum Step<T> {
    Done(T),
    Interrupted,
}

/// Read-eval-print loop over one session
///
/// Returns the number of commands sent. Interrupts abort only the line in
/// progress; remote failures are reported on `err` and the loop continues.
pub async fn interactive_loop<T, L, O, E>(
    session: &mut Session<T>,
    input: &mut L,
    interrupts: &mut Interrupts,
    out: &mut O,
    err: &mut E,
) -> Result<usize, RadbError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    L: LineSource + ?Sized,
    O: Write,
    E: Write,
{
    let mut executed = 0;

    loop {
        interrupts.clear();
        let line = tokio::select! {
            line = input.read_line(PROMPT) => Step::Done(line?),
            _ = interrupts.wait() => Step::Interrupted,
        };
        let line = match line {
            Step::Done(Some(line)) => line,
            Step::Done(None) => {
                tracing::debug!("End of input");
                break;
            }
            Step::Interrupted => {
                writeln!(out)?;
                writeln!(out, "{}", EXIT_HINT)?;
                continue;
            }
        };

        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit") {
            break;
        }

        executed += 1;
        if session.has_outstanding() {
            writeln!(err, "{}", WAIT_NOTICE)?;
            err.flush()?;
        }
        let step = tokio::select! {
            result = execute_once(session, command) => Step::Done(result),
            _ = interrupts.wait() => Step::Interrupted,
        };
        match step {
            Step::Done(Ok(result)) => {
                out.write_all(result.stdout.as_bytes())?;
                err.write_all(result.stderr.as_bytes())?;
            }
            Step::Done(Err(RadbError::RemoteOperation(message))) => {
                writeln!(err, "Error: {}", message)?;
            }
            Step::Done(Err(e)) => return Err(e),
            Step::Interrupted => {
                tracing::debug!(command, "Command interrupted");
                writeln!(out)?;
                writeln!(out, "{}", EXIT_HINT)?;
            }
        }
        out.flush()?;
        err.flush()?;
    }

    Ok(executed)
}
