//! Log streaming

use std::io::Write;

use tokio::io::{AsyncRead, AsyncWrite};

use radb_protocol::{Request, StreamFrame};

use crate::error::RadbError;
use crate::interrupt::Interrupts;
use crate::session::Session;

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The device sent its terminal output frame
    Completed,
    /// Stopped by an interrupt; a response is still outstanding
    Interrupted,
}

/// Run `command` as a stream and copy its output as it arrives
///
/// Dialect B agents send `{type: line}` frames followed by one output frame.
/// Dialect A agents answer with the output frame alone once the command
/// exits. Reads are not bounded by the session's I/O timeout.
pub async fn stream_log<T, O, E>(
    session: &mut Session<T>,
    command: &str,
    interrupts: &mut Interrupts,
    out: &mut O,
    err: &mut E,
) -> Result<StreamEnd, RadbError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    O: Write,
    E: Write,
{
    session.send(&Request::stream(command)).await?;
    tracing::debug!(command, "Streaming");

    loop {
        let response = tokio::select! {
            response = session.receive_untimed() => response?,
            _ = interrupts.wait() => {
                tracing::debug!("Stream interrupted");
                return Ok(StreamEnd::Interrupted);
            }
        };

        match StreamFrame::from_response(&response) {
            Ok(StreamFrame::Line(text)) => {
                writeln!(out, "{}", text)?;
                out.flush()?;
            }
            Ok(StreamFrame::Output(result)) => {
                session.complete();
                out.write_all(result.stdout.as_bytes())?;
                err.write_all(result.stderr.as_bytes())?;
                out.flush()?;
                err.flush()?;
                return Ok(StreamEnd::Completed);
            }
            Err(failure) => {
                session.complete();
                return Err(failure.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use crate::test_support::{spawn_agent, test_options};
    use radb_protocol::{Dialect, DEFAULT_LOG_COMMAND};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_dialect_b_lines() {
        let (stream, agent) = spawn_agent(None, |_| {
            vec![
                json!({"type": "line", "text": "I/Tag: one"}),
                json!({"type": "line", "text": "W/Tag: two"}),
                json!({"type": "output", "stdout": "", "stderr": "", "exit": 0}),
            ]
        });
        let options = SessionOptions {
            dialect: Dialect::B,
            ..test_options()
        };
        let mut session = Session::from_stream(stream, options).await.unwrap();
        let mut out = Vec::new();

        let end = stream_log(
            &mut session,
            DEFAULT_LOG_COMMAND,
            &mut Interrupts::none(),
            &mut out,
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(end, StreamEnd::Completed);
        assert!(!session.has_outstanding());
        assert_eq!(String::from_utf8(out).unwrap(), "I/Tag: one\nW/Tag: two\n");

        session.close().await;
        assert_eq!(
            agent.await.unwrap(),
            vec![Request::stream(DEFAULT_LOG_COMMAND)]
        );
    }

    #[tokio::test]
    async fn test_stream_dialect_a_single_frame() {
        let (stream, agent) = spawn_agent(None, |_| {
            vec![json!({"success": true, "output": "log line\n", "stderr": "", "exitCode": 0})]
        });
        let mut session = Session::from_stream(stream, test_options()).await.unwrap();
        let mut out = Vec::new();

        let end = stream_log(
            &mut session,
            DEFAULT_LOG_COMMAND,
            &mut Interrupts::none(),
            &mut out,
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(end, StreamEnd::Completed);
        assert_eq!(String::from_utf8(out).unwrap(), "log line\n");

        // Dialect A carries the log command in an ordinary shell request
        session.close().await;
        assert_eq!(
            agent.await.unwrap(),
            vec![Request::shell(DEFAULT_LOG_COMMAND)]
        );
    }

    #[tokio::test]
    async fn test_stream_interrupt_is_not_an_error() {
        let (stream, _agent) = spawn_agent(None, |_| {
            vec![json!({"type": "line", "text": "first"})]
        });
        let mut session = Session::from_stream(stream, test_options()).await.unwrap();
        let (tx, mut interrupts) = Interrupts::channel();
        let mut out = Vec::new();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(()).unwrap();
            tx
        });

        let end = stream_log(
            &mut session,
            "logcat",
            &mut interrupts,
            &mut out,
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(end, StreamEnd::Interrupted);
        assert!(session.has_outstanding());
        assert_eq!(String::from_utf8(out).unwrap(), "first\n");
        drop(stopper.await.unwrap());
    }

    #[tokio::test]
    async fn test_stream_error_frame() {
        let (stream, _agent) = spawn_agent(None, |_| {
            vec![json!({"type": "error", "message": "Unknown type"})]
        });
        let mut session = Session::from_stream(stream, test_options()).await.unwrap();

        let err = stream_log(
            &mut session,
            "logcat",
            &mut Interrupts::none(),
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RadbError::RemoteOperation(ref m) if m == "Unknown type"));
    }
}
