//! Fake device agent for session and operation tests

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use radb_protocol::{Dialect, Request, MAX_LINE_LENGTH};

use crate::session::SessionOptions;

/// Options with short timeouts so tests without a greeting stay fast
pub(crate) fn test_options() -> SessionOptions {
    SessionOptions {
        dialect: Dialect::A,
        io_timeout: Some(Duration::from_secs(5)),
        greeting_timeout: Duration::from_millis(100),
        max_line_length: MAX_LINE_LENGTH,
    }
}

/// Serve requests on an in-memory stream
///
/// Each decoded request is passed to `handler`, whose frames are written back
/// in order. The task ends when the client closes its side and yields every
/// request it saw.
pub(crate) fn spawn_agent<F>(
    greeting: Option<Value>,
    mut handler: F,
) -> (DuplexStream, JoinHandle<Vec<Request>>)
where
    F: FnMut(Request) -> Vec<Value> + Send + 'static,
{
    let (client, peer) = tokio::io::duplex(1 << 20);

    let handle = tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(peer);
        let mut requests = Vec::new();

        if let Some(greeting) = greeting {
            if write_frame(&mut write, &greeting).await.is_err() {
                return requests;
            }
        }

        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let value: Value = serde_json::from_str(&line).expect("client sent invalid JSON");
            let request = Request::from_value(&value).expect("client sent an unknown request");
            requests.push(request.clone());

            for frame in handler(request) {
                if write_frame(&mut write, &frame).await.is_err() {
                    return requests;
                }
            }
        }
        requests
    });

    (client, handle)
}

async fn write_frame<W: AsyncWrite + Unpin>(write: &mut W, frame: &Value) -> std::io::Result<()> {
    let mut line = serde_json::to_string(frame).expect("frame serializes");
    line.push('\n');
    write.write_all(line.as_bytes()).await?;
    write.flush().await
}
