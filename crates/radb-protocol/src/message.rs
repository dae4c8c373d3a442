//! Message types for the radb protocol
//!
//! Requests are built by the client and serialized per [`Dialect`]. Responses
//! are kept as raw JSON objects and normalized on demand, because the remote
//! agent exists in two variants that answer with different field names:
//!
//! | | dialect A | dialect B |
//! |---|---|---|
//! | shell | `{success, output, stderr, exitCode}` | `{type: output, stdout, stderr, exit}` |
//! | pull | `{success, data}` | `{type: file, data}` |
//! | push | `{success}` / `{success: false, error}` | `{type: ok}` / `{type: error, message}` |
//! | stream | one shell-style response | `{type: line, text}`* then an output frame |
//!
//! Both variants may greet with `{type: welcome, mode, version}` right after
//! the connection opens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ProtocolError;

/// Command used by log streaming when none is given
pub const DEFAULT_LOG_COMMAND: &str = "logcat -v time";

/// Request naming convention the client speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `command` key, log streaming via a plain `shell` request
    #[default]
    A,
    /// `cmd` key, log streaming via a dedicated `stream` request
    B,
}

impl Dialect {
    /// Key that carries command text in shell and stream requests
    pub fn command_key(&self) -> &'static str {
        match self {
            Dialect::A => "command",
            Dialect::B => "cmd",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::A => write!(f, "a"),
            Dialect::B => write!(f, "b"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(Dialect::A),
            "b" => Ok(Dialect::B),
            other => Err(format!("unknown dialect '{}' (expected 'a' or 'b')", other)),
        }
    }
}

/// A request sent to the remote agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Run a command and return its full output
    Shell { command: String },
    /// Write base64-encoded bytes to a remote path
    Push { path: String, data: String },
    /// Read a remote file back as base64
    Pull { path: String },
    /// Run a long-lived command whose output may arrive incrementally
    Stream { command: String },
    /// Liveness probe
    Ping,
}

impl Request {
    /// Create a shell request
    pub fn shell(command: impl Into<String>) -> Self {
        Request::Shell {
            command: command.into(),
        }
    }

    /// Create a push request; `data` must already be base64
    pub fn push(path: impl Into<String>, data: impl Into<String>) -> Self {
        Request::Push {
            path: path.into(),
            data: data.into(),
        }
    }

    /// Create a pull request
    pub fn pull(path: impl Into<String>) -> Self {
        Request::Pull { path: path.into() }
    }

    /// Create a stream request
    pub fn stream(command: impl Into<String>) -> Self {
        Request::Stream {
            command: command.into(),
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::Shell { .. } => "shell",
            Request::Push { .. } => "push",
            Request::Pull { .. } => "pull",
            Request::Stream { .. } => "stream",
            Request::Ping => "ping",
        }
    }

    /// Build the JSON object for this request in the given dialect
    pub fn to_value(&self, dialect: Dialect) -> Value {
        let mut map = Map::new();
        match self {
            Request::Shell { command } => {
                map.insert("type".into(), "shell".into());
                map.insert(dialect.command_key().into(), command.as_str().into());
            }
            Request::Stream { command } => {
                let kind = match dialect {
                    Dialect::A => "shell",
                    Dialect::B => "stream",
                };
                map.insert("type".into(), kind.into());
                map.insert(dialect.command_key().into(), command.as_str().into());
            }
            Request::Push { path, data } => {
                map.insert("type".into(), "push".into());
                map.insert("path".into(), path.as_str().into());
                map.insert("data".into(), data.as_str().into());
            }
            Request::Pull { path } => {
                map.insert("type".into(), "pull".into());
                map.insert("path".into(), path.as_str().into());
            }
            Request::Ping => {
                map.insert("type".into(), "ping".into());
            }
        }
        Value::Object(map)
    }

    /// Interpret a JSON object as a request, accepting either dialect
    ///
    /// A dialect A log stream is indistinguishable from a shell request and
    /// parses as [`Request::Shell`].
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let object = value
            .as_object()
            .ok_or_else(|| ProtocolError::Malformed("request is not a JSON object".into()))?;
        let field = |key: &str| object.get(key).and_then(Value::as_str);
        let required = |key: &str| {
            field(key)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::Malformed(format!("request is missing '{}'", key)))
        };
        let command = || {
            field("command")
                .or_else(|| field("cmd"))
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::Malformed("request is missing a command".into()))
        };

        match field("type") {
            Some("shell") => Ok(Request::Shell { command: command()? }),
            Some("stream") | Some("logcat") => Ok(Request::Stream { command: command()? }),
            Some("push") => Ok(Request::Push {
                path: required("path")?,
                data: required("data")?,
            }),
            Some("pull") => Ok(Request::Pull {
                path: required("path")?,
            }),
            Some("ping") => Ok(Request::Ping),
            Some(other) => Err(ProtocolError::Malformed(format!(
                "unknown request type '{}'",
                other
            ))),
            None => Err(ProtocolError::Malformed("request has no type".into())),
        }
    }
}

/// A response frame from the remote agent, kept as the raw JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    /// Get the `type` tag, if any
    pub fn kind(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// Get a string field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Get a boolean field
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Get an integer field
    pub fn int_field(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Whether the object carries the given key at all
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether this is the optional greeting frame
    pub fn is_welcome(&self) -> bool {
        self.kind() == Some("welcome")
    }

    /// Whether the peer flagged the request as failed in either dialect
    pub fn is_failure(&self) -> bool {
        self.bool_field("success") == Some(false) || self.kind() == Some("error")
    }

    /// Peer-supplied failure text: `error`, then `message`
    pub fn error_message(&self) -> Option<&str> {
        self.str_field("error").or_else(|| self.str_field("message"))
    }

    /// Consume into the underlying object
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn failure(&self) -> RemoteFailure {
        RemoteFailure(self.error_message().unwrap_or("Unknown error").to_string())
    }
}

impl From<Map<String, Value>> for Response {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A failure reported by the remote agent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RemoteFailure(pub String);

/// Optional greeting sent by the agent after accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    /// Operating mode (e.g. "shizuku", "root")
    pub mode: Option<String>,
    /// Agent protocol version
    pub version: Option<String>,
}

impl Welcome {
    /// Extract the greeting from a frame, if it is one
    pub fn from_response(response: &Response) -> Option<Self> {
        if !response.is_welcome() {
            return None;
        }
        Some(Self {
            mode: response.str_field("mode").map(str::to_string),
            version: response.str_field("version").map(str::to_string),
        })
    }
}

/// Normalized result of a shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

type CommandStrategy = fn(&Response) -> Option<CommandResult>;

/// Parse strategies tried in order; the first one that recognizes a key wins.
const COMMAND_STRATEGIES: [CommandStrategy; 2] = [command_dialect_a, command_dialect_b];

fn command_dialect_a(response: &Response) -> Option<CommandResult> {
    if !response.has("output") && !response.has("exitCode") {
        return None;
    }
    Some(CommandResult {
        stdout: response.str_field("output").unwrap_or_default().to_string(),
        stderr: response.str_field("stderr").unwrap_or_default().to_string(),
        exit_code: exit_code(response, "exitCode"),
    })
}

fn command_dialect_b(response: &Response) -> Option<CommandResult> {
    if !response.has("stdout") && !response.has("exit") {
        return None;
    }
    Some(CommandResult {
        stdout: response.str_field("stdout").unwrap_or_default().to_string(),
        stderr: response.str_field("stderr").unwrap_or_default().to_string(),
        exit_code: exit_code(response, "exit"),
    })
}

/// Missing means success; a code that is present but unusable must not
fn exit_code(response: &Response, key: &str) -> i32 {
    match response.0.get(key) {
        None | Some(Value::Null) => 0,
        Some(value) => value
            .as_i64()
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or(1),
    }
}

impl CommandResult {
    /// Normalize a shell response from either dialect
    ///
    /// Missing fields are empty and a missing exit code is 0. A frame that
    /// carries no output fields but flags an error is a [`RemoteFailure`].
    pub fn from_response(response: &Response) -> Result<Self, RemoteFailure> {
        if let Some(result) = COMMAND_STRATEGIES
            .iter()
            .find_map(|strategy| strategy(response))
        {
            return Ok(result);
        }

        if response.is_failure() {
            return Err(response.failure());
        }

        Ok(Self {
            stderr: response.str_field("stderr").unwrap_or_default().to_string(),
            ..Self::default()
        })
    }
}

/// Outcome of a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Ok,
    Failed(RemoteFailure),
}

impl TransferOutcome {
    /// Dialect A signals success with `success: true`, dialect B with `type: ok`
    pub fn from_response(response: &Response) -> Self {
        if response.bool_field("success") == Some(true) || response.kind() == Some("ok") {
            TransferOutcome::Ok
        } else {
            TransferOutcome::Failed(response.failure())
        }
    }
}

/// Outcome of a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Base64 payload, possibly with MIME line breaks
    Data(String),
    Failed(RemoteFailure),
}

impl PullOutcome {
    /// Accepts `{success: true, data}` or `{type: file, data}`
    pub fn from_response(response: &Response) -> Self {
        let accepted =
            response.bool_field("success") == Some(true) || response.kind() == Some("file");
        match response.str_field("data") {
            Some(data) if accepted => PullOutcome::Data(data.to_string()),
            _ => PullOutcome::Failed(response.failure()),
        }
    }
}

/// One frame of a log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental line (dialect B)
    Line(String),
    /// Terminal frame carrying the captured output
    Output(CommandResult),
}

impl StreamFrame {
    /// Classify a frame received while streaming
    pub fn from_response(response: &Response) -> Result<Self, RemoteFailure> {
        if response.kind() == Some("line") {
            let text = response.str_field("text").unwrap_or_default();
            return Ok(StreamFrame::Line(text.to_string()));
        }
        CommandResult::from_response(response).map(StreamFrame::Output)
    }

    /// Whether the stream ends after this frame
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::Output(_))
    }
}
