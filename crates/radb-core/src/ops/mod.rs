//! Operations built on a [`Session`](crate::session::Session)
//!
//! - [`command`]: one-shot execution and the interactive loop
//! - [`transfer`]: push and pull of whole files
//! - [`stream`]: incremental log output

pub mod command;
pub mod stream;
pub mod transfer;

pub use command::{
    execute_once, interactive_loop, LineSource, EXIT_HINT, PROMPT, WAIT_NOTICE,
};
pub use stream::{stream_log, StreamEnd};
pub use transfer::{pull, push};
