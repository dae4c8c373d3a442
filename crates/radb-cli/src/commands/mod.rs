//! CLI command implementations
//!
//! Everything after the device id selects one [`Action`]; the remaining
//! modules run it against a connected session.

mod logcat;
mod shell;
mod transfer;

pub use logcat::logcat_command;
pub use shell::{exec_command, shell_command};
pub use transfer::{pull_command, push_command};

use std::path::PathBuf;

use thiserror::Error;

/// What to do once connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Interactive shell
    Shell,
    /// Run one command; its words are joined with spaces
    Exec(String),
    /// Copy a local file to the device
    Push { local: PathBuf, remote: String },
    /// Copy a device file to the local machine
    Pull { remote: String, local: PathBuf },
    /// Stream the device log
    Logcat,
}

/// Malformed action arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("push expects exactly two arguments: push <local> <remote>")]
    Push,
    #[error("pull expects exactly two arguments: pull <remote> <local>")]
    Pull,
    #[error("'{0}' takes no arguments")]
    UnexpectedArguments(&'static str),
}

impl Action {
    /// Interpret the words that follow the device id
    pub fn from_args(args: &[String]) -> Result<Self, UsageError> {
        let Some((first, rest)) = args.split_first() else {
            return Ok(Action::Shell);
        };

        match first.as_str() {
            "shell" if rest.is_empty() => Ok(Action::Shell),
            "shell" => Err(UsageError::UnexpectedArguments("shell")),
            "logcat" if rest.is_empty() => Ok(Action::Logcat),
            "logcat" => Err(UsageError::UnexpectedArguments("logcat")),
            "push" => match rest {
                [local, remote] => Ok(Action::Push {
                    local: PathBuf::from(local),
                    remote: remote.clone(),
                }),
                _ => Err(UsageError::Push),
            },
            "pull" => match rest {
                [remote, local] => Ok(Action::Pull {
                    remote: remote.clone(),
                    local: PathBuf::from(local),
                }),
                _ => Err(UsageError::Pull),
            },
            _ => Ok(Action::Exec(args.join(" "))),
        }
    }

    /// Whether this action may be interrupted with Ctrl+C without exiting
    pub fn is_interactive(&self) -> bool {
        matches!(self, Action::Shell | Action::Logcat)
    }
}
