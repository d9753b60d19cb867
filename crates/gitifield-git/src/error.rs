// error.rs — Error types for the git backend.

use thiserror::Error;

/// Errors that can occur while driving the `git` binary.
#[derive(Debug, Error)]
pub enum GitError {
    /// git exited non-zero. Carries the subcommand and whatever it printed
    /// to stderr.
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// git did not finish before the configured deadline and was killed.
    #[error("git {command} timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    /// Spawning or talking to the child process failed.
    #[error("I/O error running git: {0}")]
    Io(#[from] std::io::Error),

    /// `git log` produced a line the adapter could not parse.
    #[error("unparseable log line: {0}")]
    LogParse(String),
}

pub type Result<T> = std::result::Result<T, GitError>;
