//! Error types for pushcheck-git.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// git exited with a non-zero status.
    #[error("git {args} failed with exit code {code}: {}", .stderr.trim())]
    Command {
        /// The arguments passed to git, space-joined.
        args: String,
        /// Exit code (-1 when terminated by a signal).
        code: i32,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
        /// Working directory the command ran in.
        cwd: Option<PathBuf>,
    },

    /// git did not finish before the configured deadline and was killed.
    #[error("git {args} timed out after {timeout:?}")]
    Timeout {
        /// The arguments passed to git, space-joined.
        args: String,
        /// The deadline that expired.
        timeout: Duration,
        /// Working directory the command ran in.
        cwd: Option<PathBuf>,
    },

    /// The git binary could not be started.
    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),

    /// A submodule did not end up at its recorded commit.
    #[error("submodule {path} is stale (checked-out commit does not match the recorded one)")]
    StaleSubmodule {
        /// Path of the offending submodule, relative to the mirror root.
        path: String,
    },

    /// The remote has no `refs/heads/<branch>`.
    #[error("branch {branch} not found in {remote}")]
    BranchNotFound {
        /// Repository that was queried.
        remote: String,
        /// Branch that was looked up.
        branch: String,
    },

    /// IO error while preparing the mirror.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code of a failed git invocation, if this is one.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Captured standard output of a failed git invocation.
    ///
    /// Errors that never reached git report their message instead, so
    /// callers always have something to show the user.
    #[must_use]
    pub fn stdout(&self) -> String {
        match self {
            Self::Command { stdout, .. } => stdout.clone(),
            other => other.to_string(),
        }
    }

    /// Captured standard error of a failed git invocation.
    #[must_use]
    pub fn stderr(&self) -> String {
        match self {
            Self::Command { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the failure came from the repository contents (a merge that
    /// does not apply, a stale submodule) rather than from the environment.
    #[must_use]
    pub const fn is_git_failure(&self) -> bool {
        matches!(self, Self::Command { .. } | Self::StaleSubmodule { .. })
    }
}
