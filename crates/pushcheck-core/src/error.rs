//! Error types for pushcheck-core.

use std::path::PathBuf;

use crate::request::RequestId;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pushcheck-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request not found.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// An update matched no row (the request vanished mid-job).
    #[error("failed to update request {0}")]
    UpdateFailed(RequestId),

    /// A revision string is not a 40-character hex commit id.
    #[error("invalid revision '{0}'")]
    InvalidRevision(String),

    /// Unknown request or push state.
    #[error("invalid state '{0}'")]
    InvalidState(String),

    /// Snapshot file could not be interpreted.
    #[error("failed to parse {file}: {message}")]
    StoreParse { file: PathBuf, message: String },

    /// Configuration is present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] pushcheck_git::Error),
}
