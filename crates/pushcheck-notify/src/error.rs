//! Error types for pushcheck-notify.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while composing or dispatching notifications.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A message template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// The web hook endpoint answered with a non-success status.
    #[error("web hook POST failed ({status}): {message}")]
    Webhook { status: u16, message: String },

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO error writing the outbox.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
