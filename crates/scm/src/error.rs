//! Error types for git host calls.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScmError {
    /// The requested object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The git host answered with a non-success status
    #[error("GitHub API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Client could not be configured
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ScmError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
