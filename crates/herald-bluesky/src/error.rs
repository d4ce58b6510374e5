//! Bluesky error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with Bluesky.
#[derive(Debug, Error)]
pub enum BlueskyError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error on {endpoint}: {message}")]
    Api { endpoint: String, message: String },

    #[error("invalid identifier {value:?}: {message}")]
    InvalidIdentifier { value: String, message: String },

    #[error("failed to read target file {path}: {source}")]
    TargetFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target file {0} lists no targets")]
    NoTargets(PathBuf),
}

impl BlueskyError {
    pub(crate) fn api(endpoint: &str, error: impl std::fmt::Display) -> Self {
        Self::Api {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn invalid(value: &str, error: impl std::fmt::Display) -> Self {
        Self::InvalidIdentifier {
            value: value.to_string(),
            message: error.to_string(),
        }
    }
}
