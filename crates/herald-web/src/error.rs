//! Error types for the control surface.

use thiserror::Error;

/// Errors that can occur while serving.
#[derive(Debug, Error)]
pub enum WebError {
    /// Could not bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error while serving.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
