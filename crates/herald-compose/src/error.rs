//! Error types for message composition.

use thiserror::Error;

/// Errors from the chat completions client.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API.
    #[error("chat completions returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The model returned no text.
    #[error("model returned empty content")]
    EmptyContent,
}
