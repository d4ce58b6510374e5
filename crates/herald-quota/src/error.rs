//! Error types for quota bookkeeping.

use thiserror::Error;

/// Errors that can occur in quota and ledger operations.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// IO error while reading or writing a state file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Recipient was already recorded as contacted.
    #[error("recipient already contacted: {0}")]
    DuplicateRecipient(String),
}
