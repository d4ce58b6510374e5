//! Error types for outreach.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while wiring or flushing the outreach core.
#[derive(Debug, Error)]
pub enum OutreachError {
    /// Quota or ledger persistence error.
    #[error("quota error: {0}")]
    Quota(#[from] herald_quota::QuotaError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Normalized failure from a provider-facing call (candidate search or send).
///
/// Transports map provider-specific errors onto these two cases; the core
/// never inspects provider payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Any failure that does not change quota state.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider's own usage cap was hit and lifts at `reset_at`.
    #[error("provider cap exceeded until {reset_at}")]
    ProviderCapExceeded { reset_at: DateTime<Utc> },
}

/// Content generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content generation failed: {0}")]
pub struct GenerationError(pub String);
