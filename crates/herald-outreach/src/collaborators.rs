//! Outbound collaborators consumed by the executor.

use async_trait::async_trait;

use crate::{Candidate, GenerationError, SendAck, TransportError};

/// Supplies prospective recipients.
///
/// Implementations decide ordering; the executor takes the first candidate that
/// has not been contacted before.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &str;

    /// Fetch a batch of candidates. An empty batch means none are available.
    async fn select_candidates(&self) -> Result<Vec<Candidate>, TransportError>;

    /// Called once a message to `recipient_id` has been delivered and recorded.
    fn mark_contacted(&self, _recipient_id: &str) {}
}

/// Writes the message for a candidate.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, candidate: &Candidate) -> Result<String, GenerationError>;
}

/// Delivers a direct message.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<SendAck, TransportError>;
}
