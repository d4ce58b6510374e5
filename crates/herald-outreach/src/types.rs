//! Outreach types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use herald_quota::Denial;

/// A prospective recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable recipient identifier (a DID on Bluesky).
    pub recipient_id: String,
    /// Display handle, for logs and prompts.
    pub handle: String,
    /// Free text used when generating the message (bio, post text, ...).
    pub context: String,
}

impl Candidate {
    pub fn new(
        recipient_id: impl Into<String>,
        handle: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            handle: handle.into(),
            context: context.into(),
        }
    }
}

/// Provider acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    pub message_id: String,
}

/// Which collaborator call an attempt was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Select,
    Generate,
    Send,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Select => "select",
            Stage::Generate => "generate",
            Stage::Send => "send",
        };
        f.write_str(s)
    }
}

/// Benign reasons an attempt did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The selection collaborator returned no candidates.
    NoCandidate,
    /// Every returned candidate had already been contacted.
    AllCandidatesExhausted { checked: usize },
}

/// Why an attempt failed. Failures never consume quota.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    #[error("candidate selection failed: {message}")]
    SelectionFailed { message: String },

    #[error("content generation failed: {message}")]
    GenerationFailed { message: String },

    #[error("generated content has {chars} characters, expected {min}..={max}")]
    ContentInvalid { chars: usize, min: usize, max: usize },

    #[error("send failed: {message}")]
    SendFailed { message: String },

    #[error("provider cap exceeded during {stage} until {reset_at}")]
    ProviderCapExceeded {
        stage: Stage,
        reset_at: DateTime<Utc>,
    },

    #[error("{stage} timed out after {after_secs}s")]
    Timeout { stage: Stage, after_secs: u64 },
}

/// Result of a gated attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A message was delivered and counted.
    Sent {
        attempt_id: Uuid,
        recipient_id: String,
        handle: String,
        message_id: String,
    },
    /// Nothing to do.
    Skipped { attempt_id: Uuid, reason: SkipReason },
    /// The attempt ran and failed.
    Failed {
        attempt_id: Uuid,
        error: AttemptFailure,
    },
    /// The attempt was refused before it started.
    Denied(Denial),
}

impl Outcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent { .. })
    }
}
