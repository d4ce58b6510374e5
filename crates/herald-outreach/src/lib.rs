//! Outreach executor and scheduler loop for Herald.
//!
//! This crate drives direct-message outreach:
//! - [`Outreach`] runs one attempt at a time (select, dedup, generate, send, record)
//! - [`Scheduler`] ticks on a fixed cadence and attempts whenever quota allows
//! - Collaborator traits keep candidate selection, content generation and the
//!   wire transport outside the core

mod clock;
mod collaborators;
mod config;
mod error;
mod executor;
mod scheduler;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{CandidateSource, ContentGenerator, MessageTransport};
pub use config::OutreachConfig;
pub use error::{GenerationError, OutreachError, TransportError};
pub use executor::{AttemptGuard, Outreach, OutreachStatus};
pub use scheduler::Scheduler;
pub use types::{AttemptFailure, Candidate, Outcome, SendAck, SkipReason, Stage};

pub use herald_quota::{
    Decision, Denial, DenyReason, MAX_MIN_INTERVAL_SECS, QuotaPolicy, QuotaStatus,
};
