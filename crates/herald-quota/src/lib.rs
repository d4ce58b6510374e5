//! Durable quota tracking for Herald.
//!
//! This crate provides the bookkeeping behind outreach pacing:
//! - A persisted [`QuotaState`] with lazy daily rollover
//! - A [`QuotaTracker`] that answers "can I act now?" against three brakes
//!   (provider cap, minimum spacing, daily target)
//! - A [`RecipientLedger`] of recipients that must never be contacted again
//!
//! Every mutation is written through to a human-readable JSON file. Missing or
//! corrupt files load as default state.

mod error;
mod ledger;
mod policy;
mod store;
mod tracker;
mod types;

pub use error::QuotaError;
pub use ledger::RecipientLedger;
pub use policy::{Decision, Denial, DenyReason, MAX_MIN_INTERVAL_SECS, QuotaPolicy};
pub use store::QuotaStore;
pub use tracker::QuotaTracker;
pub use types::{QuotaState, QuotaStatus};
