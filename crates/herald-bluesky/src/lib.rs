//! Bluesky integration for Herald.
//!
//! Provides the chat DM transport, the candidate selection strategies, and
//! the one place where Bluesky error text is turned into outreach errors.

mod client;
mod error;
mod normalize;
mod sources;
mod transport;
mod types;

pub use client::{BlueskyClient, Directory};
pub use error::BlueskyError;
pub use normalize::{
    DEFAULT_PROVIDER_CAP_FALLBACK_SECS, MAX_PROVIDER_CAP_FALLBACK_SECS, normalize_error,
};
pub use sources::{MentionSource, PostSearchSource, Strategy, TargetListSource, parse_targets};
pub use transport::BlueskyTransport;
pub use types::{Profile, SearchPost};
