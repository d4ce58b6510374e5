//! Provider error normalization.
//!
//! This is the only code that looks at Bluesky error text. Everything
//! downstream sees [`TransportError`].

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::debug;

use herald_outreach::TransportError;

use crate::BlueskyError;

/// Pause applied when a cap signal carries no reset time.
pub const DEFAULT_PROVIDER_CAP_FALLBACK_SECS: i64 = 24 * 60 * 60;

/// Longest accepted fallback pause.
pub const MAX_PROVIDER_CAP_FALLBACK_SECS: i64 = 365 * 24 * 60 * 60;

static CAP_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ratelimitexceeded|too many requests|rate limit exceeded|usage cap|\b429\b")
        .unwrap()
});

static RESET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)ratelimit-reset["']?\s*[:=]\s*["']?(\d{1,12})"#).unwrap());

/// Classify a provider error message.
///
/// Rate limit and usage cap signals become
/// [`TransportError::ProviderCapExceeded`]. The reset instant is the
/// `ratelimit-reset` epoch-seconds value when the message carries a future
/// one, else `now + fallback`. Anything else is a plain transport failure.
pub fn normalize_error(
    endpoint: &str,
    message: &str,
    now: DateTime<Utc>,
    fallback: Duration,
) -> TransportError {
    if !CAP_MARKER_RE.is_match(message) {
        return TransportError::Transport(format!("{endpoint}: {message}"));
    }

    let reset_at = RESET_RE
        .captures(message)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .filter(|reset_at| *reset_at > now)
        .unwrap_or_else(|| {
            now.checked_add_signed(fallback)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

    debug!(endpoint, reset_at = %reset_at, "provider cap signal");
    TransportError::ProviderCapExceeded { reset_at }
}

impl BlueskyError {
    /// Convert into the outreach error taxonomy.
    pub fn into_transport(self, now: DateTime<Utc>, fallback: Duration) -> TransportError {
        match self {
            BlueskyError::Api { endpoint, message } => {
                normalize_error(&endpoint, &message, now, fallback)
            }
            other => TransportError::Transport(other.to_string()),
        }
    }
}
