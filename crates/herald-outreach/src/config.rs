//! Outreach configuration.

use std::time::Duration;

use herald_quota::{MAX_MIN_INTERVAL_SECS, QuotaPolicy};

use crate::OutreachError;

/// Tunables for the executor and scheduler.
#[derive(Debug, Clone)]
pub struct OutreachConfig {
    /// Daily target and minimum spacing.
    pub policy: QuotaPolicy,
    /// Scheduler tick period. Must be shorter than the minimum spacing.
    pub tick_interval: Duration,
    /// Upper bound on each collaborator call.
    pub call_timeout: Duration,
    /// Minimum characters in a generated message (after trimming).
    pub min_content_chars: usize,
    /// Maximum characters the provider accepts in one message.
    pub max_content_chars: usize,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            policy: QuotaPolicy::default(),
            tick_interval: Duration::from_secs(5 * 60),
            call_timeout: Duration::from_secs(60),
            min_content_chars: 20,
            // Bluesky chat messages are limited to 1000 characters.
            max_content_chars: 1000,
        }
    }
}

impl OutreachConfig {
    pub fn validate(&self) -> Result<(), OutreachError> {
        if self.policy.daily_target == 0 {
            return Err(OutreachError::InvalidConfig(
                "daily target must be at least 1".to_string(),
            ));
        }

        let min_interval = self
            .policy
            .min_interval
            .to_std()
            .map_err(|_| OutreachError::InvalidConfig("min interval must be positive".to_string()))?;
        if self.policy.min_interval.num_seconds() > MAX_MIN_INTERVAL_SECS {
            return Err(OutreachError::InvalidConfig(format!(
                "min interval must be at most {MAX_MIN_INTERVAL_SECS}s"
            )));
        }
        if self.tick_interval.is_zero() || self.tick_interval >= min_interval {
            return Err(OutreachError::InvalidConfig(format!(
                "tick interval ({}s) must be non-zero and shorter than min interval ({}s)",
                self.tick_interval.as_secs(),
                min_interval.as_secs()
            )));
        }

        if self.call_timeout.is_zero() {
            return Err(OutreachError::InvalidConfig(
                "call timeout must be non-zero".to_string(),
            ));
        }

        if self.min_content_chars == 0 || self.min_content_chars > self.max_content_chars {
            return Err(OutreachError::InvalidConfig(format!(
                "content bounds invalid: min {} max {}",
                self.min_content_chars, self.max_content_chars
            )));
        }

        Ok(())
    }
}
