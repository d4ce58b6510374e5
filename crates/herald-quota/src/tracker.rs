//! Quota tracker: the write-through owner of [`QuotaState`].

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{Decision, QuotaError, QuotaPolicy, QuotaState, QuotaStatus, QuotaStore};

/// Answers "can I act now?" and records actions.
///
/// The tracker exclusively owns its [`QuotaState`]. Every mutation, including
/// the lazy transitions performed while checking, is written through to the
/// [`QuotaStore`]. A failed write is logged and the in-memory state is kept.
pub struct QuotaTracker {
    store: QuotaStore,
    policy: QuotaPolicy,
    state: QuotaState,
}

impl QuotaTracker {
    /// Load state from `store`, falling back to a fresh state.
    pub async fn open(store: QuotaStore, policy: QuotaPolicy, now: DateTime<Utc>) -> Self {
        let state = store.load(now).await;
        Self::with_state(store, policy, state)
    }

    /// Create a tracker around an already-loaded state.
    pub fn with_state(store: QuotaStore, policy: QuotaPolicy, state: QuotaState) -> Self {
        Self {
            store,
            policy,
            state,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn state(&self) -> &QuotaState {
        &self.state
    }

    /// Check all brakes at `now`, applying lazy transitions.
    ///
    /// Order: provider cap (cleared if expired), daily rollover, spacing, daily
    /// target.
    pub async fn can_act(&mut self, now: DateTime<Utc>) -> Decision {
        self.advance(now).await;
        self.policy.decide(&self.state, now)
    }

    /// Check only the provider cap brake, applying lazy transitions.
    ///
    /// Used for operator-triggered attempts, which bypass spacing and the daily
    /// target but never the provider's own limit.
    pub async fn check_provider_cap(&mut self, now: DateTime<Utc>) -> Decision {
        self.advance(now).await;
        self.policy.evaluate_provider_cap(&self.state, now)
    }

    /// Preview [`can_act`](Self::can_act) without side effects.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Decision {
        self.policy.evaluate(&self.state, now)
    }

    /// Count one action performed at `now`.
    pub async fn record_action(&mut self, now: DateTime<Utc>) {
        self.state.apply_action(now);
        info!(
            daily_count = self.state.daily_count,
            daily_target = self.policy.daily_target,
            "recorded action"
        );
        self.persist().await;
    }

    /// Record a normalized provider cap signal lifting at `reset_at`.
    pub async fn record_provider_cap_exceeded(&mut self, reset_at: DateTime<Utc>) {
        self.state.apply_provider_cap(reset_at);
        warn!(reset_at = %reset_at, "provider usage cap exceeded, pausing until reset");
        self.persist().await;
    }

    /// Clear today's counter. Leaves the provider cap untouched.
    pub async fn reset_daily(&mut self) {
        let previous = self.state.daily_count;
        self.state.daily_count = 0;
        info!(previous, "daily count reset");
        self.persist().await;
    }

    /// Read-only snapshot.
    pub fn status(&self) -> QuotaStatus {
        self.snapshot(&self.state)
    }

    /// Snapshot as it will look once lazy transitions at `now` are applied.
    /// Nothing is mutated or persisted.
    pub fn status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        self.snapshot(&self.state.advanced(now))
    }

    fn snapshot(&self, state: &QuotaState) -> QuotaStatus {
        QuotaStatus {
            daily_count: state.daily_count,
            daily_target: self.policy.daily_target,
            daily_reset_date: state.daily_reset_date,
            monthly_cap_exceeded: state.monthly_cap_exceeded,
            monthly_cap_reset_at: state.monthly_cap_reset_at,
            last_action_at: state.has_acted().then_some(state.last_action_timestamp),
            min_interval_secs: self.policy.min_interval.num_seconds(),
        }
    }

    /// Write the current state, surfacing any error.
    pub async fn flush(&self) -> Result<(), QuotaError> {
        self.store.save(&self.state).await
    }

    async fn advance(&mut self, now: DateTime<Utc>) {
        let next = self.state.advanced(now);
        if next == self.state {
            return;
        }

        if self.state.monthly_cap_exceeded && !next.monthly_cap_exceeded {
            info!("provider usage cap lifted");
        }
        if self.state.daily_reset_date != next.daily_reset_date {
            info!(
                previous_count = self.state.daily_count,
                date = %next.daily_reset_date,
                "daily counter rolled over"
            );
        }

        self.state = next;
        self.persist().await;
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.state).await {
            warn!(path = %self.store.path().display(), error = %e, "failed to persist quota state");
        }
    }
}
