//! Pacing policy: the three brakes evaluated before every action.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::QuotaState;

/// Longest accepted minimum spacing between two actions, in seconds.
pub const MAX_MIN_INTERVAL_SECS: i64 = 365 * 24 * 60 * 60;

/// Self-imposed pacing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Maximum actions per UTC calendar day.
    pub daily_target: u32,
    /// Minimum spacing between two actions.
    pub min_interval: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            daily_target: 30,
            min_interval: Duration::minutes(24),
        }
    }
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The provider reported a hard usage cap that has not lifted yet.
    MonthlyCapExceeded,
    /// The previous action was less than the minimum interval ago.
    TooSoon,
    /// The daily target has been reached.
    DailyCapReached,
    /// Another attempt is already in flight.
    Busy,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenyReason::MonthlyCapExceeded => "monthly cap exceeded",
            DenyReason::TooSoon => "too soon",
            DenyReason::DailyCapReached => "daily cap reached",
            DenyReason::Busy => "busy",
        };
        f.write_str(s)
    }
}

/// A refusal with the earliest time a retry could succeed (if known).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenyReason,
    pub retry_after: Option<DateTime<Utc>>,
}

impl Denial {
    pub fn busy() -> Self {
        Self {
            reason: DenyReason::Busy,
            retry_after: None,
        }
    }
}

/// Result of a "can I act now?" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    fn denied(reason: DenyReason, retry_after: Option<DateTime<Utc>>) -> Self {
        Decision::Denied(Denial {
            reason,
            retry_after,
        })
    }
}

impl QuotaPolicy {
    /// Evaluate all brakes against `state` as observed at `now`.
    ///
    /// Pure: lazy transitions are applied to a copy.
    pub fn evaluate(&self, state: &QuotaState, now: DateTime<Utc>) -> Decision {
        self.decide(&state.advanced(now), now)
    }

    /// Evaluate only the provider cap brake.
    pub fn evaluate_provider_cap(&self, state: &QuotaState, now: DateTime<Utc>) -> Decision {
        provider_cap_decision(&state.advanced(now))
    }

    /// Evaluate brakes against a state that has already been advanced to `now`.
    pub(crate) fn decide(&self, state: &QuotaState, now: DateTime<Utc>) -> Decision {
        if let Decision::Denied(denial) = provider_cap_decision(state) {
            return Decision::Denied(denial);
        }

        if state.has_acted() {
            // Saturates so a far-future timestamp in a hand-edited file keeps
            // the brake on instead of overflowing.
            let next_allowed = state
                .last_action_timestamp
                .checked_add_signed(self.min_interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if now < next_allowed {
                return Decision::denied(DenyReason::TooSoon, Some(next_allowed));
            }
        }

        if state.daily_count >= self.daily_target {
            return Decision::denied(DenyReason::DailyCapReached, next_midnight(now));
        }

        Decision::Allowed
    }
}

fn provider_cap_decision(state: &QuotaState) -> Decision {
    if state.monthly_cap_exceeded {
        Decision::denied(DenyReason::MonthlyCapExceeded, state.monthly_cap_reset_at)
    } else {
        Decision::Allowed
    }
}

/// Start of the next UTC calendar day.
fn next_midnight(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    now.date_naive()
        .succ_opt()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn policy() -> QuotaPolicy {
        QuotaPolicy {
            daily_target: 30,
            min_interval: Duration::minutes(24),
        }
    }

    // === Unit Tests ===

    #[test]
    fn test_fresh_state_allowed() {
        let state = QuotaState::fresh(t0());
        assert_eq!(policy().evaluate(&state, t0()), Decision::Allowed);
    }

    #[test]
    fn test_too_soon_reports_retry_time() {
        let mut state = QuotaState::fresh(t0());
        state.apply_action(t0());

        let decision = policy().evaluate(&state, t0() + Duration::minutes(10));
        assert_eq!(
            decision,
            Decision::Denied(Denial {
                reason: DenyReason::TooSoon,
                retry_after: Some(t0() + Duration::minutes(24)),
            })
        );
    }

    #[test]
    fn test_exactly_min_interval_is_allowed() {
        let mut state = QuotaState::fresh(t0());
        state.apply_action(t0());
        assert!(
            policy()
                .evaluate(&state, t0() + Duration::minutes(24))
                .is_allowed()
        );
    }

    #[test]
    fn test_daily_cap_retry_is_next_midnight() {
        let mut state = QuotaState::fresh(t0());
        state.daily_count = 30;

        let decision = policy().evaluate(&state, t0());
        assert_eq!(
            decision,
            Decision::Denied(Denial {
                reason: DenyReason::DailyCapReached,
                retry_after: Some(Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()),
            })
        );
    }

    #[test]
    fn test_cap_checked_before_spacing() {
        let mut state = QuotaState::fresh(t0());
        state.apply_action(t0());
        state.apply_provider_cap(t0() + Duration::days(2));

        let decision = policy().evaluate(&state, t0() + Duration::minutes(1));
        assert!(matches!(
            decision,
            Decision::Denied(Denial {
                reason: DenyReason::MonthlyCapExceeded,
                ..
            })
        ));
    }

    #[test]
    fn test_spacing_checked_before_daily_cap() {
        let mut state = QuotaState::fresh(t0());
        state.apply_action(t0());
        state.daily_count = 30;

        let decision = policy().evaluate(&state, t0() + Duration::minutes(1));
        assert!(matches!(
            decision,
            Decision::Denied(Denial {
                reason: DenyReason::TooSoon,
                ..
            })
        ));
    }

    #[test]
    fn test_provider_cap_only_ignores_other_brakes() {
        let mut state = QuotaState::fresh(t0());
        state.apply_action(t0());
        state.daily_count = 30;

        assert!(
            policy()
                .evaluate_provider_cap(&state, t0() + Duration::seconds(1))
                .is_allowed()
        );
    }

    #[test]
    fn test_far_future_last_action_denies_without_overflow() {
        let mut state = QuotaState::fresh(t0());
        state.daily_count = 1;
        state.last_action_timestamp = DateTime::<Utc>::MAX_UTC;

        let decision = policy().evaluate(&state, t0());
        assert_eq!(
            decision,
            Decision::Denied(Denial {
                reason: DenyReason::TooSoon,
                retry_after: Some(DateTime::<Utc>::MAX_UTC),
            })
        );
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let policy = QuotaPolicy {
            daily_target: 30,
            min_interval: Duration::seconds(1_000_000_000_000_000),
        };

        assert!(policy.evaluate(&QuotaState::fresh(t0()), t0()).is_allowed());

        let mut state = QuotaState::fresh(t0());
        state.apply_action(t0());
        let decision = policy.evaluate(&state, t0() + Duration::days(3650));
        assert!(matches!(
            decision,
            Decision::Denied(Denial {
                reason: DenyReason::TooSoon,
                ..
            })
        ));
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(Decision::Denied(Denial::busy())).unwrap();
        assert_eq!(json["decision"], "denied");
        assert_eq!(json["reason"], "busy");
        assert!(json["retry_after"].is_null());
    }

    // === Property-Based Tests ===

    proptest! {
        // Within one date, count equals the number of actions, and once the target
        // is reached every check denies with DailyCapReached.
        #[test]
        fn daily_count_matches_actions(target in 1u32..50, actions in 0u32..60) {
            let policy = QuotaPolicy { daily_target: target, min_interval: Duration::zero() };
            let start = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
            let mut state = QuotaState::fresh(start);

            for i in 0..actions {
                state.apply_action(start + Duration::seconds(i as i64));
            }
            prop_assert_eq!(state.daily_count, actions);

            let check = start + Duration::hours(23);
            let decision = policy.evaluate(&state, check);
            if actions >= target {
                let is_daily_cap = matches!(
                    decision,
                    Decision::Denied(Denial { reason: DenyReason::DailyCapReached, .. })
                );
                prop_assert!(is_daily_cap);
            } else {
                prop_assert!(decision.is_allowed());
            }
        }

        // Rollover always resets the counter before any other brake is evaluated.
        #[test]
        fn rollover_resets_count(count in 0u32..1000, hour in 0u32..24) {
            let day = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
            let mut state = QuotaState::fresh(day);
            state.daily_count = count;

            let next_day = Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap();
            prop_assert_eq!(state.advanced(next_day).daily_count, 0);
            prop_assert!(policy().evaluate(&state, next_day).is_allowed());
        }

        // Two actions closer than min_interval are never both preceded by Allowed.
        #[test]
        fn spacing_is_monotonic(
            interval_mins in 1i64..120,
            offsets in prop::collection::vec(0i64..10_000, 1..40),
        ) {
            let policy = QuotaPolicy {
                daily_target: u32::MAX,
                min_interval: Duration::minutes(interval_mins),
            };
            let start = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
            let mut state = QuotaState::fresh(start);
            let mut sorted = offsets.clone();
            sorted.sort_unstable();

            let mut allowed_at: Vec<DateTime<Utc>> = Vec::new();
            for secs in sorted {
                let now = start + Duration::seconds(secs);
                if policy.evaluate(&state, now).is_allowed() {
                    state.apply_action(now);
                    allowed_at.push(now);
                }
            }

            for pair in allowed_at.windows(2) {
                prop_assert!(pair[1] - pair[0] >= policy.min_interval);
            }
        }

        // The provider cap denies strictly before its reset time and lifts at it.
        #[test]
        fn provider_cap_lifts_at_reset(reset_secs in 1i64..1_000_000, probe in 0i64..2_000_000) {
            let start = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
            let mut state = QuotaState::fresh(start);
            let reset_at = start + Duration::seconds(reset_secs);
            state.apply_provider_cap(reset_at);

            let now = start + Duration::seconds(probe);
            let decision = policy().evaluate_provider_cap(&state, now);
            if now < reset_at {
                prop_assert_eq!(
                    decision,
                    Decision::Denied(Denial {
                        reason: DenyReason::MonthlyCapExceeded,
                        retry_after: Some(reset_at),
                    })
                );
            } else {
                prop_assert!(decision.is_allowed());
            }
        }
    }
}
