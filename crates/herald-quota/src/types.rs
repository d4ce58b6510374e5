//! Quota types.

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Persisted consumption counters and provider cap flags.
///
/// Serialized as:
///
/// ```json
/// {
///   "dailyCount": 3,
///   "dailyResetDate": "2026-10-18",
///   "lastActionTimestamp": 1760781600000,
///   "monthlyCapExceeded": false,
///   "monthlyCapResetAt": null
/// }
/// ```
///
/// `lastActionTimestamp` is epoch milliseconds, `monthlyCapResetAt` epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
    /// Actions taken since the last daily reset.
    #[serde(default)]
    pub daily_count: u32,
    /// UTC date for which `daily_count` is valid.
    #[serde(default = "epoch_date")]
    pub daily_reset_date: NaiveDate,
    /// Time of the most recent action (epoch 0 if none yet).
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    pub last_action_timestamp: DateTime<Utc>,
    /// Set when the provider reports a hard usage cap.
    #[serde(default)]
    pub monthly_cap_exceeded: bool,
    /// When the provider cap lifts. Only meaningful while the flag is set.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub monthly_cap_reset_at: Option<DateTime<Utc>>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

impl QuotaState {
    /// A never-used state keyed to the date of `now`.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            daily_count: 0,
            daily_reset_date: now.date_naive(),
            last_action_timestamp: epoch(),
            monthly_cap_exceeded: false,
            monthly_cap_reset_at: None,
        }
    }

    /// Whether an action has ever been recorded.
    pub fn has_acted(&self) -> bool {
        self.last_action_timestamp > epoch()
    }

    /// The state as it should be observed at `now`.
    ///
    /// Applies the two lazy transitions: an expired provider cap is cleared and
    /// the daily counter is rolled over when the UTC date has changed.
    pub fn advanced(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();

        if next.monthly_cap_exceeded && next.monthly_cap_reset_at.is_none_or(|at| now >= at) {
            next.monthly_cap_exceeded = false;
            next.monthly_cap_reset_at = None;
        }

        let today = now.date_naive();
        if next.daily_reset_date != today {
            next.daily_count = 0;
            next.daily_reset_date = today;
        }

        next
    }

    /// Count one action at `now`.
    ///
    /// The timestamp is truncated to millisecond precision so the in-memory
    /// value matches what is written to disk.
    pub fn apply_action(&mut self, now: DateTime<Utc>) {
        *self = self.advanced(now);
        self.daily_count = self.daily_count.saturating_add(1);
        self.last_action_timestamp = now.trunc_subsecs(3);
    }

    /// Record a provider-level usage cap lifting at `reset_at`.
    ///
    /// Stored at second precision, rounded up so the cap never lifts early.
    pub fn apply_provider_cap(&mut self, reset_at: DateTime<Utc>) {
        let whole = reset_at.trunc_subsecs(0);
        let reset_at = if whole < reset_at {
            whole
                .checked_add_signed(Duration::seconds(1))
                .unwrap_or(whole)
        } else {
            whole
        };
        self.monthly_cap_exceeded = true;
        self.monthly_cap_reset_at = Some(reset_at);
    }
}

/// Read-only snapshot of the tracker for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub daily_count: u32,
    pub daily_target: u32,
    pub daily_reset_date: NaiveDate,
    pub monthly_cap_exceeded: bool,
    pub monthly_cap_reset_at: Option<DateTime<Utc>>,
    /// `None` until the first action is recorded.
    pub last_action_at: Option<DateTime<Utc>>,
    pub min_interval_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_fresh_state_has_not_acted() {
        let state = QuotaState::fresh(at(2026, 10, 18, 9, 0));
        assert!(!state.has_acted());
        assert_eq!(state.daily_count, 0);
        assert_eq!(
            state.daily_reset_date,
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
        );
    }

    #[test]
    fn test_advanced_rolls_over_on_new_date() {
        let mut state = QuotaState::fresh(at(2026, 10, 18, 23, 0));
        state.daily_count = 7;

        let same_day = state.advanced(at(2026, 10, 18, 23, 59));
        assert_eq!(same_day.daily_count, 7);

        let next_day = state.advanced(at(2026, 10, 19, 0, 1));
        assert_eq!(next_day.daily_count, 0);
        assert_eq!(
            next_day.daily_reset_date,
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }

    #[test]
    fn test_advanced_keeps_cap_until_reset() {
        let now = at(2026, 10, 18, 12, 0);
        let mut state = QuotaState::fresh(now);
        state.apply_provider_cap(now + Duration::days(3));

        assert!(state.advanced(now + Duration::days(1)).monthly_cap_exceeded);

        let lifted = state.advanced(now + Duration::days(3));
        assert!(!lifted.monthly_cap_exceeded);
        assert!(lifted.monthly_cap_reset_at.is_none());
    }

    #[test]
    fn test_provider_cap_rounds_reset_up() {
        let now = at(2026, 10, 18, 12, 0);
        let reset_at = now + Duration::hours(1) + Duration::milliseconds(250);
        let mut state = QuotaState::fresh(now);
        state.apply_provider_cap(reset_at);

        let stored = now + Duration::hours(1) + Duration::seconds(1);
        assert_eq!(state.monthly_cap_reset_at, Some(stored));
        assert!(state.advanced(reset_at).monthly_cap_exceeded);
        assert!(!state.advanced(stored).monthly_cap_exceeded);

        let mut exact = QuotaState::fresh(now);
        exact.apply_provider_cap(now + Duration::hours(1));
        assert_eq!(exact.monthly_cap_reset_at, Some(now + Duration::hours(1)));
    }

    #[test]
    fn test_cap_without_reset_time_lifts_immediately() {
        let now = at(2026, 10, 18, 12, 0);
        let mut state = QuotaState::fresh(now);
        state.monthly_cap_exceeded = true;

        assert!(!state.advanced(now).monthly_cap_exceeded);
    }

    #[test]
    fn test_apply_action_truncates_to_millis() {
        let now = at(2026, 10, 18, 12, 0) + Duration::nanoseconds(1_234_567);
        let mut state = QuotaState::fresh(now);
        state.apply_action(now);

        assert_eq!(state.daily_count, 1);
        assert_eq!(
            state.last_action_timestamp,
            at(2026, 10, 18, 12, 0) + Duration::milliseconds(1)
        );
    }

    #[test]
    fn test_apply_action_after_midnight_starts_new_count() {
        let mut state = QuotaState::fresh(at(2026, 10, 18, 22, 0));
        state.apply_action(at(2026, 10, 18, 22, 0));
        state.apply_action(at(2026, 10, 18, 23, 0));
        assert_eq!(state.daily_count, 2);

        state.apply_action(at(2026, 10, 19, 0, 30));
        assert_eq!(state.daily_count, 1);
    }

    #[test]
    fn test_serialized_field_names_and_units() {
        let mut state = QuotaState::fresh(at(2026, 10, 18, 0, 0));
        state.apply_action(at(2026, 10, 18, 12, 0));
        state.apply_provider_cap(at(2026, 11, 1, 0, 0));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["dailyCount"], 1);
        assert_eq!(json["dailyResetDate"], "2026-10-18");
        assert_eq!(
            json["lastActionTimestamp"],
            at(2026, 10, 18, 12, 0).timestamp_millis()
        );
        assert_eq!(json["monthlyCapExceeded"], true);
        assert_eq!(json["monthlyCapResetAt"], at(2026, 11, 1, 0, 0).timestamp());
    }

    #[test]
    fn test_deserializes_hand_edited_partial_file() {
        let state: QuotaState = serde_json::from_str(r#"{ "dailyCount": 4 }"#).unwrap();
        assert_eq!(state.daily_count, 4);
        assert!(!state.has_acted());
        assert!(!state.monthly_cap_exceeded);
        assert!(state.monthly_cap_reset_at.is_none());
    }
}
