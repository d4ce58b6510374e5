//! `GET /status` response body.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use herald_outreach::{Decision, DenyReason, OutreachStatus};

/// Quota snapshot plus fields derived for humans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub now: DateTime<Utc>,
    pub strategy: String,
    pub daily_count: u32,
    pub daily_target: u32,
    pub daily_reset_date: NaiveDate,
    pub monthly_cap_exceeded: bool,
    pub monthly_cap_reset_at: Option<DateTime<Utc>>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub min_interval_secs: i64,
    pub minutes_since_last_action: Option<i64>,
    /// Zero when a scheduled attempt would be allowed now.
    pub minutes_until_next_action: Option<i64>,
    pub next_action_at: Option<DateTime<Utc>>,
    /// The brake currently holding back scheduled attempts.
    pub blocked_by: Option<DenyReason>,
    pub contacted_count: usize,
    pub attempt_in_flight: bool,
}

impl From<OutreachStatus> for StatusResponse {
    fn from(status: OutreachStatus) -> Self {
        let now = status.now;
        let quota = status.quota;

        let (next_action_at, blocked_by) = match status.decision {
            Decision::Allowed => (Some(now), None),
            Decision::Denied(denial) => (denial.retry_after, Some(denial.reason)),
        };

        // Round up so "0 minutes" only ever means "now".
        let minutes_until_next_action = next_action_at.map(|at| {
            let secs = (at - now).num_seconds().max(0);
            (secs + 59) / 60
        });

        Self {
            now,
            strategy: status.strategy,
            daily_count: quota.daily_count,
            daily_target: quota.daily_target,
            daily_reset_date: quota.daily_reset_date,
            monthly_cap_exceeded: quota.monthly_cap_exceeded,
            monthly_cap_reset_at: quota.monthly_cap_reset_at,
            last_action_at: quota.last_action_at,
            min_interval_secs: quota.min_interval_secs,
            minutes_since_last_action: quota.last_action_at.map(|at| (now - at).num_minutes()),
            minutes_until_next_action,
            next_action_at,
            blocked_by,
            contacted_count: status.contacted_count,
            attempt_in_flight: status.attempt_in_flight,
        }
    }
}
