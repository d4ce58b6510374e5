//! Subcommands that work on the state directory without logging in.
//!
//! These read and write the same files as a running daemon. Resetting while a
//! daemon is running is overwritten by the daemon's next write; use
//! `POST /reset` instead.

use std::path::Path;

use chrono::Utc;
use miette::Result;
use serde_json::json;
use tracing::info;

use herald_quota::{QuotaStore, QuotaTracker, RecipientLedger};

use crate::config::QuotaArgs;

pub async fn status(state_dir: &Path, quota: &QuotaArgs) -> Result<()> {
    let now = Utc::now();
    let tracker = QuotaTracker::open(QuotaStore::in_dir(state_dir), quota.policy(), now).await;
    let ledger = RecipientLedger::open_in_dir(state_dir).await;

    let report = json!({
        "state_dir": state_dir.display().to_string(),
        "quota": tracker.status_at(now),
        "decision": tracker.evaluate(now),
        "contacted_count": ledger.len(),
    });
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| miette::miette!("failed to render status: {}", e))?;
    println!("{rendered}");

    Ok(())
}

pub async fn reset(state_dir: &Path, quota: &QuotaArgs) -> Result<()> {
    let now = Utc::now();
    let mut tracker = QuotaTracker::open(QuotaStore::in_dir(state_dir), quota.policy(), now).await;

    tracker.reset_daily().await;
    tracker
        .flush()
        .await
        .map_err(|e| miette::miette!("failed to write quota state: {}", e))?;

    info!(state_dir = %state_dir.display(), "daily counter reset");
    println!("daily counter reset");
    Ok(())
}
