//! Scheduler loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, debug, error, info, instrument};

use crate::{Outcome, Outreach};

/// Ticks at a fixed cadence and attempts whenever quota allows.
///
/// Rate control lives in the quota tracker, not in the tick: the tick only has
/// to be shorter than the minimum spacing so that an allowed slot is noticed
/// promptly.
pub struct Scheduler {
    outreach: Arc<Outreach>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(outreach: Arc<Outreach>) -> Self {
        let tick = outreach.config().tick_interval;
        Self { outreach, tick }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    /// Run until `shutdown_rx` flips to `true` or its sender is dropped.
    ///
    /// The first tick fires immediately.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(tick_secs = self.tick.as_secs(), "scheduler starting");

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("scheduler shut down gracefully");
    }

    /// One scheduled check-and-attempt.
    ///
    /// The attempt runs in its own task, so a panicking collaborator costs one
    /// tick rather than the loop. Returns `None` in that case.
    #[instrument(skip(self), name = "tick")]
    pub async fn tick(&self) -> Option<Outcome> {
        let outreach = Arc::clone(&self.outreach);
        let handle = tokio::spawn(
            async move { outreach.run_scheduled().await }.in_current_span(),
        );
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "scheduled attempt panicked");
                return None;
            }
        };

        if let Outcome::Denied(denial) = &outcome {
            match denial.retry_after {
                Some(retry_after) => {
                    info!(reason = %denial.reason, retry_after = %retry_after, "not acting this tick")
                }
                None => info!(reason = %denial.reason, "not acting this tick"),
            }
        } else {
            debug!("tick finished");
        }

        Some(outcome)
    }
}
