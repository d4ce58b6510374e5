//! Outreach executor.
//!
//! One attempt walks `select → dedup → generate → validate → send → record`
//! and stops at the first exit. Quota and ledger are only mutated on a
//! successful send, with one exception: a provider cap signal from any
//! provider-facing call is always recorded.
//!
//! At most one attempt runs at a time. Callers take an [`AttemptGuard`] first;
//! a second caller is refused with `Busy` instead of queueing.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use herald_quota::{Decision, Denial, QuotaStatus, QuotaTracker, RecipientLedger};

use crate::{
    AttemptFailure, Candidate, CandidateSource, Clock, ContentGenerator, MessageTransport,
    Outcome, OutreachConfig, OutreachError, SkipReason, Stage, SystemClock, TransportError,
};

/// Proof that the caller holds the single-attempt gate.
pub struct AttemptGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Mutable bookkeeping, only written while the gate is held.
struct Books {
    tracker: QuotaTracker,
    ledger: RecipientLedger,
}

/// Snapshot for operators.
#[derive(Debug, Clone, Serialize)]
pub struct OutreachStatus {
    pub now: DateTime<Utc>,
    pub quota: QuotaStatus,
    /// What a scheduled check would decide right now.
    pub decision: Decision,
    pub contacted_count: usize,
    pub attempt_in_flight: bool,
    pub strategy: String,
}

/// The outreach executor.
pub struct Outreach {
    config: OutreachConfig,
    books: RwLock<Books>,
    gate: Arc<Mutex<()>>,
    source: Arc<dyn CandidateSource>,
    generator: Arc<dyn ContentGenerator>,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
}

impl Outreach {
    /// Create an executor over loaded quota and ledger state.
    pub fn new(
        config: OutreachConfig,
        tracker: QuotaTracker,
        ledger: RecipientLedger,
        source: Arc<dyn CandidateSource>,
        generator: Arc<dyn ContentGenerator>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            config,
            books: RwLock::new(Books { tracker, ledger }),
            gate: Arc::new(Mutex::new(())),
            source,
            generator,
            transport,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &OutreachConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Take the single-attempt gate without waiting.
    pub fn try_begin(&self) -> Option<AttemptGuard> {
        Arc::clone(&self.gate)
            .try_lock_owned()
            .ok()
            .map(|guard| AttemptGuard { _guard: guard })
    }

    /// Whether an attempt currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Timer path: all brakes apply.
    pub async fn run_scheduled(&self) -> Outcome {
        let Some(guard) = self.try_begin() else {
            return Outcome::Denied(Denial::busy());
        };

        let now = self.clock.now();
        let decision = self.books.write().await.tracker.can_act(now).await;
        match decision {
            Decision::Allowed => self.attempt(&guard).await,
            Decision::Denied(denial) => Outcome::Denied(denial),
        }
    }

    /// Operator path: bypasses spacing and the daily target, never the
    /// provider cap.
    pub async fn trigger(&self) -> Outcome {
        let Some(guard) = self.try_begin() else {
            return Outcome::Denied(Denial::busy());
        };

        let now = self.clock.now();
        let decision = self
            .books
            .write()
            .await
            .tracker
            .check_provider_cap(now)
            .await;
        match decision {
            Decision::Allowed => {
                info!("manual trigger accepted");
                self.attempt(&guard).await
            }
            Decision::Denied(denial) => Outcome::Denied(denial),
        }
    }

    /// Clear today's counter. Refused while an attempt is in flight.
    pub async fn reset_daily(&self) -> Result<(), Denial> {
        let _guard = self.try_begin().ok_or_else(Denial::busy)?;
        self.books.write().await.tracker.reset_daily().await;
        Ok(())
    }

    pub async fn status(&self) -> OutreachStatus {
        let now = self.clock.now();
        let books = self.books.read().await;
        OutreachStatus {
            now,
            quota: books.tracker.status_at(now),
            decision: books.tracker.evaluate(now),
            contacted_count: books.ledger.len(),
            attempt_in_flight: self.is_busy(),
            strategy: self.source.name().to_string(),
        }
    }

    pub async fn is_contacted(&self, recipient_id: &str) -> bool {
        self.books.read().await.ledger.is_contacted(recipient_id)
    }

    /// Write quota and ledger state to disk.
    pub async fn flush(&self) -> Result<(), OutreachError> {
        let books = self.books.read().await;
        books.tracker.flush().await?;
        books.ledger.flush().await?;
        Ok(())
    }

    /// Run one attempt. The guard proves no other attempt is in flight.
    pub async fn attempt(&self, _guard: &AttemptGuard) -> Outcome {
        let attempt_id = Uuid::new_v4();
        let span = info_span!("attempt", %attempt_id, strategy = %self.source.name());

        async {
            let outcome = match self.run_stages(attempt_id).await {
                Ok(outcome) => outcome,
                Err(error) => Outcome::Failed { attempt_id, error },
            };

            match &outcome {
                Outcome::Sent {
                    recipient_id,
                    handle,
                    ..
                } => info!(recipient = %recipient_id, handle = %handle, "outreach sent"),
                Outcome::Skipped { reason, .. } => info!(reason = ?reason, "outreach skipped"),
                Outcome::Failed { error, .. } => warn!(error = %error, "outreach failed"),
                Outcome::Denied(denial) => info!(reason = %denial.reason, "outreach denied"),
            }

            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, attempt_id: Uuid) -> Result<Outcome, AttemptFailure> {
        let candidates = match self
            .bounded(Stage::Select, self.source.select_candidates())
            .await?
        {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.transport_failure(Stage::Select, e).await),
        };

        if candidates.is_empty() {
            return Ok(Outcome::Skipped {
                attempt_id,
                reason: SkipReason::NoCandidate,
            });
        }

        let checked = candidates.len();
        let Some(candidate) = self.first_uncontacted(candidates).await else {
            return Ok(Outcome::Skipped {
                attempt_id,
                reason: SkipReason::AllCandidatesExhausted { checked },
            });
        };
        debug!(recipient = %candidate.recipient_id, handle = %candidate.handle, "selected candidate");

        let text = self
            .bounded(Stage::Generate, self.generator.generate(&candidate))
            .await?
            .map_err(|e| AttemptFailure::GenerationFailed { message: e.0 })?;
        let text = self.validate_content(&text)?;

        let ack = match self
            .bounded(Stage::Send, self.transport.send(&candidate.recipient_id, text))
            .await?
        {
            Ok(ack) => ack,
            Err(e) => return Err(self.transport_failure(Stage::Send, e).await),
        };

        self.record_success(&candidate).await;

        Ok(Outcome::Sent {
            attempt_id,
            recipient_id: candidate.recipient_id,
            handle: candidate.handle,
            message_id: ack.message_id,
        })
    }

    async fn first_uncontacted(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        let books = self.books.read().await;
        candidates
            .into_iter()
            .find(|c| !books.ledger.is_contacted(&c.recipient_id))
    }

    /// Trimmed text if its length is within bounds.
    fn validate_content<'a>(&self, text: &'a str) -> Result<&'a str, AttemptFailure> {
        let trimmed = text.trim();
        let chars = trimmed.chars().count();
        let (min, max) = (self.config.min_content_chars, self.config.max_content_chars);

        if chars < min || chars > max {
            return Err(AttemptFailure::ContentInvalid { chars, min, max });
        }

        Ok(trimmed)
    }

    async fn bounded<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = T>,
    ) -> Result<T, AttemptFailure> {
        tokio::time::timeout(self.config.call_timeout, call)
            .await
            .map_err(|_| AttemptFailure::Timeout {
                stage,
                after_secs: self.config.call_timeout.as_secs(),
            })
    }

    async fn transport_failure(&self, stage: Stage, error: TransportError) -> AttemptFailure {
        match error {
            TransportError::ProviderCapExceeded { reset_at } => {
                self.books
                    .write()
                    .await
                    .tracker
                    .record_provider_cap_exceeded(reset_at)
                    .await;
                AttemptFailure::ProviderCapExceeded { stage, reset_at }
            }
            TransportError::Transport(message) => match stage {
                Stage::Select => AttemptFailure::SelectionFailed { message },
                _ => AttemptFailure::SendFailed { message },
            },
        }
    }

    async fn record_success(&self, candidate: &Candidate) {
        let now = self.clock.now();
        let mut books = self.books.write().await;
        books.tracker.record_action(now).await;
        if let Err(e) = books
            .ledger
            .record_contacted(&candidate.recipient_id, now)
            .await
        {
            error!(recipient = %candidate.recipient_id, error = %e, "ledger rejected a sent recipient");
        }
        drop(books);

        self.source.mark_contacted(&candidate.recipient_id);
    }
}
