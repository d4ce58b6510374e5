//! Recipient ledger: the permanent record of who has been contacted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::QuotaError;
use crate::store::{read_json, write_json};

/// Durable set of contacted recipient ids.
///
/// Persisted as a JSON object mapping recipient id to the epoch milliseconds of
/// contact. Entries never expire.
#[derive(Debug)]
pub struct RecipientLedger {
    path: PathBuf,
    entries: BTreeMap<String, i64>,
}

impl RecipientLedger {
    /// Default file name inside a state directory.
    pub const FILE_NAME: &'static str = "contacted.json";

    /// Load the ledger at `path`. Missing or corrupt files load as empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_json::<BTreeMap<String, i64>>(&path).await {
            Ok(Some(entries)) => {
                debug!(path = %path.display(), count = entries.len(), "loaded recipient ledger");
                entries
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "recipient ledger unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    /// Ledger located at `<dir>/contacted.json`.
    pub async fn open_in_dir(dir: &Path) -> Self {
        Self::open(dir.join(Self::FILE_NAME)).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_contacted(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// When `id` was contacted, if ever.
    pub fn contacted_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(id)
            .and_then(|millis| DateTime::from_timestamp_millis(*millis))
    }

    /// Every contacted id, in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `id` as contacted at `now`.
    ///
    /// Fails with [`QuotaError::DuplicateRecipient`] if already present. A
    /// failed write is logged; the entry stays recorded in memory.
    pub async fn record_contacted(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), QuotaError> {
        if self.is_contacted(id) {
            return Err(QuotaError::DuplicateRecipient(id.to_string()));
        }

        self.entries.insert(id.to_string(), now.timestamp_millis());
        info!(recipient = %id, total = self.entries.len(), "recorded contacted recipient");

        if let Err(e) = write_json(&self.path, &self.entries).await {
            warn!(path = %self.path.display(), error = %e, "failed to persist recipient ledger");
        }

        Ok(())
    }

    /// Write the current ledger, surfacing any error.
    pub async fn flush(&self) -> Result<(), QuotaError> {
        write_json(&self.path, &self.entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn records_and_reports_contacts() {
        let dir = tempdir().unwrap();
        let mut ledger = RecipientLedger::open_in_dir(dir.path()).await;
        assert!(ledger.is_empty());

        ledger.record_contacted("did:plc:alice", now()).await.unwrap();

        assert!(ledger.is_contacted("did:plc:alice"));
        assert!(!ledger.is_contacted("did:plc:bob"));
        assert_eq!(ledger.contacted_at("did:plc:alice"), Some(now()));
        assert_eq!(ledger.len(), 1);

        ledger.record_contacted("did:plc:aaron", now()).await.unwrap();
        assert_eq!(
            ledger.ids().collect::<Vec<_>>(),
            vec!["did:plc:aaron", "did:plc:alice"]
        );
    }

    #[tokio::test]
    async fn second_record_is_duplicate() {
        let dir = tempdir().unwrap();
        let mut ledger = RecipientLedger::open_in_dir(dir.path()).await;

        ledger.record_contacted("did:plc:alice", now()).await.unwrap();
        let err = ledger
            .record_contacted("did:plc:alice", now() + chrono::Duration::days(400))
            .await
            .unwrap_err();

        assert!(matches!(err, QuotaError::DuplicateRecipient(id) if id == "did:plc:alice"));
        assert_eq!(ledger.contacted_at("did:plc:alice"), Some(now()));
    }

    #[tokio::test]
    async fn persists_as_id_to_millis_object() {
        let dir = tempdir().unwrap();
        let mut ledger = RecipientLedger::open_in_dir(dir.path()).await;
        ledger.record_contacted("did:plc:alice", now()).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("contacted.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["did:plc:alice"], now().timestamp_millis());

        let reopened = RecipientLedger::open_in_dir(dir.path()).await;
        assert!(reopened.is_contacted("did:plc:alice"));
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("contacted.json"), "[1, 2, 3]").unwrap();

        let ledger = RecipientLedger::open_in_dir(dir.path()).await;
        assert!(ledger.is_empty());
    }

    proptest! {
        // For any sequence of ids, exactly one record per distinct id succeeds.
        #[test]
        fn at_most_one_record_per_id(ids in prop::collection::vec("[a-d]", 1..30)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let dir = tempdir().unwrap();

            let (successes, duplicates, distinct) = rt.block_on(async {
                let mut ledger = RecipientLedger::open_in_dir(dir.path()).await;
                let mut successes = 0usize;
                let mut duplicates = 0usize;
                for id in &ids {
                    match ledger.record_contacted(id, now()).await {
                        Ok(()) => successes += 1,
                        Err(QuotaError::DuplicateRecipient(_)) => duplicates += 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                (successes, duplicates, ledger.len())
            });

            prop_assert_eq!(successes, distinct);
            prop_assert_eq!(successes + duplicates, ids.len());
        }
    }
}
