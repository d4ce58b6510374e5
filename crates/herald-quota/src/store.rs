//! JSON file persistence.
//!
//! State files are pretty-printed so operators can read and edit them by hand.
//! Writes go to a sibling `.tmp` file first and are renamed into place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{QuotaError, QuotaState};

/// Read a JSON file. Returns `Ok(None)` if the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, QuotaError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_str(&content)?))
}

/// Write a JSON file atomically.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), QuotaError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(value)?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;

    fs::rename(&temp_path, path).await?;

    Ok(())
}

/// Durable home of the [`QuotaState`].
#[derive(Debug, Clone)]
pub struct QuotaStore {
    path: PathBuf,
}

impl QuotaStore {
    /// Default file name inside a state directory.
    pub const FILE_NAME: &'static str = "quota.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store located at `<dir>/quota.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing file yields a fresh state. An unreadable or corrupt file is
    /// logged and also yields a fresh state: quota bookkeeping is a safety
    /// brake, so startup never fails on it.
    pub async fn load(&self, now: DateTime<Utc>) -> QuotaState {
        match read_json::<QuotaState>(&self.path).await {
            Ok(Some(state)) => {
                debug!(path = %self.path.display(), daily_count = state.daily_count, "loaded quota state");
                state
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no quota state file, starting fresh");
                QuotaState::fresh(now)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "quota state unreadable, starting fresh");
                QuotaState::fresh(now)
            }
        }
    }

    /// Persist `state`.
    pub async fn save(&self, state: &QuotaState) -> Result<(), QuotaError> {
        write_json(&self.path, state).await
    }
}
