//! Candidate selection strategies.
//!
//! Every strategy excludes our own account and returns each author at most
//! once per batch. Ordering is the strategy's business; the executor takes the
//! first candidate it has not contacted yet.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use herald_outreach::{Candidate, CandidateSource, TransportError};

use crate::{BlueskyError, Directory, SearchPost};

/// How candidates are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A curated list of handles or DIDs.
    Targets,
    /// Authors of posts matching a search query.
    Search,
    /// Authors of posts mentioning our account.
    Mentions,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Targets => "targets",
            Strategy::Search => "search",
            Strategy::Mentions => "mentions",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "targets" => Ok(Strategy::Targets),
            "search" => Ok(Strategy::Search),
            "mentions" => Ok(Strategy::Mentions),
            other => Err(format!(
                "unknown strategy '{other}', expected targets, search or mentions"
            )),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a target list: one handle or DID per line, `#` starts a comment.
///
/// A leading `@` on handles is dropped. Duplicates keep their first position.
pub fn parse_targets(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .map(|line| line.trim_start_matches('@'))
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

/// Authors of `posts` as candidates, skipping `own_did` and repeat authors.
fn authors(posts: Vec<SearchPost>, own_did: &str) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| post.author_did != own_did)
        .filter(|post| seen.insert(post.author_did.clone()))
        .map(|post| {
            Candidate::new(
                post.author_did,
                post.author_handle,
                post.text.unwrap_or_default(),
            )
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Random order over a curated target file.
///
/// Targets whose DID is known to be contacted are skipped without a lookup.
/// Handles are resolved once per process and cached.
pub struct TargetListSource {
    directory: Arc<dyn Directory>,
    targets: Vec<String>,
    own_did: String,
    batch: usize,
    cap_fallback: Duration,
    contacted: Mutex<HashSet<String>>,
    resolved: Mutex<HashMap<String, String>>,
}

impl TargetListSource {
    /// Candidates returned per selection.
    pub const DEFAULT_BATCH: usize = 3;

    /// Upper bound on profile lookups per selection.
    pub const MAX_LOOKUPS: usize = 25;

    pub fn new(
        directory: Arc<dyn Directory>,
        targets: Vec<String>,
        own_did: impl Into<String>,
        cap_fallback: Duration,
    ) -> Self {
        Self {
            directory,
            targets,
            own_did: own_did.into(),
            batch: Self::DEFAULT_BATCH,
            cap_fallback,
            contacted: Mutex::new(HashSet::new()),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Load targets from `path`. An empty list is an error.
    pub async fn from_file(
        directory: Arc<dyn Directory>,
        path: &Path,
        own_did: impl Into<String>,
        cap_fallback: Duration,
    ) -> Result<Self, BlueskyError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| BlueskyError::TargetFile {
                    path: path.to_path_buf(),
                    source,
                })?;

        let targets = parse_targets(&content);
        if targets.is_empty() {
            return Err(BlueskyError::NoTargets(PathBuf::from(path)));
        }
        debug!(path = %path.display(), count = targets.len(), "loaded target list");

        Ok(Self::new(directory, targets, own_did, cap_fallback))
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Seed the recipients already contacted in earlier runs.
    pub fn with_contacted<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.contacted).extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Targets not yet known to be contacted or to be our own account.
    pub fn remaining(&self) -> usize {
        self.targets.iter().filter(|t| !self.is_settled(t)).count()
    }

    /// Whether `target` can be skipped without a lookup.
    fn is_settled(&self, target: &str) -> bool {
        let contacted = lock(&self.contacted);
        if contacted.contains(target) {
            return true;
        }
        lock(&self.resolved)
            .get(target)
            .is_some_and(|did| *did == self.own_did || contacted.contains(did))
    }
}

#[async_trait]
impl CandidateSource for TargetListSource {
    fn name(&self) -> &str {
        Strategy::Targets.as_str()
    }

    async fn select_candidates(&self) -> Result<Vec<Candidate>, TransportError> {
        let order: Vec<String> = {
            let mut rng = rand::thread_rng();
            let mut open: Vec<String> = self
                .targets
                .iter()
                .filter(|t| !self.is_settled(t))
                .cloned()
                .collect();
            open.shuffle(&mut rng);
            open
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(self.batch);
        for target in order.into_iter().take(Self::MAX_LOOKUPS) {
            if candidates.len() >= self.batch {
                break;
            }

            let profile = match self.directory.get_profile(&target).await {
                Ok(profile) => profile,
                Err(e) => match e.into_transport(Utc::now(), self.cap_fallback) {
                    cap @ TransportError::ProviderCapExceeded { .. } => return Err(cap),
                    TransportError::Transport(message) => {
                        warn!(target = %target, error = %message, "skipping unresolvable target");
                        continue;
                    }
                },
            };

            lock(&self.resolved).insert(target, profile.did.clone());

            if profile.did == self.own_did
                || lock(&self.contacted).contains(&profile.did)
                || !seen.insert(profile.did.clone())
            {
                continue;
            }
            candidates.push(Candidate::new(
                profile.did,
                profile.handle,
                profile.description.unwrap_or_default(),
            ));
        }

        Ok(candidates)
    }

    fn mark_contacted(&self, recipient_id: &str) {
        lock(&self.contacted).insert(recipient_id.to_string());
    }
}

/// Authors of recent posts matching a query.
pub struct PostSearchSource {
    directory: Arc<dyn Directory>,
    query: String,
    own_did: String,
    limit: u8,
    cap_fallback: Duration,
}

impl PostSearchSource {
    pub const DEFAULT_LIMIT: u8 = 25;

    pub fn new(
        directory: Arc<dyn Directory>,
        query: impl Into<String>,
        own_did: impl Into<String>,
        cap_fallback: Duration,
    ) -> Self {
        Self {
            directory,
            query: query.into(),
            own_did: own_did.into(),
            limit: Self::DEFAULT_LIMIT,
            cap_fallback,
        }
    }
}

#[async_trait]
impl CandidateSource for PostSearchSource {
    fn name(&self) -> &str {
        Strategy::Search.as_str()
    }

    async fn select_candidates(&self) -> Result<Vec<Candidate>, TransportError> {
        let posts = self
            .directory
            .search_posts(&self.query, None, self.limit)
            .await
            .map_err(|e| e.into_transport(Utc::now(), self.cap_fallback))?;

        Ok(authors(posts, &self.own_did))
    }
}

/// Authors of posts that mention our account.
pub struct MentionSource {
    directory: Arc<dyn Directory>,
    own_handle: String,
    own_did: String,
    limit: u8,
    cap_fallback: Duration,
}

impl MentionSource {
    pub const DEFAULT_LIMIT: u8 = 25;

    pub fn new(
        directory: Arc<dyn Directory>,
        own_handle: impl Into<String>,
        own_did: impl Into<String>,
        cap_fallback: Duration,
    ) -> Self {
        Self {
            directory,
            own_handle: own_handle.into(),
            own_did: own_did.into(),
            limit: Self::DEFAULT_LIMIT,
            cap_fallback,
        }
    }
}

#[async_trait]
impl CandidateSource for MentionSource {
    fn name(&self) -> &str {
        Strategy::Mentions.as_str()
    }

    async fn select_candidates(&self) -> Result<Vec<Candidate>, TransportError> {
        let posts = self
            .directory
            .search_posts("*", Some(&self.own_handle), self.limit)
            .await
            .map_err(|e| e.into_transport(Utc::now(), self.cap_fallback))?;

        Ok(authors(posts, &self.own_did))
    }
}
