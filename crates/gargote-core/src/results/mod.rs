pub mod export;
pub mod stats;

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, GargoteError};

// ---------------------------------------------------------------------------
// ActionEntry: one attempted action
// ---------------------------------------------------------------------------

/// Record of a single action attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ActionEntry {
    pub test_index: usize,
    pub stage_index: usize,
    /// Zero-based try of the stage this attempt belongs to.
    pub try_number: u32,
    pub action_index: usize,
    pub started_at: DateTime<Utc>,
    /// Measured duration of the attempt, failed attempts included.
    pub duration: Duration,
    pub success: bool,
    /// Why the attempt failed. Always `None` when `success` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ActionEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey {
            test_index: self.test_index,
            stage_index: self.stage_index,
            try_number: self.try_number,
            action_index: self.action_index,
        }
    }

    pub fn request_id(&self) -> RequestId {
        RequestId {
            stage_index: self.stage_index,
            action_index: self.action_index,
        }
    }
}

/// Compound key identifying an [`ActionEntry`] in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub test_index: usize,
    pub stage_index: usize,
    pub try_number: u32,
    pub action_index: usize,
}

/// Identity of a request across iterations and tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestId {
    pub stage_index: usize,
    pub action_index: usize,
}

/// Aggregate outcome of every attempt of one [`RequestId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestResults {
    pub failures: u64,
    /// Durations of successful attempts, in store order.
    pub success_durations: Vec<Duration>,
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
}

impl RequestResults {
    fn record(&mut self, entry: &ActionEntry) {
        if entry.success {
            self.success_durations.push(entry.duration);
        } else {
            self.failures += 1;
            if let Some(kind) = entry.failure {
                *self.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ResultStore: process-lifetime record of action attempts
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    entries: Vec<ActionEntry>,
    keys: HashSet<EntryKey>,
}

/// Concurrency-safe, append-only collection of [`ActionEntry`] records.
///
/// A batch becomes visible to readers all at once or not at all.
#[derive(Default)]
pub struct ResultStore {
    inner: RwLock<StoreInner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a batch of entries atomically.
    ///
    /// The whole batch is rejected when one of its keys is already stored or
    /// appears twice in the batch.
    pub fn insert_batch(&self, batch: Vec<ActionEntry>) -> Result<(), GargoteError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|e| GargoteError::Persistence(format!("result store is unusable: {e}")))?;

        let mut batch_keys = HashSet::with_capacity(batch.len());
        for entry in &batch {
            let key = entry.key();
            if inner.keys.contains(&key) || !batch_keys.insert(key) {
                return Err(GargoteError::Persistence(format!(
                    "duplicate entry for test {} stage {} try {} action {}",
                    key.test_index, key.stage_index, key.try_number, key.action_index
                )));
            }
        }

        inner.keys.extend(batch_keys);
        inner.entries.extend(batch);
        Ok(())
    }

    /// Snapshot of every entry, in insertion order.
    pub fn scan(&self) -> Vec<ActionEntry> {
        self.read().entries.clone()
    }

    /// Snapshot of every entry ordered by start time. Entries sharing a start
    /// time keep their insertion order.
    pub fn scan_by_time(&self) -> Vec<ActionEntry> {
        let mut entries = self.scan();
        entries.sort_by_key(|e| e.started_at);
        entries
    }

    /// Group every entry by [`RequestId`], collapsing test index and try
    /// number.
    pub fn request_results(&self) -> BTreeMap<RequestId, RequestResults> {
        let inner = self.read();
        let mut grouped: BTreeMap<RequestId, RequestResults> = BTreeMap::new();
        for entry in &inner.entries {
            grouped.entry(entry.request_id()).or_default().record(entry);
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Batches are checked before anything is written, so a poisoned lock
    // still guards complete batches only.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
