//! チェックポイント管理 - ソースごとの既読フィンガープリントの永続記録
//!
//! Design:
//! - The persisted artifact is the per-source map
//!   `{ source: { last_check, seen: { fingerprint: entry } } }`.
//! - A global in-memory index (fingerprint -> source) is rehydrated at
//!   load so `has_seen` never scans; the artifact stays the single
//!   source of truth.
//! - Every mutating call flushes atomically before returning.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Fingerprint, ItemRecord, ItemStatus, Priority};
use crate::error::{HeraldError, Result};
use crate::persist::StateFile;
use crate::queue::QueueManager;

/// What the checkpoint remembers about one seen fingerprint: enough
/// metadata to rehydrate an [`ItemRecord`] for archival or re-entry
/// after a crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEntry {
    pub first_seen: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub priority: Priority,

    /// Last known status, mirrored by the scheduler on resolution so
    /// the eviction sweep archives the right category.
    pub status: ItemStatus,

    #[serde(default)]
    pub retry_count: u32,
}

/// Durable memory for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCheckpoint {
    /// Timestamp of the most recent successful scan of this source.
    pub last_check: Option<DateTime<Utc>>,

    pub seen: BTreeMap<Fingerprint, SeenEntry>,
}

/// Persisted checkpoint artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointData {
    pub sources: BTreeMap<String, SourceCheckpoint>,
}

/// Durable set of previously-seen item fingerprints per source, with
/// age-based eviction.
#[derive(Debug)]
pub struct CheckpointStore {
    data: CheckpointData,
    /// fingerprint -> owning source; rebuilt from `data` at load.
    index: HashMap<Fingerprint, String>,
    file: StateFile<CheckpointData>,
}

impl CheckpointStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let (data, file) = StateFile::load(path);
        let store = Self::rehydrate(data, file);
        info!(
            sources = store.data.sources.len(),
            seen = store.seen_len(),
            "checkpoint loaded"
        );
        store
    }

    pub fn in_memory() -> Self {
        let (data, file) = StateFile::volatile();
        Self::rehydrate(data, file)
    }

    fn rehydrate(data: CheckpointData, file: StateFile<CheckpointData>) -> Self {
        let mut index = HashMap::new();
        for (source, checkpoint) in &data.sources {
            for fingerprint in checkpoint.seen.keys() {
                index.insert(fingerprint.clone(), source.clone());
            }
        }
        Self { data, index, file }
    }

    /// Pure lookup, no side effect.
    pub fn has_seen(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    /// Record a newly discovered item as seen. Defensive invariant
    /// check: a second insert without an intervening eviction is a
    /// caller defect.
    pub fn record_seen(&mut self, item: &ItemRecord) -> Result<()> {
        if self.has_seen(&item.fingerprint) {
            return Err(HeraldError::DuplicateFingerprint(item.fingerprint.clone()));
        }
        let entry = SeenEntry {
            first_seen: item.first_seen,
            title: item.title.clone(),
            url: item.url.clone(),
            priority: item.priority,
            status: item.status,
            retry_count: item.retry_count,
        };
        self.data
            .sources
            .entry(item.source.clone())
            .or_default()
            .seen
            .insert(item.fingerprint.clone(), entry);
        self.index
            .insert(item.fingerprint.clone(), item.source.clone());
        self.flush()
    }

    /// Advance a source's last-check timestamp. Monotonic: an earlier
    /// timestamp errors unless `allow_rewind` is set (backfill/tests).
    pub fn update_last_check(
        &mut self,
        source: &str,
        timestamp: DateTime<Utc>,
        allow_rewind: bool,
    ) -> Result<()> {
        let checkpoint = self.data.sources.entry(source.to_string()).or_default();
        if let Some(stored) = checkpoint.last_check
            && timestamp < stored
            && !allow_rewind
        {
            return Err(HeraldError::NonMonotonicTimestamp {
                feed: source.to_string(),
                stored,
                proposed: timestamp,
            });
        }
        checkpoint.last_check = Some(timestamp);
        self.flush()
    }

    pub fn last_check(&self, source: &str) -> Option<DateTime<Utc>> {
        self.data.sources.get(source)?.last_check
    }

    /// Mirror an item's resolution into the seen entry, so a later
    /// eviction archives it under the right status. Unknown
    /// fingerprints are ignored (the entry may already be evicted).
    pub fn mark_resolved(
        &mut self,
        fingerprint: &Fingerprint,
        status: ItemStatus,
        retry_count: u32,
    ) -> Result<()> {
        let Some(source) = self.index.get(fingerprint) else {
            debug!(%fingerprint, "mark_resolved on unknown fingerprint; ignoring");
            return Ok(());
        };
        let entry = self
            .data
            .sources
            .get_mut(source)
            .and_then(|c| c.seen.get_mut(fingerprint));
        if let Some(entry) = entry {
            entry.status = status;
            entry.retry_count = retry_count;
            self.flush()?;
        }
        Ok(())
    }

    /// First phase of eviction: collect entries whose `first_seen` is
    /// older than `cutoff` and whose queue status is terminal or absent
    /// from the live queue. Actively queued or in-flight work is never
    /// selected, regardless of age.
    ///
    /// Non-terminal last-known statuses (an aged `discovered` that
    /// never queued, an aged `failed` whose queue entry is gone) are
    /// rehydrated as `archived`: terminal by age.
    pub fn expired(&self, cutoff: DateTime<Utc>, queue: &QueueManager) -> Vec<ItemRecord> {
        let mut records = Vec::new();
        for (source, checkpoint) in &self.data.sources {
            for (fingerprint, entry) in &checkpoint.seen {
                if entry.first_seen >= cutoff {
                    continue;
                }
                let live = queue
                    .status_of(fingerprint)
                    .is_some_and(|status| !status.is_terminal());
                if live {
                    continue;
                }
                let status = if entry.status.is_terminal() {
                    entry.status
                } else {
                    ItemStatus::Archived
                };
                records.push(ItemRecord {
                    fingerprint: fingerprint.clone(),
                    source: source.clone(),
                    title: entry.title.clone(),
                    url: entry.url.clone(),
                    first_seen: entry.first_seen,
                    priority: entry.priority,
                    status,
                    retry_count: entry.retry_count,
                });
            }
        }
        records
    }

    /// Second phase of eviction: remove the given fingerprints, once
    /// the caller has durably archived them.
    pub fn evict(&mut self, fingerprints: &[Fingerprint]) -> Result<()> {
        let mut removed = 0usize;
        for fingerprint in fingerprints {
            let Some(source) = self.index.remove(fingerprint) else {
                continue;
            };
            if let Some(checkpoint) = self.data.sources.get_mut(&source)
                && checkpoint.seen.remove(fingerprint).is_some()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "evicted checkpoint entries");
            self.flush()?;
        }
        Ok(())
    }

    /// Both eviction phases in one call, for callers that archive the
    /// returned records themselves. The pipeline uses the two-phase
    /// form so records are durably archived before removal.
    pub fn evict_older_than(
        &mut self,
        cutoff: DateTime<Utc>,
        queue: &QueueManager,
    ) -> Result<Vec<ItemRecord>> {
        let records = self.expired(cutoff, queue);
        let fingerprints: Vec<Fingerprint> =
            records.iter().map(|r| r.fingerprint.clone()).collect();
        self.evict(&fingerprints)?;
        Ok(records)
    }

    pub fn seen_len(&self) -> usize {
        self.index.len()
    }

    pub fn source_count(&self) -> usize {
        self.data.sources.len()
    }

    fn flush(&mut self) -> Result<()> {
        self.file.save(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    use crate::domain::Candidate;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    fn item(fp: &str, source: &str, first_seen: DateTime<Utc>) -> ItemRecord {
        let candidate = Candidate {
            fingerprint: fp.to_string(),
            source: source.to_string(),
            title: format!("title for {fp}"),
            url: format!("https://example.org/{fp}"),
            priority: Priority::Normal,
        };
        ItemRecord::discovered(Fingerprint::new(fp).unwrap(), &candidate, first_seen)
    }

    #[test]
    fn has_seen_flips_exactly_once() {
        let mut store = CheckpointStore::in_memory();
        let record = item("a", "Nature", ts(1, 0));

        assert!(!store.has_seen(&record.fingerprint));
        store.record_seen(&record).unwrap();
        assert!(store.has_seen(&record.fingerprint));
    }

    #[test]
    fn duplicate_record_seen_is_a_defect() {
        let mut store = CheckpointStore::in_memory();
        let record = item("a", "Nature", ts(1, 0));

        store.record_seen(&record).unwrap();
        assert!(matches!(
            store.record_seen(&record),
            Err(HeraldError::DuplicateFingerprint(_))
        ));
    }

    #[test]
    fn last_check_is_monotonic() {
        let mut store = CheckpointStore::in_memory();
        store.update_last_check("Nature", ts(2, 0), false).unwrap();

        let err = store.update_last_check("Nature", ts(1, 0), false).unwrap_err();
        let HeraldError::NonMonotonicTimestamp { feed, stored, proposed } = err else {
            panic!("expected a non-monotonic timestamp error");
        };
        assert_eq!(feed, "Nature");
        assert_eq!((stored, proposed), (ts(2, 0), ts(1, 0)));
        assert_eq!(store.last_check("Nature"), Some(ts(2, 0)));

        // Equal timestamp is fine (monotonic, not strictly increasing).
        store.update_last_check("Nature", ts(2, 0), false).unwrap();

        // Explicit override allows backfill.
        store.update_last_check("Nature", ts(1, 0), true).unwrap();
        assert_eq!(store.last_check("Nature"), Some(ts(1, 0)));
    }

    #[test]
    fn eviction_skips_live_queue_entries() {
        let mut store = CheckpointStore::in_memory();
        let mut queue = QueueManager::in_memory();

        let old_sent = item("sent", "Nature", ts(1, 0));
        let old_queued = item("queued", "Nature", ts(1, 0));
        store.record_seen(&old_sent).unwrap();
        store.record_seen(&old_queued).unwrap();
        store
            .mark_resolved(&old_sent.fingerprint, ItemStatus::Sent, 0)
            .unwrap();
        queue.enqueue(old_queued.clone(), ts(1, 0)).unwrap();

        let cutoff = ts(1, 0) + Duration::days(31);
        let evicted = store.evict_older_than(cutoff, &queue).unwrap();

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].fingerprint, old_sent.fingerprint);
        assert_eq!(evicted[0].status, ItemStatus::Sent);
        assert!(!store.has_seen(&old_sent.fingerprint));
        // The queued item survives regardless of age.
        assert!(store.has_seen(&old_queued.fingerprint));
    }

    #[test]
    fn aged_discovered_entry_is_archived_by_age() {
        let mut store = CheckpointStore::in_memory();
        let queue = QueueManager::in_memory();

        let orphan = item("orphan", "Science", ts(1, 0));
        store.record_seen(&orphan).unwrap();

        let evicted = store
            .evict_older_than(ts(1, 0) + Duration::days(31), &queue)
            .unwrap();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].status, ItemStatus::Archived);
    }

    #[test]
    fn recent_entries_are_never_evicted() {
        let mut store = CheckpointStore::in_memory();
        let queue = QueueManager::in_memory();

        let recent = item("recent", "Nature", ts(20, 0));
        store.record_seen(&recent).unwrap();

        // Sweep one day later with a 30-day eviction age: the cutoff
        // lies well before first_seen, so nothing qualifies.
        let cutoff = ts(21, 0) - Duration::days(30);
        let evicted = store.evict_older_than(cutoff, &queue).unwrap();
        assert!(evicted.is_empty());
        assert!(store.has_seen(&recent.fingerprint));
    }

    #[test]
    fn reload_rehydrates_the_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        let record = item("a", "Nature", ts(1, 0));
        {
            let mut store = CheckpointStore::open(&path);
            store.record_seen(&record).unwrap();
            store.update_last_check("Nature", ts(1, 0), false).unwrap();
        }

        let store = CheckpointStore::open(&path);
        assert!(store.has_seen(&record.fingerprint));
        assert_eq!(store.last_check("Nature"), Some(ts(1, 0)));
        assert_eq!(store.seen_len(), 1);
    }

    #[test]
    fn malformed_checkpoint_is_first_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let store = CheckpointStore::open(&path);
        assert_eq!(store.seen_len(), 0);
    }
}
