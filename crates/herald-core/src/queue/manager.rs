//! キュー管理 - 優先度付き配信キューの本体
//!
//! Design:
//! - One map keyed by fingerprint is the single source of truth; the
//!   at-most-one-entry-per-fingerprint invariant falls out of the key.
//! - Batch selection sorts by `(priority, enqueued_at, fingerprint)`;
//!   the fingerprint tie-break makes the order fully deterministic even
//!   for identical timestamps.
//! - Every mutating call flushes atomically before returning, so a
//!   crash loses at most the in-progress item, never the run.
//! - Entries found `in_flight` at load time were interrupted mid-batch;
//!   they are requeued (at-least-once on crash).

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{DeliveryOutcome, Fingerprint, ItemRecord, Priority, QueueStatus};
use crate::error::{HeraldError, Result};
use crate::persist::StateFile;

use super::entry::QueueEntry;
use super::policy::RetryPolicy;

/// Persisted queue artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueData {
    pub entries: BTreeMap<Fingerprint, QueueEntry>,
}

/// Counts by state for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub in_flight: usize,
    pub sent: usize,
    pub dead_letter: usize,

    /// Live (non-terminal) entries per priority tier.
    pub live_by_priority: BTreeMap<u8, usize>,
}

/// Result of resolving one in-flight entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub status: QueueStatus,
    pub retry_count: u32,
}

/// Holds not-yet-delivered items, orders them, tracks retry counts.
#[derive(Debug)]
pub struct QueueManager {
    data: QueueData,
    file: StateFile<QueueData>,
}

impl QueueManager {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let (data, file) = StateFile::load(path);
        let mut manager = Self { data, file };

        // Recovery happens in memory only; opening a queue writes
        // nothing (dry-run must leave the files untouched). The
        // requeue is deterministic on every load and reaches disk
        // with the next mutating call.
        let recovered = manager.recover_in_flight();
        if recovered > 0 {
            warn!(recovered, "requeued entries left in-flight by an interrupted run");
        }
        info!(live = manager.live_len(), "queue loaded");
        Ok(manager)
    }

    pub fn in_memory() -> Self {
        let (data, file) = StateFile::volatile();
        Self { data, file }
    }

    fn recover_in_flight(&mut self) -> usize {
        let mut recovered = 0;
        for entry in self.data.entries.values_mut() {
            if entry.status == QueueStatus::InFlight {
                entry.requeue();
                recovered += 1;
            }
        }
        recovered
    }

    /// Add a freshly discovered item. Fails with `AlreadyQueued` if the
    /// fingerprint already has an entry (live or awaiting the archive
    /// sweep): at most one entry per fingerprint, ever.
    pub fn enqueue(&mut self, item: ItemRecord, now: DateTime<Utc>) -> Result<()> {
        if self.data.entries.contains_key(&item.fingerprint) {
            return Err(HeraldError::AlreadyQueued(item.fingerprint));
        }
        let entry = QueueEntry::new(item, now);
        self.data.entries.insert(entry.fingerprint().clone(), entry);
        self.flush()
    }

    /// Pull up to `max_n` runnable entries, ordered by
    /// `(priority asc, enqueued_at asc, fingerprint asc)`, and mark
    /// them in-flight. Terminal entries are never returned. The marked
    /// state is persisted before the batch is handed out.
    pub fn dequeue_batch(&mut self, max_n: usize) -> Result<Vec<QueueEntry>> {
        let selected = self.select_batch(max_n);
        if selected.is_empty() {
            return Ok(Vec::new());
        }
        for fingerprint in &selected {
            if let Some(entry) = self.data.entries.get_mut(fingerprint) {
                entry.begin_delivery();
            }
        }
        self.flush()?;
        Ok(selected
            .iter()
            .filter_map(|fp| self.data.entries.get(fp).cloned())
            .collect())
    }

    /// Same selection as [`dequeue_batch`], with no state change.
    /// Used by dry-run.
    ///
    /// [`dequeue_batch`]: QueueManager::dequeue_batch
    pub fn peek_batch(&self, max_n: usize) -> Vec<QueueEntry> {
        self.select_batch(max_n)
            .iter()
            .filter_map(|fp| self.data.entries.get(fp).cloned())
            .collect()
    }

    fn select_batch(&self, max_n: usize) -> Vec<Fingerprint> {
        let mut runnable: Vec<&QueueEntry> = self
            .data
            .entries
            .values()
            .filter(|entry| entry.status.is_runnable())
            .collect();
        runnable.sort_by(|a, b| {
            (a.priority(), a.enqueued_at, a.fingerprint())
                .cmp(&(b.priority(), b.enqueued_at, b.fingerprint()))
        });
        runnable
            .into_iter()
            .take(max_n)
            .map(|entry| entry.fingerprint().clone())
            .collect()
    }

    /// Apply a delivery outcome to an in-flight entry and persist the
    /// result. Resolving an already-terminal entry is a no-op (replay
    /// guard).
    pub fn resolve(
        &mut self,
        fingerprint: &Fingerprint,
        outcome: &DeliveryOutcome,
        policy: &RetryPolicy,
    ) -> Result<Resolution> {
        let Some(entry) = self.data.entries.get_mut(fingerprint) else {
            return Err(HeraldError::NotQueued(fingerprint.clone()));
        };
        if entry.status.is_terminal() {
            return Ok(Resolution {
                status: entry.status,
                retry_count: entry.retry_count,
            });
        }

        if let DeliveryOutcome::Failed { kind, reason } = outcome {
            match kind {
                crate::domain::FailureKind::Transient => entry.record_failure(reason.clone()),
                crate::domain::FailureKind::Permanent => entry.last_error = reason.clone(),
            }
        }

        let next = policy.next_status(entry.status, entry.retry_count, outcome);
        match next {
            QueueStatus::Sent => entry.mark_sent(),
            QueueStatus::DeadLetter => entry.mark_dead(None),
            QueueStatus::Queued => entry.requeue(),
            QueueStatus::InFlight => {}
        }
        let resolution = Resolution {
            status: entry.status,
            retry_count: entry.retry_count,
        };
        self.flush()?;
        Ok(resolution)
    }

    /// Remove and return terminal entries, for the archive sweep.
    pub fn take_resolved(&mut self) -> Result<Vec<QueueEntry>> {
        let resolved_keys: Vec<Fingerprint> = self
            .data
            .entries
            .iter()
            .filter(|(_, entry)| entry.status.is_terminal())
            .map(|(fp, _)| fp.clone())
            .collect();
        let mut resolved = Vec::with_capacity(resolved_keys.len());
        for fingerprint in resolved_keys {
            if let Some(entry) = self.data.entries.remove(&fingerprint) {
                resolved.push(entry);
            }
        }
        if !resolved.is_empty() {
            self.flush()?;
        }
        Ok(resolved)
    }

    pub fn status_of(&self, fingerprint: &Fingerprint) -> Option<QueueStatus> {
        self.data.entries.get(fingerprint).map(|entry| entry.status)
    }

    pub fn retry_count_of(&self, fingerprint: &Fingerprint) -> Option<u32> {
        self.data
            .entries
            .get(fingerprint)
            .map(|entry| entry.retry_count)
    }

    /// Live (non-terminal) entry count; recoverable from persisted
    /// state alone after a crash.
    pub fn live_len(&self) -> usize {
        self.data
            .entries
            .values()
            .filter(|entry| !entry.status.is_terminal())
            .count()
    }

    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for entry in self.data.entries.values() {
            match entry.status {
                QueueStatus::Queued => counts.queued += 1,
                QueueStatus::InFlight => counts.in_flight += 1,
                QueueStatus::Sent => counts.sent += 1,
                QueueStatus::DeadLetter => counts.dead_letter += 1,
            }
            if !entry.status.is_terminal() {
                *counts
                    .live_by_priority
                    .entry(entry.priority().tier())
                    .or_default() += 1;
            }
        }
        counts
    }

    fn flush(&mut self) -> Result<()> {
        self.file.save(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::domain::{Candidate, ItemStatus};

    fn ts(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, min, 0).unwrap()
    }

    fn item(fp: &str, priority: Priority) -> ItemRecord {
        let candidate = Candidate {
            fingerprint: fp.to_string(),
            source: "Nature".to_string(),
            title: format!("title {fp}"),
            url: format!("https://example.org/{fp}"),
            priority,
        };
        ItemRecord::discovered(Fingerprint::new(fp).unwrap(), &candidate, ts(8, 0))
    }

    fn fp(raw: &str) -> Fingerprint {
        Fingerprint::new(raw).unwrap()
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let mut queue = QueueManager::in_memory();
        queue.enqueue(item("a", Priority::Normal), ts(9, 0)).unwrap();
        assert!(matches!(
            queue.enqueue(item("a", Priority::Normal), ts(9, 1)),
            Err(HeraldError::AlreadyQueued(_))
        ));
    }

    #[test]
    fn batch_order_is_priority_then_fifo() {
        // Enqueued in order: p2, p1, p3, p1. Expected out:
        // item2(p1), item4(p1), item1(p2), item3(p3).
        let mut queue = QueueManager::in_memory();
        queue.enqueue(item("item1", Priority::High), ts(9, 0)).unwrap();
        queue.enqueue(item("item2", Priority::Urgent), ts(9, 1)).unwrap();
        queue.enqueue(item("item3", Priority::Normal), ts(9, 2)).unwrap();
        queue.enqueue(item("item4", Priority::Urgent), ts(9, 3)).unwrap();

        let batch = queue.dequeue_batch(4).unwrap();
        let order: Vec<&str> = batch.iter().map(|e| e.fingerprint().as_str()).collect();
        assert_eq!(order, vec!["item2", "item4", "item1", "item3"]);
    }

    #[test]
    fn dequeue_is_deterministic_and_capped() {
        let mut queue = QueueManager::in_memory();
        for i in 0..5 {
            queue
                .enqueue(item(&format!("it{i}"), Priority::Normal), ts(9, 0))
                .unwrap();
        }

        // Identical inputs, identical order (fingerprint tie-break).
        let first = queue.peek_batch(3);
        let second = queue.peek_batch(3);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn dequeued_entries_go_in_flight_and_are_not_reselected() {
        let mut queue = QueueManager::in_memory();
        queue.enqueue(item("a", Priority::Normal), ts(9, 0)).unwrap();

        let batch = queue.dequeue_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(queue.status_of(&fp("a")), Some(QueueStatus::InFlight));
        assert!(queue.dequeue_batch(10).unwrap().is_empty());
    }

    #[test]
    fn resolve_sent_is_terminal_and_replay_safe() {
        let mut queue = QueueManager::in_memory();
        let policy = RetryPolicy::default();
        queue.enqueue(item("a", Priority::Normal), ts(9, 0)).unwrap();
        queue.dequeue_batch(1).unwrap();

        let r = queue
            .resolve(&fp("a"), &DeliveryOutcome::delivered(), &policy)
            .unwrap();
        assert_eq!(r.status, QueueStatus::Sent);

        // Resolving again must not change anything.
        let r = queue
            .resolve(&fp("a"), &DeliveryOutcome::transient("late"), &policy)
            .unwrap();
        assert_eq!(r.status, QueueStatus::Sent);
        assert_eq!(r.retry_count, 0);
    }

    #[test]
    fn retry_bound_dead_letters_after_max_retries() {
        let mut queue = QueueManager::in_memory();
        let policy = RetryPolicy::new(3);
        queue.enqueue(item("a", Priority::Normal), ts(9, 0)).unwrap();

        for attempt in 1..=3 {
            queue.dequeue_batch(1).unwrap();
            let r = queue
                .resolve(&fp("a"), &DeliveryOutcome::transient("network"), &policy)
                .unwrap();
            assert_eq!(r.status, QueueStatus::Queued, "attempt {attempt}");
            assert_eq!(r.retry_count, attempt);
        }

        // Fourth consecutive failure: dead letter, not a fourth requeue.
        queue.dequeue_batch(1).unwrap();
        let r = queue
            .resolve(&fp("a"), &DeliveryOutcome::transient("network"), &policy)
            .unwrap();
        assert_eq!(r.status, QueueStatus::DeadLetter);
        assert_eq!(r.retry_count, 4);
        assert!(queue.dequeue_batch(1).unwrap().is_empty());
    }

    #[test]
    fn permanent_failure_dead_letters_without_a_retry_slot() {
        let mut queue = QueueManager::in_memory();
        let policy = RetryPolicy::new(3);
        queue.enqueue(item("a", Priority::Normal), ts(9, 0)).unwrap();
        queue.dequeue_batch(1).unwrap();

        let r = queue
            .resolve(&fp("a"), &DeliveryOutcome::permanent("unusable"), &policy)
            .unwrap();
        assert_eq!(r.status, QueueStatus::DeadLetter);
        assert_eq!(r.retry_count, 0);
    }

    #[test]
    fn resolve_unknown_fingerprint_is_an_error() {
        let mut queue = QueueManager::in_memory();
        let err = queue
            .resolve(&fp("ghost"), &DeliveryOutcome::delivered(), &RetryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, HeraldError::NotQueued(_)));
    }

    #[test]
    fn take_resolved_drains_terminal_entries_only() {
        let mut queue = QueueManager::in_memory();
        let policy = RetryPolicy::default();
        queue.enqueue(item("done", Priority::Normal), ts(9, 0)).unwrap();
        queue.enqueue(item("waiting", Priority::Normal), ts(9, 1)).unwrap();

        queue.dequeue_batch(1).unwrap();
        queue
            .resolve(&fp("done"), &DeliveryOutcome::delivered(), &policy)
            .unwrap();

        let resolved = queue.take_resolved().unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].item.status, ItemStatus::Sent);
        assert_eq!(queue.status_of(&fp("done")), None);
        assert_eq!(queue.status_of(&fp("waiting")), Some(QueueStatus::Queued));
    }

    #[test]
    fn counts_break_down_by_state_and_priority() {
        let mut queue = QueueManager::in_memory();
        queue.enqueue(item("a", Priority::Urgent), ts(9, 0)).unwrap();
        queue.enqueue(item("b", Priority::Normal), ts(9, 1)).unwrap();
        queue.enqueue(item("c", Priority::Normal), ts(9, 2)).unwrap();

        let counts = queue.counts();
        assert_eq!(counts.queued, 3);
        assert_eq!(counts.live_by_priority.get(&1), Some(&1));
        assert_eq!(counts.live_by_priority.get(&3), Some(&2));
    }

    #[test]
    fn in_flight_entries_are_requeued_on_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");

        {
            let mut queue = QueueManager::open(&path).unwrap();
            queue.enqueue(item("a", Priority::Normal), ts(9, 0)).unwrap();
            queue.dequeue_batch(1).unwrap();
            // Simulated crash: the entry stays in-flight on disk.
        }

        let before = std::fs::read_to_string(&path).unwrap();
        let queue = QueueManager::open(&path).unwrap();
        assert_eq!(queue.status_of(&fp("a")), Some(QueueStatus::Queued));
        assert_eq!(queue.live_len(), 1);

        // The recovery is in-memory; merely opening writes nothing.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
