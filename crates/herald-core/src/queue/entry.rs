//! Queue entry: item plus queue-local bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Fingerprint, ItemRecord, ItemStatus, Priority, QueueStatus};

/// One live unit of deliverable work.
///
/// Design:
/// - This is the single source of truth for an item's delivery state.
/// - All state transitions happen here, via methods; the manager never
///   pokes fields directly.
/// - The wrapped item's status and retry count are kept mirrored so a
///   rehydrated record is self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub item: ItemRecord,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueStatus,

    /// Delivery failures so far (authoritative; mirrored into `item`).
    pub retry_count: u32,

    /// Last failure reason, for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueEntry {
    pub fn new(mut item: ItemRecord, now: DateTime<Utc>) -> Self {
        item.status = ItemStatus::Queued;
        Self {
            item,
            enqueued_at: now,
            status: QueueStatus::Queued,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.item.fingerprint
    }

    pub fn priority(&self) -> Priority {
        self.item.priority
    }

    /// Hand this entry to the delivery collaborator.
    pub fn begin_delivery(&mut self) {
        self.status = QueueStatus::InFlight;
    }

    /// Delivery succeeded; terminal.
    pub fn mark_sent(&mut self) {
        self.status = QueueStatus::Sent;
        self.sync_item();
    }

    /// Transient failure: count it and record the reason.
    pub fn record_failure(&mut self, reason: Option<String>) {
        self.retry_count += 1;
        self.last_error = reason;
        self.item.status = ItemStatus::Failed;
        self.item.retry_count = self.retry_count;
    }

    /// Return to the queue, eligible for a later batch.
    pub fn requeue(&mut self) {
        self.status = QueueStatus::Queued;
    }

    /// Terminal failure (retry budget exhausted, or permanent).
    pub fn mark_dead(&mut self, reason: Option<String>) {
        self.status = QueueStatus::DeadLetter;
        if reason.is_some() {
            self.last_error = reason;
        }
        self.sync_item();
    }

    fn sync_item(&mut self) {
        self.item.status = self.status.as_item_status();
        self.item.retry_count = self.retry_count;
    }
}
