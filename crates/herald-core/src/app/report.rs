//! Per-run structured report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::archive::PeriodKey;
use crate::domain::{Fingerprint, RunId};
use crate::queue::QueueCounts;
use crate::scheduler::BatchResult;

/// Everything one pipeline run did (or, in dry-run mode, would do).
///
/// Serializes cleanly to JSON for the CLI and for log shipping.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,

    /// Candidates offered by the feed this run.
    pub discovered: usize,
    /// New items admitted to the queue (or that would be, in dry-run).
    pub enqueued: usize,
    /// Candidates dropped because their fingerprint was already known.
    pub skipped_seen: usize,
    /// Candidates dropped for an invalid fingerprint.
    pub rejected: usize,

    /// Dry-run only: the batch the next real run would dispatch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<Fingerprint>,

    pub batch: BatchResult,

    /// Checkpoint entries swept into the archive (or that would be).
    pub evicted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_period: Option<PeriodKey>,

    /// Queue depth after the run; the queue is unbounded, so this is
    /// the operator's backlog signal.
    pub queue: QueueCounts,
}
