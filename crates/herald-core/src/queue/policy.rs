//! Retry policy: the pure resolution decision.

use crate::domain::{DeliveryOutcome, FailureKind, QueueStatus};

/// Bounded retry policy for failed deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum transient failures before an entry is dead-lettered.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decide the next queue status for an entry, given its current
    /// status, its failure count *including the failure being resolved*,
    /// and the delivery outcome. Pure: no I/O, no clock.
    ///
    /// - terminal stays terminal (idempotent replay guard)
    /// - delivered -> `Sent`
    /// - permanent failure -> `DeadLetter` (no retry slot consumed)
    /// - transient failure -> `Queued` while `retry_count <= max_retries`,
    ///   `DeadLetter` once the bound is exceeded
    pub fn next_status(
        &self,
        current: QueueStatus,
        retry_count: u32,
        outcome: &DeliveryOutcome,
    ) -> QueueStatus {
        if current.is_terminal() {
            return current;
        }
        match outcome {
            DeliveryOutcome::Delivered => QueueStatus::Sent,
            DeliveryOutcome::Failed {
                kind: FailureKind::Permanent,
                ..
            } => QueueStatus::DeadLetter,
            DeliveryOutcome::Failed {
                kind: FailureKind::Transient,
                ..
            } => {
                if retry_count > self.max_retries {
                    QueueStatus::DeadLetter
                } else {
                    QueueStatus::Queued
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}
