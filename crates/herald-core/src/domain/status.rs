//! Status state machines for items and queue entries.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an item record.
///
/// Transitions:
/// - Discovered -> Queued (first enqueue)
/// - Queued -> Sent (delivery succeeded)
/// - Queued -> Failed -> Queued (transient failure, retry budget left)
/// - Queued/Failed -> DeadLetter (retry budget exhausted, or permanent failure)
/// - Sent/DeadLetter/aged Discovered/Failed -> Archived (eviction sweep)
///
/// Design note: Using an enum ensures exhaustive matching and prevents
/// invalid states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Reported by the discovery feed, not yet queued.
    Discovered,

    /// Waiting in the priority queue for a delivery slot.
    Queued,

    /// Delivered successfully.
    Sent,

    /// Failed at least once; eligible for retry.
    Failed,

    /// Retries exhausted or permanently unusable. Kept for audit.
    DeadLetter,

    /// Moved into a period bundle by the archive sweep.
    Archived,
}

impl ItemStatus {
    /// Is this a terminal status (eligible for eviction/archival)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemStatus::Sent | ItemStatus::DeadLetter | ItemStatus::Archived
        )
    }
}

/// Queue-local state of a live entry.
///
/// Transitions:
/// - Queued -> InFlight (picked into a batch)
/// - InFlight -> Sent (delivered)
/// - InFlight -> Queued (transient failure below the retry bound)
/// - InFlight -> DeadLetter (bound exceeded, or permanent failure)
///
/// InFlight never survives a restart: entries found in-flight at load
/// time are requeued (at-least-once on crash, exactly-once on a clean run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Eligible for the next batch.
    Queued,

    /// Handed to the delivery collaborator, outcome pending.
    InFlight,

    /// Delivered; waiting for the archive sweep to collect it.
    Sent,

    /// Failed permanently; waiting for the archive sweep to collect it.
    DeadLetter,
}

impl QueueStatus {
    /// Is this a terminal state (no further delivery attempts)?
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Sent | QueueStatus::DeadLetter)
    }

    /// Is this entry eligible for batch selection?
    pub fn is_runnable(self) -> bool {
        matches!(self, QueueStatus::Queued)
    }

    /// The item-level status this queue state corresponds to.
    pub fn as_item_status(self) -> ItemStatus {
        match self {
            QueueStatus::Queued | QueueStatus::InFlight => ItemStatus::Queued,
            QueueStatus::Sent => ItemStatus::Sent,
            QueueStatus::DeadLetter => ItemStatus::DeadLetter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sent(ItemStatus::Sent, true)]
    #[case::dead_letter(ItemStatus::DeadLetter, true)]
    #[case::archived(ItemStatus::Archived, true)]
    #[case::discovered(ItemStatus::Discovered, false)]
    #[case::queued(ItemStatus::Queued, false)]
    #[case::failed(ItemStatus::Failed, false)]
    fn item_terminal_statuses(#[case] status: ItemStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn only_queued_is_runnable() {
        assert!(QueueStatus::Queued.is_runnable());
        assert!(!QueueStatus::InFlight.is_runnable());
        assert!(!QueueStatus::Sent.is_runnable());
        assert!(!QueueStatus::DeadLetter.is_runnable());
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::DeadLetter).unwrap(),
            "\"dead_letter\""
        );
        assert_eq!(
            serde_json::to_string(&QueueStatus::InFlight).unwrap(),
            "\"in_flight\""
        );
    }
}
