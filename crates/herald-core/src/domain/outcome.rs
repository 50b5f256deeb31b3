//! Delivery outcome model: common result format for delivery attempts.
//!
//! This module is architecture-agnostic: it does not assume queues or
//! persistence. It only defines the "shape" of results the scheduler
//! can record and act on.

use serde::{Deserialize, Serialize};

/// Classification of a delivery failure.
///
/// - `Transient`: likely to resolve on retry (network, rate limit);
///   the item returns to the queue with an incremented retry count.
/// - `Permanent`: retrying is pointless (malformed item); the item is
///   dead-lettered without consuming a retry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Result of handing one item to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed {
        kind: FailureKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl DeliveryOutcome {
    pub fn delivered() -> Self {
        DeliveryOutcome::Delivered
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Failed {
            kind: FailureKind::Transient,
            reason: Some(reason.into()),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Failed {
            kind: FailureKind::Permanent,
            reason: Some(reason.into()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Delivered => None,
            DeliveryOutcome::Failed { reason, .. } => reason.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert!(DeliveryOutcome::delivered().is_delivered());

        let t = DeliveryOutcome::transient("rate limited");
        assert!(matches!(
            t,
            DeliveryOutcome::Failed {
                kind: FailureKind::Transient,
                ..
            }
        ));
        assert_eq!(t.reason(), Some("rate limited"));

        let p = DeliveryOutcome::permanent("bad payload");
        assert!(matches!(
            p,
            DeliveryOutcome::Failed {
                kind: FailureKind::Permanent,
                ..
            }
        ));
    }

    #[test]
    fn outcome_roundtrip_json() {
        let o = DeliveryOutcome::transient("timeout");
        let s = serde_json::to_string(&o).unwrap();
        let back: DeliveryOutcome = serde_json::from_str(&s).unwrap();
        assert_eq!(back, o);
    }
}
