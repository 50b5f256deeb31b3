//! DeliverySink port - 配信コラボレータ

use async_trait::async_trait;

use crate::domain::{DeliveryOutcome, ItemRecord};

/// Accepts one item (with any enrichment already attached upstream)
/// and reports the outcome.
///
/// The scheduler bounds every call with the configured delivery
/// timeout; an overrun counts as a transient failure, never as an
/// ambiguous in-flight state.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, item: &ItemRecord) -> DeliveryOutcome;
}
