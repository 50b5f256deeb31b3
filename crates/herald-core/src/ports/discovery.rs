//! DiscoveryFeed port - 発見フィード

use async_trait::async_trait;

use crate::domain::Candidate;

/// Supplies candidate tuples per run. The core treats this as
/// read-only input; polling, parsing and per-site extraction live
/// behind this trait.
#[async_trait]
pub trait DiscoveryFeed: Send + Sync {
    async fn poll(&self) -> Vec<Candidate>;
}
