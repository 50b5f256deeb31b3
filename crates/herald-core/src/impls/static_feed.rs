//! StaticFeed - 固定リストを返すテスト用フィード

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::Candidate;
use crate::ports::DiscoveryFeed;

/// Feed backed by an in-memory list. Each poll drains the pending
/// candidates, so an item is offered exactly once; push more between
/// runs to simulate new publications.
#[derive(Default)]
pub struct StaticFeed {
    pending: Mutex<Vec<Candidate>>,
}

impl StaticFeed {
    pub fn new(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        Self {
            pending: Mutex::new(candidates.into_iter().collect()),
        }
    }

    pub fn push(&self, candidate: Candidate) {
        self.pending.lock().unwrap().push(candidate);
    }
}

#[async_trait]
impl DiscoveryFeed for StaticFeed {
    async fn poll(&self) -> Vec<Candidate> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    fn candidate(fp: &str) -> Candidate {
        Candidate {
            fingerprint: fp.to_string(),
            source: "arxiv".into(),
            title: "t".into(),
            url: "https://example.org".into(),
            priority: Priority::Normal,
        }
    }

    #[tokio::test]
    async fn poll_drains_pending() {
        let feed = StaticFeed::new([candidate("a"), candidate("b")]);
        assert_eq!(feed.poll().await.len(), 2);
        assert!(feed.poll().await.is_empty());

        feed.push(candidate("c"));
        assert_eq!(feed.poll().await.len(), 1);
    }
}
