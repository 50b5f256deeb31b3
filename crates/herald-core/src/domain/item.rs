//! Item records and discovery candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use super::priority::Priority;
use super::status::ItemStatus;

/// One candidate tuple as supplied by the discovery feed, before
/// fingerprint validation. Read-only input to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub fingerprint: String,
    pub source: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub priority: Priority,
}

/// One discovered item.
///
/// Design:
/// - `fingerprint` and `first_seen` are immutable after creation.
/// - Status transitions happen through the queue entry; the checkpoint
///   keeps the last known status so eviction can archive correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub fingerprint: Fingerprint,
    pub source: String,
    pub title: String,
    pub url: String,

    /// Set at first discovery; never updated.
    pub first_seen: DateTime<Utc>,

    pub priority: Priority,
    pub status: ItemStatus,

    /// Delivery failures so far, bounded by the configured maximum.
    #[serde(default)]
    pub retry_count: u32,
}

impl ItemRecord {
    /// Build a freshly discovered record from a validated candidate.
    pub fn discovered(fingerprint: Fingerprint, candidate: &Candidate, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            source: candidate.source.clone(),
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            first_seen: now,
            priority: candidate.priority,
            status: ItemStatus::Discovered,
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate() -> Candidate {
        Candidate {
            fingerprint: "doi:10.1038/xyz".to_string(),
            source: "Nature".to_string(),
            title: "A paper".to_string(),
            url: "https://www.nature.com/articles/xyz".to_string(),
            priority: Priority::High,
        }
    }

    #[test]
    fn discovered_record_starts_clean() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        let fp = Fingerprint::new("doi:10.1038/xyz").unwrap();
        let item = ItemRecord::discovered(fp.clone(), &candidate(), now);

        assert_eq!(item.fingerprint, fp);
        assert_eq!(item.status, ItemStatus::Discovered);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.first_seen, now);
        assert_eq!(item.priority, Priority::High);
    }

    #[test]
    fn candidate_priority_defaults_to_normal() {
        let c: Candidate = serde_json::from_str(
            r#"{"fingerprint":"doi:10.1/a","source":"Science","title":"t","url":"u"}"#,
        )
        .unwrap();
        assert_eq!(c.priority, Priority::Normal);
    }
}
