//! Archive bundle types: period keys, bundles, aggregate statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ItemRecord, ItemStatus};

/// Calendar month an archive bundle covers, e.g. `2026-08`.
///
/// Ordering is chronological, so `BTreeMap<PeriodKey, _>` iterates
/// oldest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// 与えられた時刻が属する期間。
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid period key: {s}"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid period key: {s}"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid period key: {s}"))?;
        PeriodKey::new(year, month).ok_or_else(|| format!("invalid period key: {s}"))
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

/// Aggregate statistics over one bundle's records.
///
/// Stored alongside the records so summaries never require a rescan,
/// and recomputable from the records for consistency checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    /// Swept in by age without ever reaching a delivery decision.
    pub archived: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<u8, usize>,
}

impl AggregateStats {
    pub fn compute(records: &[ItemRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                ItemStatus::Sent => stats.sent += 1,
                ItemStatus::DeadLetter => stats.dead_lettered += 1,
                ItemStatus::Archived => stats.archived += 1,
                // Discovered/Queued/Failed: repair で持ち込まれた
                // 未解決レコード
                _ => stats.failed += 1,
            }
            *stats.by_source.entry(record.source.clone()).or_insert(0) += 1;
            *stats.by_priority.entry(record.priority.tier()).or_insert(0) += 1;
        }
        stats
    }
}

/// One period's worth of archived records plus their statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveBundle {
    pub period: PeriodKey,
    pub archived_at: DateTime<Utc>,
    pub records: Vec<ItemRecord>,
    pub stats: AggregateStats,
}

impl ArchiveBundle {
    pub fn new(period: PeriodKey, records: Vec<ItemRecord>, archived_at: DateTime<Utc>) -> Self {
        let stats = AggregateStats::compute(&records);
        Self {
            period,
            archived_at,
            records,
            stats,
        }
    }
}
