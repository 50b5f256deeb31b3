//! Archive bundle storage.
//!
//! バンドルは `<dir>/<period>.archive` に gzip 圧縮 JSON として保存
//! されます。書き込みは一時ファイル経由の rename で、部分書き込みが
//! 既存バンドルを壊すことはありません。

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Fingerprint, ItemRecord};
use crate::error::{HeraldError, Result};

use super::bundle::{AggregateStats, ArchiveBundle, PeriodKey};

const BUNDLE_EXTENSION: &str = "archive";

enum Backing {
    Dir(PathBuf),
    /// テスト・dry-run 用。ファイルを一切触らない。
    Memory(BTreeMap<PeriodKey, ArchiveBundle>),
}

/// Per-period overview of the archive, for status reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveInventory {
    pub bundles: BTreeMap<PeriodKey, AggregateStats>,
    pub total_records: usize,
}

/// Reads and writes period bundles.
///
/// Bundles are keyed by the period in which records were archived, so
/// the current period's bundle is always writable. Older periods are
/// closed; [`ArchiveManager::repair`] exists for explicit backfill.
pub struct ArchiveManager {
    backing: Backing,
}

impl ArchiveManager {
    /// ディレクトリ配下のバンドルを開く。ディレクトリは最初の
    /// 書き込みまで作成されない（開くだけでは何も書かない）。
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            backing: Backing::Dir(dir.into()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory(BTreeMap::new()),
        }
    }

    /// Append records to the bundle for `period`.
    ///
    /// Fails with [`HeraldError::BundleClosed`] when `period` lies
    /// before the period `now` falls in. Returns the number of records
    /// actually added (duplicates already in the bundle are skipped).
    pub fn archive(
        &mut self,
        records: Vec<ItemRecord>,
        period: PeriodKey,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if period < PeriodKey::from_datetime(now) {
            return Err(HeraldError::BundleClosed(period));
        }
        self.append(records, period, now)
    }

    /// Backfill a closed period. Explicit escape hatch for operator
    /// repair; normal runs go through [`ArchiveManager::archive`].
    pub fn repair(
        &mut self,
        records: Vec<ItemRecord>,
        period: PeriodKey,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        warn!(period = %period, count = records.len(), "backfilling closed archive period");
        self.append(records, period, now)
    }

    fn append(
        &mut self,
        records: Vec<ItemRecord>,
        period: PeriodKey,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut bundle = self
            .load_bundle(period)?
            .unwrap_or_else(|| ArchiveBundle::new(period, Vec::new(), now));

        let mut added = 0;
        for record in records {
            if bundle
                .records
                .iter()
                .any(|existing| existing.fingerprint == record.fingerprint)
            {
                // 同一バンドルへの二重アーカイブは黙って上書きせず残す
                warn!(fingerprint = %record.fingerprint, period = %period,
                      "record already archived in this period; skipping");
                continue;
            }
            bundle.records.push(record);
            added += 1;
        }

        bundle.archived_at = now;
        bundle.stats = AggregateStats::compute(&bundle.records);
        debug!(period = %period, added, total = bundle.records.len(), "archive bundle updated");

        match &mut self.backing {
            Backing::Memory(bundles) => {
                bundles.insert(period, bundle);
            }
            Backing::Dir(dir) => {
                write_bundle(dir, &bundle)?;
            }
        }
        Ok(added)
    }

    /// Load one period's bundle, or `None` if it does not exist.
    pub fn load_bundle(&self, period: PeriodKey) -> Result<Option<ArchiveBundle>> {
        match &self.backing {
            Backing::Memory(bundles) => Ok(bundles.get(&period).cloned()),
            Backing::Dir(dir) => {
                let path = bundle_path(dir, period);
                if !path.exists() {
                    return Ok(None);
                }
                read_bundle(&path).map(Some)
            }
        }
    }

    /// Stored aggregate statistics for one period.
    pub fn summary(&self, period: PeriodKey) -> Result<Option<AggregateStats>> {
        Ok(self.load_bundle(period)?.map(|bundle| bundle.stats))
    }

    /// Look up a fingerprint across all bundles, newest period first.
    pub fn search(&self, fingerprint: &Fingerprint) -> Result<Option<(PeriodKey, ItemRecord)>> {
        for period in self.periods()?.into_iter().rev() {
            if let Some(bundle) = self.load_bundle(period)? {
                if let Some(record) = bundle
                    .records
                    .into_iter()
                    .find(|record| &record.fingerprint == fingerprint)
                {
                    return Ok(Some((period, record)));
                }
            }
        }
        Ok(None)
    }

    /// Inventory of all bundles with their stored statistics.
    pub fn inventory(&self) -> Result<ArchiveInventory> {
        let mut inventory = ArchiveInventory::default();
        for period in self.periods()? {
            if let Some(bundle) = self.load_bundle(period)? {
                inventory.total_records += bundle.stats.total;
                inventory.bundles.insert(period, bundle.stats);
            }
        }
        Ok(inventory)
    }

    fn periods(&self) -> Result<Vec<PeriodKey>> {
        match &self.backing {
            Backing::Memory(bundles) => Ok(bundles.keys().copied().collect()),
            Backing::Dir(dir) => {
                let entries = match fs::read_dir(dir) {
                    Ok(entries) => entries,
                    // まだ一度も書いていなければディレクトリは無い
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        return Ok(Vec::new());
                    }
                    Err(source) => {
                        return Err(HeraldError::Persistence {
                            path: dir.clone(),
                            source,
                        });
                    }
                };
                let mut periods = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|source| HeraldError::Persistence {
                        path: dir.clone(),
                        source,
                    })?;
                    let path = entry.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some(BUNDLE_EXTENSION) {
                        continue;
                    }
                    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                        continue;
                    };
                    match stem.parse::<PeriodKey>() {
                        Ok(period) => periods.push(period),
                        Err(_) => {
                            warn!(path = %path.display(), "ignoring unrecognized archive file")
                        }
                    }
                }
                periods.sort();
                Ok(periods)
            }
        }
    }
}

fn bundle_path(dir: &Path, period: PeriodKey) -> PathBuf {
    dir.join(format!("{period}.{BUNDLE_EXTENSION}"))
}

fn write_bundle(dir: &Path, bundle: &ArchiveBundle) -> Result<()> {
    let path = bundle_path(dir, bundle.period);
    let tmp = path.with_extension("archive.tmp");

    let io_err = |source| HeraldError::Persistence {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;

    let file = File::create(&tmp).map_err(io_err)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    let json = serde_json::to_vec(bundle)?;
    encoder.write_all(&json).map_err(io_err)?;
    encoder.finish().map_err(io_err)?;

    fs::rename(&tmp, &path).map_err(io_err)
}

fn read_bundle(path: &Path) -> Result<ArchiveBundle> {
    let file = File::open(path).map_err(|source| HeraldError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = GzDecoder::new(file);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|source| HeraldError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(serde_json::from_slice(&json)?)
}
