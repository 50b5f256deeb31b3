//! Pipeline - 一周分のラン実行

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::archive::{ArchiveManager, PeriodKey};
use crate::checkpoint::CheckpointStore;
use crate::domain::{Candidate, Fingerprint, ItemRecord, RunConfig, RunId};
use crate::error::Result;
use crate::ports::{Clock, DeliverySink, DiscoveryFeed};
use crate::queue::{QueueEntry, QueueManager};
use crate::scheduler::{BatchResult, BatchScheduler};

use super::report::RunReport;

/// One full notifier cycle: poll the feed, dedupe against the
/// checkpoint, enqueue new items, dispatch a bounded batch, then sweep
/// aged entries into the archive.
///
/// 各ステップの直後に該当ストアが永続化されるため、どの地点で
/// クラッシュしても再起動後のランが続きを安全に引き継ぎます
/// （クラッシュ時は at-least-once、正常時は exactly-once）。
pub struct Pipeline {
    pub(super) config: RunConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) feed: Arc<dyn DiscoveryFeed>,
    pub(super) sink: Arc<dyn DeliverySink>,
    pub(super) checkpoint: CheckpointStore,
    pub(super) queue: QueueManager,
    pub(super) archive: ArchiveManager,
    pub(super) scheduler: BatchScheduler,
}

impl Pipeline {
    pub async fn run_once(&mut self) -> Result<RunReport> {
        let run_id = RunId::generate();
        let started_at = self.clock.now();
        info!(run_id = %run_id, dry_run = self.config.dry_run, "run started");

        let candidates = self.feed.poll().await;

        if self.config.dry_run {
            return Ok(self.plan(run_id, started_at, &candidates));
        }

        let mut report = RunReport {
            run_id,
            started_at,
            dry_run: false,
            discovered: candidates.len(),
            enqueued: 0,
            skipped_seen: 0,
            rejected: 0,
            planned: Vec::new(),
            batch: BatchResult::empty(crate::domain::BatchId::generate()),
            evicted: 0,
            archived_period: None,
            queue: Default::default(),
        };

        let mut sources = BTreeSet::new();
        for candidate in &candidates {
            sources.insert(candidate.source.clone());
            let fingerprint = match Fingerprint::new(&candidate.fingerprint) {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(raw = %candidate.fingerprint, error = %err, "rejecting candidate");
                    report.rejected += 1;
                    continue;
                }
            };
            if self.checkpoint.has_seen(&fingerprint) {
                report.skipped_seen += 1;
                continue;
            }

            let item = ItemRecord::discovered(fingerprint, candidate, started_at);
            // seen 記録 -> キュー投入の順。間でクラッシュしても
            // キューに乗らなかった項目は退避スイープで archived になる
            self.checkpoint.record_seen(&item)?;
            self.queue.enqueue(item, started_at)?;
            report.enqueued += 1;
        }
        for source in sources {
            self.checkpoint
                .update_last_check(&source, started_at, false)?;
        }

        report.batch = self
            .scheduler
            .run_once(
                &mut self.queue,
                &mut self.checkpoint,
                self.sink.as_ref(),
                self.config.daily_cap,
            )
            .await?;

        // 終端に達したエントリはキューから引き上げる。レコード本体は
        // チェックポイント側に残り、退避時にアーカイブされる
        self.queue.take_resolved()?;

        let cutoff = started_at - self.config.eviction_age();
        let expired = self.checkpoint.expired(cutoff, &self.queue);
        if !expired.is_empty() {
            let period = PeriodKey::from_datetime(started_at);
            let fingerprints: Vec<Fingerprint> = expired
                .iter()
                .map(|record| record.fingerprint.clone())
                .collect();
            // アーカイブが永続化されてから初めてチェックポイントを削る
            report.evicted = self.archive.archive(expired, period, started_at)?;
            self.checkpoint.evict(&fingerprints)?;
            report.archived_period = Some(period);
        }

        report.queue = self.queue.counts();
        info!(
            run_id = %run_id,
            enqueued = report.enqueued,
            sent = report.batch.sent.len(),
            evicted = report.evicted,
            "run complete"
        );
        Ok(report)
    }

    /// Dry-run: read everything, mutate nothing, report what a real
    /// run would do with the current state.
    fn plan(
        &self,
        run_id: RunId,
        started_at: chrono::DateTime<chrono::Utc>,
        candidates: &[Candidate],
    ) -> RunReport {
        let mut skipped_seen = 0;
        let mut rejected = 0;
        let mut fresh: BTreeMap<Fingerprint, QueueEntry> = BTreeMap::new();
        for candidate in candidates {
            match Fingerprint::new(&candidate.fingerprint) {
                Ok(fp) if self.checkpoint.has_seen(&fp) || fresh.contains_key(&fp) => {
                    skipped_seen += 1;
                }
                Ok(fp) => {
                    let item = ItemRecord::discovered(fp.clone(), candidate, started_at);
                    fresh.insert(fp, QueueEntry::new(item, started_at));
                }
                Err(_) => rejected += 1,
            }
        }
        let enqueued = fresh.len();

        // 既にキューにある先頭 cap 件と今回入るはずの項目を合わせ、
        // 実ランと同じ (priority, enqueued_at, fingerprint) 順で選ぶ
        let mut pool = self.queue.peek_batch(self.config.daily_cap);
        pool.extend(fresh.into_values());
        pool.sort_by(|a, b| {
            (a.priority(), a.enqueued_at, a.fingerprint())
                .cmp(&(b.priority(), b.enqueued_at, b.fingerprint()))
        });
        let planned = pool
            .into_iter()
            .take(self.config.daily_cap)
            .map(|entry| entry.item.fingerprint.clone())
            .collect();

        let cutoff = started_at - self.config.eviction_age();
        let evicted = self.checkpoint.expired(cutoff, &self.queue).len();

        RunReport {
            run_id,
            started_at,
            dry_run: true,
            discovered: candidates.len(),
            enqueued,
            skipped_seen,
            rejected,
            planned,
            batch: BatchResult::empty(crate::domain::BatchId::generate()),
            evicted,
            archived_period: None,
            queue: self.queue.counts(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn archive(&self) -> &ArchiveManager {
        &self.archive
    }
}
