//! バッチスケジューラ
//!
//! キューから優先度順にバッチを取り出し、1 件ずつ配信コラボレータに
//! 渡して結果を解決します。各ステップ（取り出し・解決）の直後に
//! 永続化されるため、途中クラッシュしても再起動時に in-flight 分が
//! キューへ戻るだけで、送信済みの再配信は起きません。

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::domain::{BatchId, DeliveryOutcome, Fingerprint, QueueStatus};
use crate::error::{HeraldError, Result};
use crate::ports::DeliverySink;
use crate::queue::{QueueManager, RetryPolicy};

/// Outcome of one batch run, grouped by where each item ended up.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: BatchId,
    /// Delivered this run.
    pub sent: Vec<Fingerprint>,
    /// Failed transiently and requeued for a later run.
    pub failed: Vec<Fingerprint>,
    /// Exhausted their retry budget or failed permanently.
    pub dead_lettered: Vec<Fingerprint>,
}

impl BatchResult {
    pub fn empty(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            sent: Vec::new(),
            failed: Vec::new(),
            dead_lettered: Vec::new(),
        }
    }

    /// Items this run reached a decision for.
    pub fn resolved_len(&self) -> usize {
        self.sent.len() + self.failed.len() + self.dead_lettered.len()
    }
}

/// Drives one bounded delivery batch.
pub struct BatchScheduler {
    policy: RetryPolicy,
    timeout: Duration,
}

impl BatchScheduler {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self { policy, timeout }
    }

    /// Deliver up to `cap` items.
    ///
    /// 各配信はタイムアウトで打ち切られ、超過は transient 失敗として
    /// 扱われます。致命的な永続化エラーはバッチを中断し、それまでの
    /// 結果を [`HeraldError::RunAborted`] に載せて返します。
    pub async fn run_once(
        &self,
        queue: &mut QueueManager,
        checkpoint: &mut CheckpointStore,
        sink: &dyn DeliverySink,
        cap: usize,
    ) -> Result<BatchResult> {
        let batch_id = BatchId::generate();
        let mut result = BatchResult::empty(batch_id);

        let batch = queue.dequeue_batch(cap)?;
        if batch.is_empty() {
            return Ok(result);
        }
        info!(batch_id = %batch_id, size = batch.len(), "dispatching batch");

        for entry in batch {
            let fingerprint = entry.item.fingerprint.clone();

            let outcome = match tokio::time::timeout(self.timeout, sink.deliver(&entry.item)).await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%fingerprint, timeout = ?self.timeout, "delivery timed out");
                    DeliveryOutcome::transient("delivery timed out")
                }
            };

            match self.settle(queue, checkpoint, &fingerprint, &outcome) {
                Ok(status) => match status {
                    QueueStatus::Sent => result.sent.push(fingerprint),
                    QueueStatus::Queued => result.failed.push(fingerprint),
                    QueueStatus::DeadLetter => result.dead_lettered.push(fingerprint),
                    QueueStatus::InFlight => {
                        warn!(%fingerprint, "entry still in flight after resolve")
                    }
                },
                Err(err) if err.is_fatal() => {
                    return Err(HeraldError::RunAborted {
                        completed: Box::new(result),
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    warn!(%fingerprint, error = %err, "skipping unresolvable entry");
                }
            }
        }

        info!(
            batch_id = %batch_id,
            sent = result.sent.len(),
            failed = result.failed.len(),
            dead_lettered = result.dead_lettered.len(),
            "batch complete"
        );
        Ok(result)
    }

    fn settle(
        &self,
        queue: &mut QueueManager,
        checkpoint: &mut CheckpointStore,
        fingerprint: &Fingerprint,
        outcome: &DeliveryOutcome,
    ) -> Result<QueueStatus> {
        let resolution = queue.resolve(fingerprint, outcome, &self.policy)?;
        checkpoint.mark_resolved(
            fingerprint,
            resolution.status.as_item_status(),
            resolution.retry_count,
        )?;
        Ok(resolution.status)
    }
}
