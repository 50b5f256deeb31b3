//! ScriptedDelivery - 配信結果を台本通りに返すテスト用 sink

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::domain::{DeliveryOutcome, ItemRecord};
use crate::ports::DeliverySink;

enum Script {
    /// 常に配信成功。
    AlwaysDelivered,
    /// 最初の n 回だけ transient 失敗、その後は成功。
    FailFirst(AtomicU32),
    /// 呼び出しごとに先頭から消費。尽きたら配信成功扱い。
    Outcomes(Mutex<VecDeque<DeliveryOutcome>>),
}

/// Test sink with a scripted sequence of outcomes.
///
/// 配信された fingerprint を記録するので、重複配信が無いことを
/// テストで検証できます。
pub struct ScriptedDelivery {
    script: Script,
    delivered: Mutex<Vec<String>>,
}

impl ScriptedDelivery {
    pub fn always_delivered() -> Self {
        Self {
            script: Script::AlwaysDelivered,
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Fails the first `n` calls transiently, then delivers.
    pub fn fail_first(n: u32) -> Self {
        Self {
            script: Script::FailFirst(AtomicU32::new(n)),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = DeliveryOutcome>) -> Self {
        Self {
            script: Script::Outcomes(Mutex::new(outcomes.into_iter().collect())),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// 実際に deliver が呼ばれた fingerprint の列（呼び出し順）。
    pub fn deliveries(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for ScriptedDelivery {
    async fn deliver(&self, item: &ItemRecord) -> DeliveryOutcome {
        self.delivered
            .lock()
            .unwrap()
            .push(item.fingerprint.to_string());

        match &self.script {
            Script::AlwaysDelivered => DeliveryOutcome::delivered(),
            Script::FailFirst(remaining) => {
                let prev = remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                    .unwrap_or(0);
                if prev > 0 {
                    DeliveryOutcome::transient("scripted failure")
                } else {
                    DeliveryOutcome::delivered()
                }
            }
            Script::Outcomes(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(DeliveryOutcome::delivered),
        }
    }
}
