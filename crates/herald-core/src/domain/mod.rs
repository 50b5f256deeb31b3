//! Domain model (fingerprints, items, priorities, statuses, outcomes).
//!
//! モジュール構成:
//! - **fingerprint**: 重複排除キー（検証付き newtype）
//! - **priority**: 配信順序を決める優先度レベル
//! - **status**: アイテムとキューエントリの状態機械
//! - **item**: 発見されたアイテムのレコード
//! - **outcome**: 配信結果の共通フォーマット
//! - **config**: 検証付きの実行設定
//! - **ids**: 実行レポート用の型付き ID

pub mod config;
pub mod fingerprint;
pub mod ids;
pub mod item;
pub mod outcome;
pub mod priority;
pub mod status;

pub use config::RunConfig;
pub use fingerprint::Fingerprint;
pub use ids::{BatchId, RunId};
pub use item::{Candidate, ItemRecord};
pub use outcome::{DeliveryOutcome, FailureKind};
pub use priority::Priority;
pub use status::{ItemStatus, QueueStatus};
