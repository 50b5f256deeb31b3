//! herald-core
//!
//! Core building blocks for the Herald notifier: checkpointed
//! deduplication, a priority-ordered delivery queue with bounded
//! retries, and period-bundled archival.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, fingerprint, priority, status, item, outcome, config）
//! - **persist**: クラッシュ安全な状態ファイル（JSON envelope + atomic rename）
//! - **checkpoint**: 重複排除チェックポイント（seen レジストリ + last_check）
//! - **queue**: 優先度キュー（投入・バッチ取り出し・リトライ解決）
//! - **scheduler**: バッチ配信ドライバ（日次キャップ、配信タイムアウト）
//! - **archive**: 期間バンドルのアーカイブ（gzip、集計統計、検索）
//! - **ports**: 抽象化レイヤー（Clock, DeliverySink, DiscoveryFeed）
//! - **impls**: インメモリ実装（テスト・デモ用）
//! - **app**: アプリケーションロジック（builder, pipeline, report）

pub mod app;
pub mod archive;
pub mod checkpoint;
pub mod domain;
pub mod error;
pub mod impls;
pub mod persist;
pub mod ports;
pub mod queue;
pub mod scheduler;

pub use app::{Pipeline, PipelineBuilder, RunReport};
pub use error::{HeraldError, Result};
