//! アプリケーション層
//!
//! ports と各ストアを束ねてパイプライン一周（発見 -> 重複排除 ->
//! キュー投入 -> バッチ配信 -> 退避・アーカイブ）を実行します。
//!
//! - **builder**: 依存の組み立て（データディレクトリ or インメモリ）
//! - **pipeline**: ラン本体
//! - **report**: ランごとの構造化レポート

pub mod builder;
pub mod pipeline;
pub mod report;

pub use self::builder::PipelineBuilder;
pub use self::pipeline::Pipeline;
pub use self::report::RunReport;
