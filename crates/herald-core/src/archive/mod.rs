//! アーカイブ管理
//!
//! 期間（年月）単位の gzip 圧縮バンドルとして解決済みレコードを
//! 長期保存します。各バンドルは集計統計を同梱し、fingerprint 検索と
//! 期間サマリーを提供します。
//!
//! - **bundle**: 期間キー・バンドル・集計統計の型
//! - **manager**: バンドルファイルの読み書き・検索

pub mod bundle;
pub mod manager;

pub use self::bundle::{AggregateStats, ArchiveBundle, PeriodKey};
pub use self::manager::{ArchiveInventory, ArchiveManager};
