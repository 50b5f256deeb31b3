//! Impls - port のインメモリ実装
//!
//! テストとデモ用の実装です。本番の配信層（Slack など）や
//! フィード取得層は別クレートで port を実装します。

pub mod scripted_delivery;
pub mod static_feed;

pub use self::scripted_delivery::ScriptedDelivery;
pub use self::static_feed::StaticFeed;
