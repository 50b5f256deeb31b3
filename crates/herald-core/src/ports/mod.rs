//! Ports - 抽象化レイヤー
//!
//! このモジュールは外部コラボレータへの narrow interface を定義します。
//! フィード取得・配信そのものは core の範囲外で、trait の向こう側に
//! 隠蔽されます（§ hexagonal architecture）。
//!
//! - **Clock**: 時刻の抽象化（テストでは FixedClock を使用）
//! - **DeliverySink**: 配信コラボレータ（Slack 通知などの外部層）
//! - **DiscoveryFeed**: 発見フィード（RSS 取得などの外部層、read-only）

pub mod clock;
pub mod delivery;
pub mod discovery;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery::DeliverySink;
pub use self::discovery::DiscoveryFeed;
