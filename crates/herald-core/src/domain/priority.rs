//! Priority tiers for queued items.

use serde::{Deserialize, Serialize};

use crate::error::HeraldError;

/// Ordinal priority tier, assigned at discovery by source-level
/// configuration. Lower tier number = delivered earlier.
///
/// Serialized as the tier number so the flat state format stays
/// readable (`1` = urgent ... `4` = low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    /// 緊急（特定キーワード）
    Urgent = 1,

    /// 高（高インパクトジャーナル）
    High = 2,

    /// 通常
    Normal = 3,

    /// 低（News 記事など）
    Low = 4,
}

impl Priority {
    pub fn tier(self) -> u8 {
        self as u8
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.tier()
    }
}

impl TryFrom<u8> for Priority {
    type Error = HeraldError;

    fn try_from(tier: u8) -> Result<Self, Self::Error> {
        match tier {
            1 => Ok(Priority::Urgent),
            2 => Ok(Priority::High),
            3 => Ok(Priority::Normal),
            4 => Ok(Priority::Low),
            other => Err(HeraldError::InvalidConfig(format!(
                "priority tier out of range: {other} (expected 1..=4)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_ascending_by_tier() {
        assert!(Priority::Urgent < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    #[test]
    fn serializes_as_tier_number() {
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "1");
        let p: Priority = serde_json::from_str("4").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn rejects_out_of_range_tier() {
        assert!(serde_json::from_str::<Priority>("0").is_err());
        assert!(serde_json::from_str::<Priority>("5").is_err());
    }
}
