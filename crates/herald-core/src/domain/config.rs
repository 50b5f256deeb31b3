//! Run configuration with named, typed fields and explicit defaults.
//!
//! Loosely-typed per-run knobs are rejected at load time via
//! [`RunConfig::validate`]; nothing downstream re-checks ranges.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};

/// Operator-adjustable constants for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard daily output cap: at most this many items leave the system
    /// per run. Items past the cap are delayed, never dropped.
    pub daily_cap: usize,

    /// Retry budget per item; exceeding it dead-letters the item.
    pub max_retries: u32,

    /// Age after which resolved checkpoint entries are swept into the
    /// archive.
    pub eviction_age_days: u32,

    /// Upper bound on one delivery call; a timed-out item counts as a
    /// transient failure.
    pub delivery_timeout_secs: u64,

    /// Perform all read/decision logic but suppress persistence and
    /// delivery side effects.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            daily_cap: 10,
            max_retries: 3,
            eviction_age_days: 30,
            delivery_timeout_secs: 30,
            dry_run: false,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.daily_cap == 0 {
            return Err(HeraldError::InvalidConfig(
                "daily_cap must be at least 1".to_string(),
            ));
        }
        if self.eviction_age_days == 0 {
            return Err(HeraldError::InvalidConfig(
                "eviction_age_days must be at least 1".to_string(),
            ));
        }
        if self.delivery_timeout_secs == 0 {
            return Err(HeraldError::InvalidConfig(
                "delivery_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn eviction_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.eviction_age_days))
    }
}
