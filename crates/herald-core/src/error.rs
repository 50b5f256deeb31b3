//! Error types for the herald core.
//!
//! One crate-level enum, in three bands:
//! - invariant violations (`DuplicateFingerprint`, `AlreadyQueued`,
//!   `NonMonotonicTimestamp`): defects in the caller, never swallowed
//! - per-item conditions (`InvalidFingerprint`): isolated to the item
//! - persistence faults (`Persistence`, `StaleState`, `Serialization`):
//!   fatal for the run; the last durably written state stays intact

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::archive::PeriodKey;
use crate::domain::Fingerprint;
use crate::scheduler::BatchResult;

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("fingerprint already recorded: {0}")]
    DuplicateFingerprint(Fingerprint),

    #[error("fingerprint already has a live queue entry: {0}")]
    AlreadyQueued(Fingerprint),

    #[error("no live queue entry for fingerprint: {0}")]
    NotQueued(Fingerprint),

    #[error("last_check for {feed} would move backwards: {stored} -> {proposed}")]
    NonMonotonicTimestamp {
        // not `source`: that name is the error-chain field to thiserror
        feed: String,
        stored: DateTime<Utc>,
        proposed: DateTime<Utc>,
    },

    #[error("invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("state write failed for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "state file {path} was modified by another writer \
         (found generation {found}, expected {expected})"
    )]
    StaleState {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("archive bundle {0} is closed; use repair to modify it")]
    BundleClosed(PeriodKey),

    #[error("run aborted after {} resolved item(s): {source}", completed.resolved_len())]
    RunAborted {
        /// Items that were fully resolved (and durably persisted) before
        /// the fault. Everything else is still queued for the next run.
        completed: Box<BatchResult>,
        #[source]
        source: Box<HeraldError>,
    },
}

impl HeraldError {
    /// Persistence-layer faults abort the run; everything else is
    /// isolated to a single item or call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HeraldError::Persistence { .. }
                | HeraldError::StaleState { .. }
                | HeraldError::Serialization(_)
                | HeraldError::RunAborted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;
