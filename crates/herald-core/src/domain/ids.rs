//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID + Phantom type パターン。
//! `Id<T>` というジェネリック型で共通実装を提供しつつ、`T` は実行時には
//! 使わないマーカー型として、コンパイル時の型安全性を提供します
//! （RunId と BatchId は混同できない）。
//!
//! ULID は timestamp が先頭にあるため、生成順序でソート可能です。

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Marker trait providing the Display prefix ("run-", "batch-").
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Marker for one scheduled batch within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Batch {}

impl IdMarker for Batch {
    fn prefix() -> &'static str {
        "batch-"
    }
}

/// Identifier of a pipeline run (log correlation, reports).
pub type RunId = Id<Run>;

/// Identifier of a dequeued batch.
pub type BatchId = Id<Batch>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_marker_prefix() {
        assert!(RunId::generate().to_string().starts_with("run-"));
        assert!(BatchId::generate().to_string().starts_with("batch-"));

        // The whole point: you can't accidentally mix these types.
        // let _: RunId = BatchId::generate(); // <- does not compile
    }

    #[test]
    fn ids_are_sortable_by_generation_order() {
        let id1 = RunId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = RunId::generate();
        assert!(id1 < id2);
    }

    #[test]
    fn ids_roundtrip_through_serde() {
        let id = BatchId::generate();
        let s = serde_json::to_string(&id).unwrap();
        let back: BatchId = serde_json::from_str(&s).unwrap();
        assert_eq!(id, back);
    }
}
