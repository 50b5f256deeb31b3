//! Checkpoint store: durable per-source memory of seen fingerprints.

mod store;

pub use store::{CheckpointData, CheckpointStore, SeenEntry, SourceCheckpoint};
