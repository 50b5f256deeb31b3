//! Priority queue for not-yet-delivered items.

mod entry;
mod manager;
mod policy;

pub use entry::QueueEntry;
pub use manager::{QueueCounts, QueueData, QueueManager, Resolution};
pub use policy::RetryPolicy;
