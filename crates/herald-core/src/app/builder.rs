//! PipelineBuilder - 依存の組み立て

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::ArchiveManager;
use crate::checkpoint::CheckpointStore;
use crate::domain::RunConfig;
use crate::error::{HeraldError, Result};
use crate::ports::{Clock, DeliverySink, DiscoveryFeed, SystemClock};
use crate::queue::{QueueManager, RetryPolicy};
use crate::scheduler::BatchScheduler;

use super::pipeline::Pipeline;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const QUEUE_FILE: &str = "queue.json";
const ARCHIVE_DIR: &str = "archive";

/// Assembles a [`Pipeline`] from its collaborators.
///
/// `data_dir` を与えるとファイル永続化、与えなければインメモリ
/// （テスト用）になります。feed と sink は必須です。
pub struct PipelineBuilder {
    config: RunConfig,
    clock: Arc<dyn Clock>,
    data_dir: Option<PathBuf>,
    feed: Option<Arc<dyn DiscoveryFeed>>,
    sink: Option<Arc<dyn DeliverySink>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            clock: Arc::new(SystemClock),
            data_dir: None,
            feed: None,
            sink: None,
        }
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Root directory for the checkpoint, queue and archive files.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn feed(mut self, feed: Arc<dyn DiscoveryFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DeliverySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let feed = self
            .feed
            .ok_or_else(|| HeraldError::InvalidConfig("a discovery feed is required".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| HeraldError::InvalidConfig("a delivery sink is required".into()))?;

        let (checkpoint, queue, archive) = match &self.data_dir {
            Some(dir) => (
                CheckpointStore::open(dir.join(CHECKPOINT_FILE)),
                QueueManager::open(dir.join(QUEUE_FILE))?,
                ArchiveManager::open(dir.join(ARCHIVE_DIR))?,
            ),
            None => (
                CheckpointStore::in_memory(),
                QueueManager::in_memory(),
                ArchiveManager::in_memory(),
            ),
        };

        let scheduler = BatchScheduler::new(
            RetryPolicy::new(self.config.max_retries),
            self.config.delivery_timeout(),
        );

        Ok(Pipeline {
            config: self.config,
            clock: self.clock,
            feed,
            sink,
            checkpoint,
            queue,
            archive,
            scheduler,
        })
    }
}
