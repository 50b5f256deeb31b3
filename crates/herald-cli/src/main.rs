//! herald - 科学記事ノーティファイアの運用 CLI
//!
//! `run` で一周（発見 -> 重複排除 -> 配信 -> 退避）を実行し、
//! `status` / `search` で状態を覗きます。配信先はこのバイナリでは
//! stdout です。本番の配信層は herald-core の `DeliverySink` を
//! 実装して差し替えます。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use herald_core::app::PipelineBuilder;
use herald_core::archive::{ArchiveInventory, ArchiveManager};
use herald_core::checkpoint::CheckpointStore;
use herald_core::domain::{Candidate, DeliveryOutcome, Fingerprint, ItemRecord, RunConfig};
use herald_core::impls::StaticFeed;
use herald_core::ports::DeliverySink;
use herald_core::queue::{QueueCounts, QueueManager};

#[derive(Debug, Parser)]
#[command(name = "herald", about = "Checkpointed article notifier")]
struct Cli {
    /// Root directory for checkpoint, queue and archive state.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one notifier cycle over a candidate file.
    Run {
        /// JSON file with an array of candidates
        /// (fingerprint, source, title, url, priority).
        input: PathBuf,

        /// Maximum deliveries per run.
        #[arg(long, default_value_t = 10)]
        cap: usize,

        /// Transient failures tolerated before dead-lettering.
        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        /// Age in days before resolved entries move to the archive.
        #[arg(long, default_value_t = 30)]
        eviction_age_days: u32,

        /// Per-item delivery timeout in seconds.
        #[arg(long, default_value_t = 30)]
        delivery_timeout_secs: u64,

        /// Report what would happen without delivering or persisting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show checkpoint, queue and archive state.
    Status,

    /// Locate a fingerprint in the checkpoint and the archive.
    Search { fingerprint: String },
}

/// Demo sink: prints the notification instead of posting it.
struct StdoutSink;

#[async_trait]
impl DeliverySink for StdoutSink {
    async fn deliver(&self, item: &ItemRecord) -> DeliveryOutcome {
        println!(
            "[{}] {}: {} ({})",
            item.priority.tier(),
            item.source,
            item.title,
            item.url
        );
        DeliveryOutcome::delivered()
    }
}

#[derive(Serialize)]
struct StatusView {
    seen: usize,
    sources: usize,
    queue: QueueCounts,
    archive: ArchiveInventory,
}

#[derive(Serialize)]
struct SearchView {
    fingerprint: String,
    in_checkpoint: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    archived_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<ItemRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            input,
            cap,
            max_retries,
            eviction_age_days,
            delivery_timeout_secs,
            dry_run,
        } => {
            let config = RunConfig {
                daily_cap: cap,
                max_retries,
                eviction_age_days,
                delivery_timeout_secs,
                dry_run,
            };
            run(cli.data_dir, input, config).await
        }
        Command::Status => status(cli.data_dir),
        Command::Search { fingerprint } => search(cli.data_dir, &fingerprint),
    }
}

async fn run(data_dir: PathBuf, input: PathBuf, config: RunConfig) -> Result<()> {
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("reading candidates from {}", input.display()))?;
    let candidates: Vec<Candidate> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    info!(count = candidates.len(), data_dir = %data_dir.display(), "loaded candidates");

    let mut pipeline = PipelineBuilder::new()
        .config(config)
        .data_dir(&data_dir)
        .feed(Arc::new(StaticFeed::new(candidates)))
        .sink(Arc::new(StdoutSink))
        .build()
        .context("assembling pipeline")?;

    let report = pipeline.run_once().await.context("running pipeline")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn status(data_dir: PathBuf) -> Result<()> {
    let checkpoint = CheckpointStore::open(data_dir.join("checkpoint.json"));
    let queue = QueueManager::open(data_dir.join("queue.json")).context("opening queue")?;
    let archive = ArchiveManager::open(data_dir.join("archive")).context("opening archive")?;

    let view = StatusView {
        seen: checkpoint.seen_len(),
        sources: checkpoint.source_count(),
        queue: queue.counts(),
        archive: archive.inventory().context("reading archive inventory")?,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn search(data_dir: PathBuf, raw: &str) -> Result<()> {
    let fingerprint = Fingerprint::new(raw).context("invalid fingerprint")?;
    let checkpoint = CheckpointStore::open(data_dir.join("checkpoint.json"));
    let archive = ArchiveManager::open(data_dir.join("archive")).context("opening archive")?;

    let hit = archive
        .search(&fingerprint)
        .context("searching archive")?;
    let view = SearchView {
        fingerprint: fingerprint.to_string(),
        in_checkpoint: checkpoint.has_seen(&fingerprint),
        archived_in: hit.as_ref().map(|(period, _)| period.to_string()),
        record: hit.map(|(_, record)| record),
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
