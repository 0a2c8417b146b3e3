// Rust guideline compliant 2026-07-13

//! FraudLens pipeline entry point -- durable `SQLite` checkpoint demo.
//!
//! Identical to the main `fraudlens` binary except that checkpoints are
//! persisted to a `SQLite` file (`fraudlens.db` in the current working
//! directory) instead of an in-memory map. Restarting the process resumes
//! every partition from its last durable snapshot: windows, watermarks,
//! emitted-alert ids, and input offsets all survive.
//!
//! # Usage
//!
//! ```text
//! # Infinite mode -- press CTRL+C to stop
//! RUST_LOG=info cargo run --bin fraudlens_sqlite
//! ```
//!
//! The file `fraudlens.db` is created on first run. Inspect checkpoint
//! rows with any `SQLite` browser.

mod adapters;
mod worker;

// Load sqlite_state directly so it only enters this binary's module tree,
// avoiding dead_code warnings in the `fraudlens` binary (which uses
// MemoryStateStore instead).
#[path = "adapters/sqlite_state.rs"]
mod sqlite_state;

use adapters::memory_log::MemoryLog;
use adapters::tracing_sink::TracingSink;
use anyhow::Context as _;
use checkpoint::{CheckpointConfig, CheckpointManager};
use domain::StateStore as _;
use emitter::{AlertEmitter, EmitterConfig};
use evaluator::{FraudRuleEvaluator, RuleConfig};
use source::{SourceConfig, TransactionSource};
use sqlite_state::SqliteStateStore;
use std::time::Duration;
use tracing::Instrument as _;
use windowing::{WindowConfig, WindowStore};
use worker::{PartitionWorker, WorkerConfig};

/// Input-log partitions; one worker per partition.
const PARTITIONS: u32 = 2;

/// Database file created in the current working directory on first run.
///
/// Using the current working directory is acceptable for a demo adapter.
/// A production adapter would read this from configuration or environment.
const DB_URL: &str = "sqlite:fraudlens.db";

fn build_worker(partition: u32) -> anyhow::Result<PartitionWorker> {
    Ok(PartitionWorker::new(
        WorkerConfig::builder(partition).build().context("worker config")?,
        WindowStore::new(WindowConfig::builder().build().context("window config")?),
        FraudRuleEvaluator::new(RuleConfig::builder().build().context("rule config")?),
        AlertEmitter::new(EmitterConfig::builder().build().context("emitter config")?),
        CheckpointManager::new(CheckpointConfig::builder().build()),
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // SqliteStateStore: opens or creates fraudlens.db in the working
    // directory; workers resume from whatever it already holds.
    let state = SqliteStateStore::new(DB_URL)
        .await
        .context("failed to open SQLite state store")?;
    let sink = TracingSink::new();

    // The log itself is ephemeral, but checkpointed offsets are durable:
    // start each partition at its recovered position so appends continue
    // the old numbering instead of replaying into already-consumed offsets.
    let mut bases = Vec::with_capacity(PARTITIONS as usize);
    for partition in 0..PARTITIONS {
        let base = state
            .load(partition)
            .await
            .context("failed to read recovered offsets")?
            .map_or(0, |snapshot| snapshot.next_offset);
        bases.push(base);
    }
    let log = MemoryLog::with_base_offsets(bases);

    let source_config = SourceConfig::builder(PARTITIONS)
        .transaction_interval(Duration::from_millis(500))
        .fraud_interval(Duration::from_secs(5))
        .build()
        .context("failed to build source config")?;
    let source = TransactionSource::new(source_config);

    let worker0 = build_worker(0)?;
    let worker1 = build_worker(1)?;

    let pipeline = async {
        let (s, w0, w1) = tokio::join!(
            async {
                let r = source.run(&log).await;
                log.close();
                r
            }
            .instrument(tracing::info_span!("source")),
            worker0.run(&log, &sink, &state).instrument(tracing::info_span!("worker0")),
            worker1.run(&log, &sink, &state).instrument(tracing::info_span!("worker1")),
        );
        s.context("source failed")?;
        w0.context("worker 0 failed")?;
        w1.context("worker 1 failed")?;
        Ok::<(), anyhow::Error>(())
    };
    tokio::pin!(pipeline);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received, closing input log");
            log.close();
            pipeline.await?;
        }
        result = &mut pipeline => {
            result?;
        }
    }

    Ok(())
}
