// Rust guideline compliant 2026-07-12

//! FraudLens pipeline entry point -- in-memory demo.
//!
//! Wires the synthetic transaction source and one worker per input-log
//! partition to in-memory adapters and runs the full detection pipeline:
//! ingress -> windowed aggregation -> rule evaluation -> alert emission,
//! with periodic checkpoints to an in-memory state store.
//!
//! # Usage
//!
//! ```text
//! # Infinite mode -- press CTRL+C to stop
//! RUST_LOG=info cargo run --bin fraudlens
//!
//! # Also show per-record debug output
//! RUST_LOG=debug cargo run --bin fraudlens
//! ```

mod adapters;
mod worker;

use adapters::memory_log::MemoryLog;
use adapters::memory_state::MemoryStateStore;
use adapters::tracing_sink::TracingSink;
use anyhow::Context as _;
use checkpoint::{CheckpointConfig, CheckpointManager};
use emitter::{AlertEmitter, EmitterConfig};
use evaluator::{FraudRuleEvaluator, RuleConfig};
use source::{SourceConfig, TransactionSource};
use std::time::Duration;
use tracing::Instrument as _;
use windowing::{WindowConfig, WindowStore};
use worker::{PartitionWorker, WorkerConfig};

/// Input-log partitions; one worker per partition.
const PARTITIONS: u32 = 2;

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

    // MemoryLog: shared by the source (append) and the workers (fetch).
    let log = MemoryLog::new(PARTITIONS);
    let state = MemoryStateStore::new();
    let sink = TracingSink::new();

    // -- Source: infinite mode by default; press CTRL+C to stop --
    // Set .iterations(20) here for a finite demo run.
    let source_config = SourceConfig::builder(PARTITIONS)
        // 500 ms between transactions keeps logs readable in real time.
        .transaction_interval(Duration::from_millis(500))
        // A demo fraud burst every 5 s.
        .fraud_interval(Duration::from_secs(5))
        .build()
        .context("failed to build source config")?;
    let source = TransactionSource::new(source_config);

    let worker0 = build_worker(0)?;
    let worker1 = build_worker(1)?;

    let pipeline = async {
        // tokio::join! polls all three futures concurrently on the
        // current_thread runtime and returns the tuple directly.
        let (s, w0, w1) = tokio::join!(
            async {
                let r = source.run(&log).await;
                // Close the log so workers drain and exit cleanly.
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

    // Race the pipeline against CTRL+C. On CTRL+C: close the log, then
    // await the pipeline so workers drain in-flight work and take their
    // final checkpoints before the process exits.
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
