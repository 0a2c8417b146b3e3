// Rust guideline compliant 2026-07-12

//! Partition worker -- the single execution stream that ties ingress,
//! aggregation, evaluation, emission, and checkpointing together for one
//! input partition.
//!
//! Entry point: [`PartitionWorker::run`]. Configuration via
//! [`WorkerConfig::builder`].
//!
//! One worker owns one partition's account keys outright: processing a
//! record (decode -> validate -> fold) is a single synchronous unit of
//! work, so no per-key locking exists anywhere. A window is evaluated
//! exactly once, when the watermark closes it (or at end-of-stream), so
//! each alert reflects the window's complete aggregate. Eviction,
//! evaluation of closed windows, and checkpointing run between batches on
//! the same stream. Per-record errors are logged and skipped; durability
//! errors (checkpoint writes, exhausted publish retries) stop the worker
//! so recovery can reprocess from the last checkpoint.

use checkpoint::{CheckpointError, CheckpointManager};
use chrono::{DateTime, Utc};
use domain::{
    AccountWindow, AlertSink, CheckpointSnapshot, EventLogRead, LogError, LogRecord, Offset,
    PartitionId, StateStore, now_millis,
};
use emitter::{AlertEmitter, EmitError, EmitOutcome};
use evaluator::FraudRuleEvaluator;
use ingress::{Ingress, IngressError};
use std::cell::Cell;
use windowing::{UpsertOutcome, WindowError, WindowStore};

// ---------------------------------------------------------------------------
// WorkerError
// ---------------------------------------------------------------------------

/// Fatal worker failures. Everything per-record is handled internally.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The supplied configuration is invalid.
    #[error("invalid worker configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The input log failed outside its contract (anything but `Closed`).
    #[error("input log error: {0}")]
    Log(LogError),
    /// Alert publishing exhausted its retries; the partition pauses here
    /// so the window is reprocessed after recovery.
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),
    /// Checkpointing failed; continuing would risk duplicate or lost alerts.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

// ---------------------------------------------------------------------------
// WorkerConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`PartitionWorker`].
///
/// Construct via [`WorkerConfig::builder`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// The partition this worker owns.
    pub partition: PartitionId,
    /// Maximum records fetched per batch (>= 1).
    pub fetch_max: usize,
}

/// Builder for [`WorkerConfig`].
///
/// Obtain via [`WorkerConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct WorkerConfigBuilder {
    partition: PartitionId,
    fetch_max: usize,
}

impl WorkerConfig {
    /// Create a builder. `partition` is the only required parameter.
    ///
    /// Default values: `fetch_max = 50`.
    #[must_use]
    pub fn builder(partition: PartitionId) -> WorkerConfigBuilder {
        WorkerConfigBuilder { partition, fetch_max: 50 }
    }
}

impl WorkerConfigBuilder {
    /// Override the per-batch fetch limit.
    #[must_use]
    pub fn fetch_max(mut self, fetch_max: usize) -> Self {
        self.fetch_max = fetch_max;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] when `fetch_max` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<WorkerConfig, WorkerError> {
        if self.fetch_max == 0 {
            return Err(WorkerError::InvalidConfig {
                reason: "fetch_max must be >= 1".to_owned(),
            });
        }
        Ok(WorkerConfig { partition: self.partition, fetch_max: self.fetch_max })
    }
}

// ---------------------------------------------------------------------------
// PartitionWorker
// ---------------------------------------------------------------------------

/// Consumes one partition of the input log and drives the full detection
/// pipeline for its account keys.
///
/// Generic over the three ports for zero-cost static dispatch; holds no
/// concrete adapter references -- dependencies are injected per call.
#[derive(Debug)]
pub struct PartitionWorker {
    config: WorkerConfig,
    ingress: Ingress,
    store: WindowStore,
    evaluator: FraudRuleEvaluator,
    emitter: AlertEmitter,
    checkpoints: CheckpointManager,
    /// First offset not yet processed; only ever advances.
    next_offset: Cell<Offset>,
}

impl PartitionWorker {
    /// Assemble a worker from its components.
    #[must_use]
    pub fn new(
        config: WorkerConfig,
        store: WindowStore,
        evaluator: FraudRuleEvaluator,
        emitter: AlertEmitter,
        checkpoints: CheckpointManager,
    ) -> Self {
        Self {
            config,
            ingress: Ingress::new(),
            store,
            evaluator,
            emitter,
            checkpoints,
            next_offset: Cell::new(0),
        }
    }

    /// Run until the input log closes: recover, then fetch-fold-maintain.
    ///
    /// On `Closed` every remaining live window is evaluated (end-of-stream
    /// means no further event can ever fold in) and a final checkpoint is
    /// taken, so a clean shutdown loses nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Emit`] when publish retries are exhausted,
    /// [`WorkerError::Checkpoint`] on a durable-write failure, or
    /// [`WorkerError::Log`] for out-of-contract log errors.
    pub async fn run<L, S, C>(&self, log: &L, sink: &S, state: &C) -> Result<(), WorkerError>
    where
        L: EventLogRead,
        S: AlertSink,
        C: StateStore,
    {
        self.recover(state).await?;
        loop {
            let batch = match log
                .fetch(self.config.partition, self.next_offset.get(), self.config.fetch_max)
                .await
            {
                Ok(batch) => batch,
                Err(LogError::Closed) => {
                    tracing::info!(
                        "worker.run.stopped: partition={} next_offset={}",
                        self.config.partition,
                        self.next_offset.get()
                    );
                    self.flush(sink).await?;
                    self.checkpoints.checkpoint_now(state, &self.snapshot()).await?;
                    return Ok(());
                }
                Err(e) => return Err(WorkerError::Log(e)),
            };

            for record in &batch {
                self.process_record(record);
                self.next_offset.set(record.offset + 1);
            }
            self.maintain(sink, state).await?;
        }
    }

    /// Fold one record into its account's window. Per-record failures are
    /// logged with enough context to diagnose later and never abort the
    /// partition.
    fn process_record(&self, record: &LogRecord) {
        let partition = self.config.partition;
        let tx = match self.ingress.accept(&record.payload) {
            Ok(tx) => tx,
            Err(IngressError::Serialization(e)) => {
                tracing::warn!(
                    "worker.record.undecodable: partition={partition} offset={} error={e} payload={}",
                    record.offset,
                    String::from_utf8_lossy(&record.payload)
                );
                return;
            }
            Err(e @ IngressError::MalformedEvent { .. }) => {
                tracing::warn!(
                    "worker.record.rejected: partition={partition} offset={} error={e}",
                    record.offset
                );
                return;
            }
        };

        let watermark = self.ingress.watermark();
        match self.store.upsert(&tx, watermark) {
            Ok(UpsertOutcome::Opened(w) | UpsertOutcome::Folded(w)) => {
                tracing::debug!(
                    "worker.record.folded: partition={partition} account={} total={} count={}",
                    w.account_id,
                    w.total_amount,
                    w.transaction_count
                );
            }
            Ok(UpsertOutcome::Duplicate) => {
                tracing::debug!(
                    "worker.record.duplicate: partition={partition} tx={}",
                    tx.transaction_id
                );
            }
            Err(e @ WindowError::LateEventDropped { .. }) => {
                tracing::warn!("worker.record.late: partition={partition} error={e}");
            }
            Err(e) => {
                tracing::error!(
                    "worker.record.failed: partition={partition} tx={} error={e}",
                    tx.transaction_id
                );
            }
        }
    }

    /// Evaluate windows the watermark has closed (or, with `watermark` of
    /// `None`, every live window -- end-of-stream semantics) and publish an
    /// alert for each that crosses the fraud thresholds. A window is
    /// evaluated at most once: the `alerted` flag survives checkpoints.
    async fn evaluate_closed<S: AlertSink>(
        &self,
        sink: &S,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<(), WorkerError> {
        let grace = self.store.grace();
        let candidates: Vec<AccountWindow> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|w| !w.alerted)
            .filter(|w| watermark.is_none_or(|wm| w.is_closed(wm, grace)))
            .collect();
        for window in candidates {
            let Some(decision) = self.evaluator.evaluate(&window) else {
                continue;
            };
            tracing::warn!(
                "worker.fraud_detected: partition={} account={} total={} countries={}",
                self.config.partition,
                window.account_id,
                window.total_amount,
                window.country_count()
            );
            match self.emitter.emit(sink, &decision).await? {
                EmitOutcome::Published(alert) => {
                    self.store.mark_alerted(&window.account_id);
                    tracing::info!(
                        "worker.alert.published: partition={} alert={} score={}",
                        self.config.partition,
                        alert.alert_id,
                        alert.risk_score
                    );
                }
                EmitOutcome::Duplicate { alert_id } => {
                    // Replayed window: the sink already saw this alert.
                    self.store.mark_alerted(&window.account_id);
                    tracing::debug!(
                        "worker.alert.duplicate: partition={} alert={alert_id}",
                        self.config.partition
                    );
                }
            }
        }
        Ok(())
    }

    /// End-of-stream: no further event can fold into any window, so every
    /// live window is final and due for its one evaluation.
    async fn flush<S: AlertSink>(&self, sink: &S) -> Result<(), WorkerError> {
        self.evaluate_closed(sink, None).await
    }

    /// Between-batch housekeeping on the worker's own execution stream:
    /// evaluate windows the watermark closed, evict them, prune the
    /// emitted set, checkpoint if due.
    async fn maintain<S: AlertSink, C: StateStore>(
        &self,
        sink: &S,
        state: &C,
    ) -> Result<(), WorkerError> {
        let watermark = self.ingress.watermark();
        self.evaluate_closed(sink, Some(watermark)).await?;
        let evicted = self.store.evict_expired(watermark);
        let pruned = self.emitter.prune(watermark, self.store.grace());
        if evicted + pruned > 0 {
            tracing::debug!(
                "worker.maintain: partition={} evicted={evicted} pruned={pruned}",
                self.config.partition
            );
        }
        self.checkpoints.maybe_checkpoint(state, || self.snapshot()).await?;
        Ok(())
    }

    /// Assemble the atomic checkpoint unit: windows + watermark + emitted
    /// alerts + next offset.
    fn snapshot(&self) -> CheckpointSnapshot {
        CheckpointSnapshot {
            partition: self.config.partition,
            next_offset: self.next_offset.get(),
            watermark: self.ingress.watermark(),
            windows: self.store.snapshot(),
            emitted: self.emitter.emitted(),
            taken_at: now_millis(),
        }
    }

    /// Restore windows, watermark, emitted set, and position from the last
    /// complete snapshot; consumption resumes strictly after it.
    async fn recover<C: StateStore>(&self, state: &C) -> Result<(), WorkerError> {
        if let Some(snapshot) = self.checkpoints.recover(state, self.config.partition).await? {
            self.next_offset.set(snapshot.next_offset);
            self.ingress.restore_watermark(snapshot.watermark);
            self.store.restore(snapshot.windows);
            self.emitter.restore(snapshot.emitted);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
