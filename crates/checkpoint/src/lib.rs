// Rust guideline compliant 2026-07-10

//! Checkpoint/Recovery Manager -- periodic atomic persistence of a
//! partition's processing state and restart recovery.
//!
//! Entry points: [`CheckpointManager::maybe_checkpoint`],
//! [`CheckpointManager::checkpoint_now`], [`CheckpointManager::recover`].
//! Configuration via [`CheckpointConfig::builder`].
//!
//! A snapshot bundles window contents, the watermark, the emitted-alert
//! set, and the next input offset into ONE [`domain::StateStore::persist`]
//! call; the port contract makes that write atomic, so a crash never
//! exposes a partial checkpoint. Store failures are fatal to the worker --
//! continuing past an unpersistable position could duplicate or lose
//! alerts.

use domain::{CheckpointSnapshot, PartitionId, StateStore, StateStoreError};
use std::cell::Cell;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CheckpointError
// ---------------------------------------------------------------------------

/// Errors from checkpointing or recovery. All variants are fatal to the
/// owning worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckpointError {
    /// The durable store rejected a read or write.
    #[error("checkpoint store failure: {0}")]
    Store(#[from] StateStoreError),
}

// ---------------------------------------------------------------------------
// CheckpointConfig + builder
// ---------------------------------------------------------------------------

/// Checkpoint cadence.
///
/// Construct via [`CheckpointConfig::builder`].
#[derive(Debug, Clone, Copy)]
pub struct CheckpointConfig {
    /// Processing-time interval between periodic checkpoints.
    interval: Duration,
}

/// Builder for [`CheckpointConfig`].
///
/// Obtain via [`CheckpointConfig::builder`]; finalize with
/// [`build`](Self::build).
#[derive(Debug)]
pub struct CheckpointConfigBuilder {
    interval: Duration,
}

impl CheckpointConfig {
    /// Create a builder with the default 10-second interval.
    #[must_use]
    pub fn builder() -> CheckpointConfigBuilder {
        CheckpointConfigBuilder { interval: Duration::from_secs(10) }
    }

    /// The configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl CheckpointConfigBuilder {
    /// Override the interval. `Duration::ZERO` makes every check due,
    /// which tests use to checkpoint on demand.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Build the configuration. All intervals are valid.
    #[must_use]
    pub fn build(self) -> CheckpointConfig {
        CheckpointConfig { interval: self.interval }
    }
}

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Drives periodic checkpointing for one partition.
///
/// Owned by the partition worker and scheduled on its single execution
/// stream, so a checkpoint never observes a half-applied mutation.
#[derive(Debug)]
pub struct CheckpointManager {
    config: CheckpointConfig,
    last_persisted: Cell<Instant>,
}

impl CheckpointManager {
    /// Create a manager whose interval starts counting now.
    #[must_use]
    pub fn new(config: CheckpointConfig) -> Self {
        Self { config, last_persisted: Cell::new(Instant::now()) }
    }

    /// True when the configured interval has elapsed since the last
    /// successful checkpoint.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.last_persisted.get().elapsed() >= self.config.interval
    }

    /// Persist `snapshot` unconditionally and restart the interval.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Store`] on a durable-write failure; the
    /// caller must stop processing.
    pub async fn checkpoint_now<S: StateStore>(
        &self,
        store: &S,
        snapshot: &CheckpointSnapshot,
    ) -> Result<(), CheckpointError> {
        store.persist(snapshot).await?;
        self.last_persisted.set(Instant::now());
        tracing::info!(
            "checkpoint.persisted: partition={} next_offset={} windows={} emitted={}",
            snapshot.partition,
            snapshot.next_offset,
            snapshot.windows.len(),
            snapshot.emitted.len()
        );
        Ok(())
    }

    /// Persist a snapshot if one is due. The snapshot is built lazily so
    /// quiet checks stay cheap. Returns whether a checkpoint was taken.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Store`] on a durable-write failure.
    pub async fn maybe_checkpoint<S, F>(&self, store: &S, build: F) -> Result<bool, CheckpointError>
    where
        S: StateStore,
        F: FnOnce() -> CheckpointSnapshot,
    {
        if !self.is_due() {
            return Ok(false);
        }
        self.checkpoint_now(store, &build()).await?;
        Ok(true)
    }

    /// Load the last complete snapshot for `partition`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Store`] when the store cannot be read or
    /// the stored snapshot is corrupt.
    pub async fn recover<S: StateStore>(
        &self,
        store: &S,
        partition: PartitionId,
    ) -> Result<Option<CheckpointSnapshot>, CheckpointError> {
        let snapshot = store.load(partition).await?;
        match &snapshot {
            Some(s) => tracing::info!(
                "checkpoint.recovered: partition={partition} next_offset={} windows={}",
                s.next_offset,
                s.windows.len()
            ),
            None => tracing::info!("checkpoint.recovered: partition={partition} empty"),
        }
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
