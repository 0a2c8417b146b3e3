// Rust guideline compliant 2026-07-11

//! In-memory adapter for the `StateStore` port.
//!
//! Intended for proof-of-concept runs and unit tests only: checkpoints
//! survive worker restarts within one process, not process crashes. The
//! atomicity contract is trivially met -- a whole-snapshot replacement per
//! partition under a single borrow.

use std::cell::RefCell;
use std::collections::HashMap;

use domain::{CheckpointSnapshot, PartitionId, StateStore, StateStoreError};

/// `StateStore` adapter backed by a per-partition `HashMap` entry.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: RefCell<HashMap<PartitionId, CheckpointSnapshot>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions with a persisted snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// True when nothing has been checkpointed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    /// Replace the partition's snapshot in one step.
    ///
    /// # Errors
    ///
    /// Infallible for this adapter; the signature follows the port.
    async fn persist(&self, snapshot: &CheckpointSnapshot) -> Result<(), StateStoreError> {
        self.inner.borrow_mut().insert(snapshot.partition, snapshot.clone());
        Ok(())
    }

    async fn load(
        &self,
        partition: PartitionId,
    ) -> Result<Option<CheckpointSnapshot>, StateStoreError> {
        Ok(self.inner.borrow().get(&partition).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
