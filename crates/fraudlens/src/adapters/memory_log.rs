// Rust guideline compliant 2026-07-11

//! In-memory adapter for the `EventLog` and `EventLogRead` ports.
//!
//! A partitioned, offset-addressable record log. Unlike a plain queue,
//! records are RETAINED after being fetched so recovery can replay from a
//! checkpointed offset; acceptable at demo scale. Each partition carries a
//! base offset, letting a process that recovered durable positions resume
//! numbering where the previous run stopped (everything below the base
//! counts as trimmed). An empty open partition cooperatively yields rather
//! than signaling `Closed`; explicit `close()` signals end-of-data to
//! readers. Designed for `tokio::join!` on a `current_thread` runtime.

use std::cell::RefCell;

use domain::{EventLog, EventLogRead, LogError, LogRecord, Offset, PartitionId};

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

/// One partition: records at offsets `base..base + records.len()`.
#[derive(Debug)]
struct PartitionLog {
    base: Offset,
    records: Vec<LogRecord>,
}

/// Heap storage for all partitions plus the close flag.
#[derive(Debug)]
struct MemoryLogInner {
    partitions: Vec<PartitionLog>,
    closed: bool,
}

// ---------------------------------------------------------------------------
// MemoryLog
// ---------------------------------------------------------------------------

/// Partitioned in-memory log shared by the source (append) and the
/// partition workers (fetch).
///
/// Shares a single `RefCell` across both trait impls. Safe on
/// `current_thread` runtimes because borrows are always dropped before any
/// `.await` point inside `fetch`, preventing re-entrant borrow panics.
#[derive(Debug)]
pub struct MemoryLog {
    inner: RefCell<MemoryLogInner>,
}

impl MemoryLog {
    /// Create an open log with `partitions` empty partitions starting at
    /// offset zero.
    #[must_use]
    pub fn new(partitions: PartitionId) -> Self {
        Self::with_base_offsets(vec![0; partitions.max(1) as usize])
    }

    /// Create an open log whose partitions start at the given offsets.
    ///
    /// Used when durable checkpoints outlive the log itself: appends
    /// continue at the recovered positions, and everything below a base is
    /// treated as trimmed away.
    #[must_use]
    pub fn with_base_offsets(bases: Vec<Offset>) -> Self {
        let partitions = bases
            .into_iter()
            .map(|base| PartitionLog { base, records: vec![] })
            .collect();
        Self { inner: RefCell::new(MemoryLogInner { partitions, closed: false }) }
    }

    /// Signal end-of-data. Idempotent: safe to call multiple times.
    pub fn close(&self) {
        self.inner.borrow_mut().closed = true;
    }

    /// Number of records appended to `partition` so far (excluding trim).
    #[must_use]
    pub fn len(&self, partition: PartitionId) -> usize {
        self.inner
            .borrow()
            .partitions
            .get(partition as usize)
            .map_or(0, |p| p.records.len())
    }

    /// True when `partition` holds no records.
    #[must_use]
    pub fn is_empty(&self, partition: PartitionId) -> bool {
        self.len(partition) == 0
    }
}

impl EventLog for MemoryLog {
    /// Append `payload` to `partition` if the log is open.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Closed`] once closed, or [`LogError::Full`] for
    /// an unknown partition (capacity reports the partition count).
    async fn append(&self, partition: PartitionId, payload: Vec<u8>) -> Result<Offset, LogError> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return Err(LogError::Closed);
        }
        let count = inner.partitions.len();
        let Some(p) = inner.partitions.get_mut(partition as usize) else {
            return Err(LogError::Full { capacity: count });
        };
        let offset = p.base + p.records.len() as Offset;
        p.records.push(LogRecord { offset, payload });
        Ok(offset)
    }
}

impl EventLogRead for MemoryLog {
    /// Return up to `max` records at offsets `>= from`; yield and retry
    /// while the partition is open but has nothing new. A `from` below the
    /// partition's base resumes at the base (the gap was trimmed).
    ///
    /// Loops via `tokio::task::yield_now` so other futures in a
    /// `tokio::join!` make progress. The `RefCell` borrow is always
    /// released before the yield point.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Closed`] when the log is closed and no records
    /// at or after `from` remain.
    async fn fetch(
        &self,
        partition: PartitionId,
        from: Offset,
        max: usize,
    ) -> Result<Vec<LogRecord>, LogError> {
        loop {
            // Scope the borrow so it is dropped before yield_now().await.
            let result = {
                let inner = self.inner.borrow();
                match inner.partitions.get(partition as usize) {
                    Some(p) => {
                        let idx = from.saturating_sub(p.base) as usize;
                        if idx < p.records.len() {
                            let take = max.min(p.records.len() - idx);
                            Some(Ok(p.records[idx..idx + take].to_vec()))
                        } else if inner.closed {
                            Some(Err(LogError::Closed))
                        } else {
                            None
                        }
                    }
                    None if inner.closed => Some(Err(LogError::Closed)),
                    None => None,
                }
            }; // borrow dropped here

            match result {
                Some(r) => return r,
                None => tokio::task::yield_now().await,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::MemoryLog;
    use domain::{EventLog as _, EventLogRead as _, LogError};

    // ML-T01: append assigns consecutive offsets per partition.
    #[tokio::test]
    async fn append_assigns_offsets_per_partition() {
        let log = MemoryLog::new(2);
        assert_eq!(log.append(0, b"a".to_vec()).await.unwrap(), 0);
        assert_eq!(log.append(0, b"b".to_vec()).await.unwrap(), 1);
        assert_eq!(log.append(1, b"c".to_vec()).await.unwrap(), 0);
        assert_eq!(log.len(0), 2);
        assert_eq!(log.len(1), 1);
    }

    // ML-T02: fetch honors the from-offset and retains records for replay.
    #[tokio::test]
    async fn fetch_from_offset_supports_replay() {
        let log = MemoryLog::new(1);
        for payload in [b"a", b"b", b"c"] {
            log.append(0, payload.to_vec()).await.unwrap();
        }
        log.close();

        let tail = log.fetch(0, 1, 10).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].offset, 1);
        // Replay from zero still sees everything.
        let all = log.fetch(0, 0, 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    // ML-T03: fetch caps the batch at max.
    #[tokio::test]
    async fn fetch_caps_batch_at_max() {
        let log = MemoryLog::new(1);
        for i in 0..5u8 {
            log.append(0, vec![i]).await.unwrap();
        }
        let batch = log.fetch(0, 0, 2).await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    // ML-T04: closed and drained partition returns Err(Closed).
    #[tokio::test]
    async fn drained_closed_partition_returns_closed() {
        let log = MemoryLog::new(1);
        log.append(0, b"a".to_vec()).await.unwrap();
        log.close();
        log.fetch(0, 0, 10).await.unwrap();
        let result = log.fetch(0, 1, 10).await;
        assert_eq!(result, Err(LogError::Closed));
    }

    // ML-T05: append after close is rejected.
    #[tokio::test]
    async fn append_after_close_is_rejected() {
        let log = MemoryLog::new(1);
        log.close();
        log.close(); // idempotent
        assert_eq!(log.append(0, b"a".to_vec()).await, Err(LogError::Closed));
    }

    // ML-T06: unknown partition reports Full with the partition count.
    #[tokio::test]
    async fn unknown_partition_is_full_error() {
        let log = MemoryLog::new(2);
        let result = log.append(7, b"a".to_vec()).await;
        assert_eq!(result, Err(LogError::Full { capacity: 2 }));
    }

    // ML-T07: fetch yields on empty+open; a concurrent append unblocks it.
    #[tokio::test]
    async fn yield_unblocks_fetch() {
        let log = MemoryLog::new(1);
        let (fetched, _) = tokio::join!(log.fetch(0, 0, 1), async {
            log.append(0, b"x".to_vec()).await.unwrap();
        });
        assert_eq!(fetched.unwrap().len(), 1);
    }

    // ML-T08: base offsets continue durable numbering across a restart.
    #[tokio::test]
    async fn base_offsets_continue_numbering() {
        let log = MemoryLog::with_base_offsets(vec![100, 7]);
        assert_eq!(log.append(0, b"a".to_vec()).await.unwrap(), 100);
        assert_eq!(log.append(1, b"b".to_vec()).await.unwrap(), 7);
        log.close();

        // A reader resuming at the recovered position sees the new record.
        let batch = log.fetch(0, 100, 10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].offset, 100);
        // Requests below the base resume at the base: that gap is trimmed.
        let trimmed = log.fetch(0, 0, 10).await.unwrap();
        assert_eq!(trimmed[0].offset, 100);
    }
}
