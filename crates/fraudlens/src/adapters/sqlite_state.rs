// Rust guideline compliant 2026-07-13

//! SQLite adapter for the `StateStore` port.
//!
//! Persists one checkpoint row per partition via `sqlx`. The whole
//! snapshot (windows, watermark, emitted alerts, next offset) is one JSON
//! column written with `INSERT OR REPLACE`: SQLite replaces the row
//! atomically, so a crash mid-checkpoint leaves either the previous
//! snapshot or the new one -- never a mixture. That single-row write IS the
//! pipeline's transactional boundary.
//!
//! # Dependency note
//!
//! `sqlx` is a hard dependency (no feature flag). This is intentional for
//! a proof-of-concept binary where build-complexity trade-offs favour
//! simplicity over optional compilation.

use domain::{CheckpointSnapshot, PartitionId, StateStore, StateStoreError};

/// `StateStore` adapter backed by a SQLite database file via `sqlx`.
///
/// Connects to (or creates) a SQLite file and ensures the `checkpoints`
/// table exists.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: sqlx::SqlitePool,
}

impl SqliteStateStore {
    /// Open or create a SQLite database and initialize the schema.
    ///
    /// Passes `create_if_missing(true)` so the database file is created on
    /// first run without manual setup. The `checkpoints` table is created
    /// via `CREATE TABLE IF NOT EXISTS`, making repeated calls safe.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` when the connection or schema creation fails.
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        // create_if_missing: sqlx 0.8 defaults to false for file databases;
        // enable explicitly so the demo works out of the box on first run.
        let opts = db_url
            .parse::<sqlx::sqlite::SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(opts).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                partition   INTEGER PRIMARY KEY,
                next_offset INTEGER NOT NULL,
                taken_at    TEXT    NOT NULL,
                snapshot    TEXT    NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

impl StateStore for SqliteStateStore {
    /// Replace the partition's checkpoint row atomically.
    ///
    /// `next_offset` and `taken_at` are denormalized into their own
    /// columns for operator inspection; the snapshot column is the source
    /// of truth on recovery.
    ///
    /// # Errors
    ///
    /// Returns `StateStoreError::Unavailable` on any `sqlx` error
    /// (connection failure, disk full, etc.). The underlying error is
    /// logged at `error` level before mapping.
    async fn persist(&self, snapshot: &CheckpointSnapshot) -> Result<(), StateStoreError> {
        let json = serde_json::to_string(snapshot).map_err(|e| {
            StateStoreError::Unavailable { reason: format!("snapshot encode: {e}") }
        })?;
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints (partition, next_offset, taken_at, snapshot)
             VALUES (?, ?, ?, ?)",
        )
        .bind(i64::from(snapshot.partition))
        .bind(snapshot.next_offset as i64)
        .bind(snapshot.taken_at.to_rfc3339())
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("sqlite_state.persist: {e}");
            StateStoreError::Unavailable { reason: e.to_string() }
        })?;
        Ok(())
    }

    async fn load(
        &self,
        partition: PartitionId,
    ) -> Result<Option<CheckpointSnapshot>, StateStoreError> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT snapshot FROM checkpoints WHERE partition = ?")
                .bind(i64::from(partition))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("sqlite_state.load: {e}");
                    StateStoreError::Unavailable { reason: e.to_string() }
                })?;
        row.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| StateStoreError::Corrupt { partition, reason: e.to_string() })
        })
        .transpose()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::SqliteStateStore;
    use chrono::{DateTime, TimeDelta, Utc};
    use domain::{AccountWindow, CheckpointSnapshot, StateStore as _, Transaction};
    use rust_decimal_macros::dec;

    // Each test opens a fresh in-memory SQLite database, so tests are
    // fully isolated with no on-disk side-effects.
    async fn make_store() -> SqliteStateStore {
        SqliteStateStore::new("sqlite::memory:")
            .await
            .expect("in-memory SQLite should open")
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_snapshot(partition: u32, next_offset: u64) -> CheckpointSnapshot {
        let tx = Transaction {
            transaction_id: "TXN-1".to_owned(),
            account_id: "ACC-001".to_owned(),
            amount: dec!(250.00),
            country: "ES".to_owned(),
            currency: "EUR".to_owned(),
            transaction_type: "PURCHASE".to_owned(),
            timestamp: ts(10),
            merchant_name: None,
            description: None,
        };
        CheckpointSnapshot {
            partition,
            next_offset,
            watermark: ts(10),
            windows: vec![AccountWindow::open(&tx, TimeDelta::minutes(5))],
            emitted: vec![],
            taken_at: ts(11),
        }
    }

    // SQ-T01: persist then load roundtrips the full snapshot.
    #[tokio::test]
    async fn persist_load_roundtrip() {
        let store = make_store().await;
        let snapshot = make_snapshot(0, 42);
        store.persist(&snapshot).await.unwrap();
        let loaded = store.load(0).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    // SQ-T02: missing partition loads None.
    #[tokio::test]
    async fn missing_partition_is_none() {
        let store = make_store().await;
        assert!(store.load(3).await.unwrap().is_none());
    }

    // SQ-T03: REPLACE keeps exactly one row per partition, latest wins.
    #[tokio::test]
    async fn replace_keeps_latest_row() {
        let store = make_store().await;
        store.persist(&make_snapshot(0, 5)).await.unwrap();
        store.persist(&make_snapshot(0, 17)).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkpoints")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "expected 1 row after REPLACE, got {count}");
        assert_eq!(store.load(0).await.unwrap().unwrap().next_offset, 17);
    }

    // SQ-T04: partitions are isolated from each other.
    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = make_store().await;
        store.persist(&make_snapshot(0, 5)).await.unwrap();
        store.persist(&make_snapshot(1, 9)).await.unwrap();
        assert_eq!(store.load(0).await.unwrap().unwrap().next_offset, 5);
        assert_eq!(store.load(1).await.unwrap().unwrap().next_offset, 9);
    }

    // SQ-T05: a corrupt row surfaces as Corrupt, not a panic.
    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let store = make_store().await;
        sqlx::query(
            "INSERT INTO checkpoints (partition, next_offset, taken_at, snapshot)
             VALUES (0, 0, 'x', '{broken')",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        let result = store.load(0).await;
        assert!(
            matches!(result, Err(domain::StateStoreError::Corrupt { partition: 0, .. })),
            "expected Corrupt, got {result:?}"
        );
    }
}
