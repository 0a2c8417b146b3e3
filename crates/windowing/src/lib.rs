// Rust guideline compliant 2026-07-09

//! Window Store and Aggregator -- keyed rolling aggregates with sliding,
//! restart-on-gap window semantics and watermark-driven eviction.
//!
//! Entry points: [`WindowStore::upsert`], [`WindowStore::evict_expired`],
//! [`WindowStore::snapshot`] / [`WindowStore::restore`].
//! Configuration via [`WindowConfig::builder`].
//!
//! # Windowing policy
//!
//! Windows are anchored to transactions, not to clock-aligned buckets: the
//! first event for an account (after any prior window expired) opens a
//! window with `window_end = event time` and `window_start = window_end -
//! window_size`. Later events for the same account slide both bounds
//! forward as long as every folded event still fits one window span; once
//! the span would be exceeded the window restarts at the new event. This
//! catches a burst of activity within ANY window-sized interval, which a
//! fixed tumbling grid would split.

use chrono::{DateTime, TimeDelta, Utc};
use domain::{AccountWindow, Transaction};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// WindowError
// ---------------------------------------------------------------------------

/// Errors from window configuration or aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// The supplied configuration is invalid.
    #[error("invalid window configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The event precedes what the watermark still admits; dropped without
    /// mutating any window. Non-fatal: the caller logs and continues.
    #[error(
        "late event dropped: tx={transaction_id} account={account_id} \
         event_time={timestamp} earliest_accepted={earliest_accepted}"
    )]
    LateEventDropped {
        transaction_id: String,
        account_id: String,
        timestamp: DateTime<Utc>,
        earliest_accepted: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// WindowConfig + builder
// ---------------------------------------------------------------------------

/// Event-time window parameters.
///
/// Construct via [`WindowConfig::builder`].
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Fixed window span (`window_end - window_start`).
    window_size: TimeDelta,
    /// Extra time past `window_end` during which late events are accepted.
    grace: TimeDelta,
}

/// Builder for [`WindowConfig`].
///
/// Obtain via [`WindowConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct WindowConfigBuilder {
    window_size: Duration,
    grace: Duration,
}

impl WindowConfig {
    /// Create a builder with the pipeline defaults: 5-minute window,
    /// 1-minute grace period.
    #[must_use]
    pub fn builder() -> WindowConfigBuilder {
        WindowConfigBuilder {
            window_size: Duration::from_secs(300),
            grace: Duration::from_secs(60),
        }
    }

    /// The fixed window span.
    #[must_use]
    pub fn window_size(&self) -> TimeDelta {
        self.window_size
    }

    /// The grace period for late events.
    #[must_use]
    pub fn grace(&self) -> TimeDelta {
        self.grace
    }
}

impl WindowConfigBuilder {
    /// Override the window size.
    #[must_use]
    pub fn window_size(mut self, window_size: Duration) -> Self {
        self.window_size = window_size;
        self
    }

    /// Override the grace period.
    #[must_use]
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidConfig`] when the window size is zero
    /// or either duration does not fit event-time arithmetic.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<WindowConfig, WindowError> {
        if self.window_size.is_zero() {
            return Err(WindowError::InvalidConfig {
                reason: "window_size must be > 0".to_owned(),
            });
        }
        let window_size = TimeDelta::from_std(self.window_size).map_err(|e| {
            WindowError::InvalidConfig { reason: format!("window_size out of range: {e}") }
        })?;
        let grace = TimeDelta::from_std(self.grace).map_err(|e| {
            WindowError::InvalidConfig { reason: format!("grace out of range: {e}") }
        })?;
        Ok(WindowConfig { window_size, grace })
    }
}

// ---------------------------------------------------------------------------
// WindowStore
// ---------------------------------------------------------------------------

/// Result of applying one transaction to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new window was opened, seeded with this transaction.
    Opened(AccountWindow),
    /// The transaction was folded into (or slid) the live window.
    Folded(AccountWindow),
    /// The transaction id was already folded; state unchanged.
    Duplicate,
}

/// Keyed store of live [`AccountWindow`]s for one partition.
///
/// Exclusively owned by the partition's worker: interior mutability via
/// `RefCell` is safe because all access happens on that worker's single
/// execution stream.
#[derive(Debug)]
pub struct WindowStore {
    config: WindowConfig,
    windows: RefCell<HashMap<String, AccountWindow>>,
}

impl WindowStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: WindowConfig) -> Self {
        Self { config, windows: RefCell::new(HashMap::new()) }
    }

    /// Apply one transaction, opening, sliding, or folding into the
    /// account's window as the policy dictates.
    ///
    /// `watermark` is the partition's current event-time watermark,
    /// already advanced past this transaction's own timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::LateEventDropped`] when the event precedes
    /// the live window's start by more than the grace period, or would
    /// open a window the watermark has already closed. State is unchanged.
    pub fn upsert(
        &self,
        tx: &Transaction,
        watermark: DateTime<Utc>,
    ) -> Result<UpsertOutcome, WindowError> {
        let size = self.config.window_size;
        let grace = self.config.grace;
        let mut windows = self.windows.borrow_mut();

        if let Some(window) = windows.get_mut(&tx.account_id)
            && !window.is_closed(watermark, grace)
        {
            if window.seen_transactions.contains(&tx.transaction_id) {
                tracing::debug!(
                    "window_store.duplicate: tx={} account={}",
                    tx.transaction_id,
                    tx.account_id
                );
                return Ok(UpsertOutcome::Duplicate);
            }
            let earliest_accepted = window.window_start - grace;
            if tx.timestamp < earliest_accepted {
                return Err(WindowError::LateEventDropped {
                    transaction_id: tx.transaction_id.clone(),
                    account_id: tx.account_id.clone(),
                    timestamp: tx.timestamp,
                    earliest_accepted,
                });
            }
            if tx.timestamp > window.window_end {
                if tx.timestamp - size <= window.earliest_event {
                    // Burst still fits one span: slide both bounds forward.
                    window.slide_to(tx.timestamp, size);
                    window.fold(tx);
                    return Ok(UpsertOutcome::Folded(window.clone()));
                }
                // Gap: restart a fresh window anchored at this event.
                let fresh = AccountWindow::open(tx, size);
                tracing::debug!(
                    "window_store.restart: account={} window_end={}",
                    tx.account_id,
                    fresh.window_end
                );
                let outcome = UpsertOutcome::Opened(fresh.clone());
                windows.insert(tx.account_id.clone(), fresh);
                return Ok(outcome);
            }
            window.fold(tx);
            return Ok(UpsertOutcome::Folded(window.clone()));
        }

        // No live window. Refuse to open one the watermark already closed.
        if tx.timestamp + grace < watermark {
            return Err(WindowError::LateEventDropped {
                transaction_id: tx.transaction_id.clone(),
                account_id: tx.account_id.clone(),
                timestamp: tx.timestamp,
                earliest_accepted: watermark - grace,
            });
        }
        let fresh = AccountWindow::open(tx, size);
        tracing::debug!(
            "window_store.open: account={} window_start={} window_end={}",
            tx.account_id,
            fresh.window_start,
            fresh.window_end
        );
        let outcome = UpsertOutcome::Opened(fresh.clone());
        windows.insert(tx.account_id.clone(), fresh);
        Ok(outcome)
    }

    /// Retire every window whose `window_end + grace` the watermark has
    /// passed, freeing its memory. Returns the number evicted.
    pub fn evict_expired(&self, watermark: DateTime<Utc>) -> usize {
        let grace = self.config.grace;
        let mut windows = self.windows.borrow_mut();
        let before = windows.len();
        windows.retain(|account, window| {
            let keep = !window.is_closed(watermark, grace);
            if !keep {
                tracing::debug!(
                    "window_store.evict: account={account} window_end={}",
                    window.window_end
                );
            }
            keep
        });
        before - windows.len()
    }

    /// Record that the account's live window has produced its alert.
    pub fn mark_alerted(&self, account_id: &str) {
        if let Some(window) = self.windows.borrow_mut().get_mut(account_id) {
            window.alerted = true;
        }
    }

    /// Copy of the account's live window, if any.
    #[must_use]
    pub fn get(&self, account_id: &str) -> Option<AccountWindow> {
        self.windows.borrow().get(account_id).cloned()
    }

    /// All live windows, ordered by account id for deterministic snapshots.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AccountWindow> {
        let mut windows: Vec<AccountWindow> = self.windows.borrow().values().cloned().collect();
        windows.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        windows
    }

    /// Replace the store contents from a recovered snapshot.
    pub fn restore(&self, windows: Vec<AccountWindow>) {
        let mut map = self.windows.borrow_mut();
        map.clear();
        for window in windows {
            map.insert(window.account_id.clone(), window);
        }
    }

    /// Grace period configured for this store.
    #[must_use]
    pub fn grace(&self) -> TimeDelta {
        self.config.grace
    }

    /// Number of live windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.borrow().len()
    }

    /// True when no window is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
