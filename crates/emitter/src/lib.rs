// Rust guideline compliant 2026-07-10

//! Alert Emitter -- turns fraud decisions into immutable alerts and
//! publishes them with exactly-once visible effect.
//!
//! Entry points: [`AlertEmitter::emit`], [`AlertEmitter::derive_alert_id`].
//! Configuration via [`EmitterConfig::builder`].
//!
//! Exactly-once is achieved with two cooperating mechanisms:
//! deterministic alert identifiers derived from
//! `(account_id, window_start, window_end)` -- a replayed window re-derives
//! the SAME id, so duplicates are detectable downstream -- and a local
//! emitted-id set that is checkpointed with the window state, so recovery
//! knows which alerts the sink has already acknowledged.

use chrono::{DateTime, TimeDelta, Utc};
use domain::{
    AlertSink, EmittedAlert, FraudAlert, FraudDecision, MULTI_COUNTRY_FRAUD_TYPE, PublishError,
    now_millis,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EmitError
// ---------------------------------------------------------------------------

/// Errors from alert emission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    /// The supplied configuration is invalid.
    #[error("invalid emitter configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// Every publish attempt failed; fatal for this alert. The caller must
    /// stop consuming so the window is reprocessed after recovery.
    #[error("publish retries exhausted for {alert_id} after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        alert_id: String,
        attempts: u32,
        /// The final transient failure.
        last: PublishError,
    },
}

// ---------------------------------------------------------------------------
// EmitterConfig + builder
// ---------------------------------------------------------------------------

/// Retry policy for alert publishing.
///
/// Construct via [`EmitterConfig::builder`].
#[derive(Debug, Clone, Copy)]
pub struct EmitterConfig {
    /// Total publish attempts before giving up (>= 1).
    max_attempts: u32,
    /// First retry delay; doubles on every subsequent attempt.
    backoff_base: Duration,
}

/// Builder for [`EmitterConfig`].
///
/// Obtain via [`EmitterConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct EmitterConfigBuilder {
    max_attempts: u32,
    backoff_base: Duration,
}

impl EmitterConfig {
    /// Create a builder with the defaults: 5 attempts, 100 ms base backoff.
    #[must_use]
    pub fn builder() -> EmitterConfigBuilder {
        EmitterConfigBuilder {
            max_attempts: 5,
            // 100 ms keeps worst-case blocking under two seconds.
            backoff_base: Duration::from_millis(100),
        }
    }
}

impl EmitterConfigBuilder {
    /// Override the attempt limit.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the base backoff delay (tests use `Duration::ZERO`).
    #[must_use]
    pub fn backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::InvalidConfig`] when `max_attempts` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<EmitterConfig, EmitError> {
        if self.max_attempts == 0 {
            return Err(EmitError::InvalidConfig {
                reason: "max_attempts must be >= 1".to_owned(),
            });
        }
        Ok(EmitterConfig {
            max_attempts: self.max_attempts,
            backoff_base: self.backoff_base,
        })
    }
}

// ---------------------------------------------------------------------------
// AlertEmitter
// ---------------------------------------------------------------------------

/// Outcome of an emit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The alert was published and acknowledged.
    Published(FraudAlert),
    /// An alert with this id was already acknowledged; nothing was sent.
    Duplicate { alert_id: String },
}

/// Publishes alerts through an [`AlertSink`] port with duplicate
/// suppression and bounded, backed-off retries.
///
/// Owned by a single partition worker; interior mutability via `RefCell`
/// follows the single-writer discipline of the rest of the pipeline.
#[derive(Debug)]
pub struct AlertEmitter {
    config: EmitterConfig,
    /// Acknowledged alert ids with the window end that bounds their retention.
    emitted: RefCell<HashMap<String, DateTime<Utc>>>,
}

impl AlertEmitter {
    /// Create an emitter with an empty emitted set.
    #[must_use]
    pub fn new(config: EmitterConfig) -> Self {
        Self { config, emitted: RefCell::new(HashMap::new()) }
    }

    /// Derive the alert identifier for a window instance.
    ///
    /// UUID v5 over `account_id|window_start_millis|window_end_millis`:
    /// stable across processes, replays, and restarts. Never random -- a
    /// random id would break exactly-once under reprocessing.
    #[must_use]
    pub fn derive_alert_id(
        account_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> String {
        let key = format!(
            "{account_id}|{}|{}",
            window_start.timestamp_millis(),
            window_end.timestamp_millis()
        );
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
        format!("FRAUD-{}", id.simple().to_string().to_uppercase())
    }

    /// Build the alert for `decision` and publish it.
    ///
    /// Returns [`EmitOutcome::Duplicate`] without touching the sink when
    /// the derived id was already acknowledged. Transient sink failures are
    /// retried with exponential backoff up to the configured attempt limit.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::RetriesExhausted`] when every attempt failed;
    /// the emitted set is NOT updated, so the alert is retried after
    /// recovery.
    pub async fn emit<S: AlertSink>(
        &self,
        sink: &S,
        decision: &FraudDecision,
    ) -> Result<EmitOutcome, EmitError> {
        let alert_id = Self::derive_alert_id(
            &decision.account_id,
            decision.window_start,
            decision.window_end,
        );
        if self.emitted.borrow().contains_key(&alert_id) {
            tracing::debug!(
                "emitter.duplicate_suppressed: alert={alert_id} account={}",
                decision.account_id
            );
            return Ok(EmitOutcome::Duplicate { alert_id });
        }

        let alert = FraudAlert {
            alert_id: alert_id.clone(),
            account_id: decision.account_id.clone(),
            alert_type: MULTI_COUNTRY_FRAUD_TYPE.to_owned(),
            total_amount: decision.total_amount,
            countries_involved: decision.countries.clone(),
            transaction_count: decision.transaction_count,
            window_start: decision.window_start,
            window_end: decision.window_end,
            alert_timestamp: now_millis(),
            risk_score: decision.risk_score,
            description: decision.description.clone(),
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match sink.publish(&alert).await {
                Ok(()) => {
                    self.emitted.borrow_mut().insert(alert_id, decision.window_end);
                    tracing::info!(
                        "emitter.published: alert={} account={} score={}",
                        alert.alert_id,
                        alert.account_id,
                        alert.risk_score
                    );
                    return Ok(EmitOutcome::Published(alert));
                }
                Err(e) if attempt < self.config.max_attempts => {
                    let backoff =
                        self.config.backoff_base * 2u32.saturating_pow(attempt.min(16) - 1);
                    tracing::warn!(
                        "emitter.retry: alert={alert_id} attempt={attempt} backoff={backoff:?} error={e}"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(EmitError::RetriesExhausted { alert_id, attempts: attempt, last: e });
                }
            }
        }
    }

    /// Acknowledged alert ids for checkpointing, ordered for determinism.
    #[must_use]
    pub fn emitted(&self) -> Vec<EmittedAlert> {
        let mut out: Vec<EmittedAlert> = self
            .emitted
            .borrow()
            .iter()
            .map(|(alert_id, window_end)| EmittedAlert {
                alert_id: alert_id.clone(),
                window_end: *window_end,
            })
            .collect();
        out.sort_by(|a, b| a.alert_id.cmp(&b.alert_id));
        out
    }

    /// Reload the emitted set from a recovered checkpoint.
    pub fn restore(&self, emitted: Vec<EmittedAlert>) {
        let mut map = self.emitted.borrow_mut();
        map.clear();
        for e in emitted {
            map.insert(e.alert_id, e.window_end);
        }
    }

    /// Forget ids whose window the watermark has retired; keeps the set
    /// bounded to live-window retention. Returns the number pruned.
    pub fn prune(&self, watermark: DateTime<Utc>, grace: TimeDelta) -> usize {
        let mut map = self.emitted.borrow_mut();
        let before = map.len();
        map.retain(|_, window_end| *window_end + grace >= watermark);
        before - map.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
