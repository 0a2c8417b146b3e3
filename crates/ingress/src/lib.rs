// Rust guideline compliant 2026-07-09

//! Event Ingress -- payload decoding, well-formedness validation,
//! deterministic partition routing, and event-time watermark tracking.
//!
//! Entry points: [`partition_for`], [`Ingress::accept`],
//! [`WatermarkTracker`].
//!
//! Routing uses FNV-1a over the account id: unlike the standard library's
//! `DefaultHasher`, the result is stable across processes and releases, so
//! an account always lands on the same partition and per-key ordering is
//! preserved across restarts.

use chrono::{DateTime, Utc};
use domain::codec::CodecError;
use domain::{PartitionId, Transaction, codec};
use rust_decimal::Decimal;
use std::cell::Cell;

// ---------------------------------------------------------------------------
// IngressError
// ---------------------------------------------------------------------------

/// Per-record ingress failures. Both variants are isolated: the worker
/// logs them (with enough context to diagnose later) and keeps consuming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngressError {
    /// The payload could not be decoded at all.
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),
    /// The record decoded but violates the transaction contract.
    #[error("malformed event: tx={transaction_id} {reason}")]
    MalformedEvent {
        /// Offending transaction id; may be empty when that field is the problem.
        transaction_id: String,
        /// Which contract clause failed.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Partition routing
// ---------------------------------------------------------------------------

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic partition for an account id (FNV-1a 64-bit mod count).
///
/// `partitions` of zero is treated as one.
#[must_use]
pub fn partition_for(account_id: &str, partitions: u32) -> PartitionId {
    let mut hash = FNV_OFFSET;
    for byte in account_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % u64::from(partitions.max(1))) as PartitionId
}

// ---------------------------------------------------------------------------
// WatermarkTracker
// ---------------------------------------------------------------------------

/// Monotonic per-partition event-time watermark: the maximum event
/// timestamp observed so far. Out-of-order events below the watermark are
/// tolerated up to the aggregator's grace period.
#[derive(Debug)]
pub struct WatermarkTracker {
    current: Cell<DateTime<Utc>>,
}

impl WatermarkTracker {
    /// Start at the epoch; the first observed event sets the real value.
    #[must_use]
    pub fn new() -> Self {
        Self { current: Cell::new(DateTime::UNIX_EPOCH) }
    }

    /// Advance to `timestamp` if it is newer; never regresses.
    /// Returns the watermark after observation.
    pub fn observe(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        if timestamp > self.current.get() {
            self.current.set(timestamp);
        }
        self.current.get()
    }

    /// Current watermark.
    #[must_use]
    pub fn current(&self) -> DateTime<Utc> {
        self.current.get()
    }

    /// Reset from a recovered checkpoint.
    pub fn restore(&self, watermark: DateTime<Utc>) {
        self.current.set(watermark);
    }
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Ingress
// ---------------------------------------------------------------------------

/// Per-partition ingress stage: decode, validate, observe the watermark.
///
/// Owned by the partition worker; all methods take `&self` on its single
/// execution stream.
#[derive(Debug, Default)]
pub struct Ingress {
    watermark: WatermarkTracker,
}

impl Ingress {
    /// Create an ingress with an epoch watermark.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and validate one raw input-log payload.
    ///
    /// On success the partition watermark has been advanced to cover the
    /// event's timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`IngressError::Serialization`] for undecodable payloads and
    /// [`IngressError::MalformedEvent`] for records with a missing required
    /// field or a non-positive amount. Neither mutates the watermark.
    pub fn accept(&self, payload: &[u8]) -> Result<Transaction, IngressError> {
        let tx = codec::decode_transaction(payload)?;
        validate(&tx)?;
        self.watermark.observe(tx.timestamp);
        Ok(tx)
    }

    /// Current event-time watermark for this partition.
    #[must_use]
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark.current()
    }

    /// Reset the watermark from a recovered checkpoint.
    pub fn restore_watermark(&self, watermark: DateTime<Utc>) {
        self.watermark.restore(watermark);
    }
}

fn validate(tx: &Transaction) -> Result<(), IngressError> {
    let malformed = |reason: &str| IngressError::MalformedEvent {
        transaction_id: tx.transaction_id.clone(),
        reason: reason.to_owned(),
    };
    if tx.transaction_id.is_empty() {
        return Err(malformed("transaction_id must be non-empty"));
    }
    if tx.account_id.is_empty() {
        return Err(malformed("account_id must be non-empty"));
    }
    if tx.country.is_empty() {
        return Err(malformed("country must be non-empty"));
    }
    if tx.currency.is_empty() {
        return Err(malformed("currency must be non-empty"));
    }
    if tx.transaction_type.is_empty() {
        return Err(malformed("transaction_type must be non-empty"));
    }
    if tx.amount <= Decimal::ZERO {
        return Err(malformed("amount must be positive"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_tx() -> Transaction {
        Transaction {
            transaction_id: "TXN-1".to_owned(),
            account_id: "ACC-001".to_owned(),
            amount: dec!(42.00),
            country: "ES".to_owned(),
            currency: "EUR".to_owned(),
            transaction_type: "PURCHASE".to_owned(),
            timestamp: ts(0),
            merchant_name: None,
            description: None,
        }
    }

    fn encode(tx: &Transaction) -> Vec<u8> {
        codec::encode_transaction(tx).unwrap()
    }

    // ------------------------------------------------------------------
    // Partition routing
    // ------------------------------------------------------------------

    #[test]
    fn routing_is_deterministic_and_in_range() {
        for partitions in [1, 2, 4, 16] {
            for i in 0..50 {
                let account = format!("ACC-{i:03}");
                let p = partition_for(&account, partitions);
                assert!(p < partitions, "partition {p} out of range for {partitions}");
                assert_eq!(p, partition_for(&account, partitions), "routing must be stable");
            }
        }
    }

    #[test]
    fn routing_spreads_accounts_across_partitions() {
        let partitions = 4;
        let mut hit = [false; 4];
        for i in 0..100 {
            hit[partition_for(&format!("ACC-{i:03}"), partitions) as usize] = true;
        }
        assert!(hit.iter().all(|h| *h), "100 accounts should reach all 4 partitions: {hit:?}");
    }

    #[test]
    fn zero_partitions_degrades_to_single() {
        assert_eq!(partition_for("ACC-001", 0), 0);
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    #[test]
    fn valid_payload_is_accepted() {
        let ingress = Ingress::new();
        let tx = make_tx();
        let accepted = ingress.accept(&encode(&tx)).unwrap();
        assert_eq!(accepted, tx);
    }

    #[test]
    fn non_positive_amount_is_malformed() {
        let ingress = Ingress::new();
        for amount in [Decimal::ZERO, dec!(-5.00)] {
            let tx = Transaction { amount, ..make_tx() };
            let result = ingress.accept(&encode(&tx));
            assert!(
                matches!(result, Err(IngressError::MalformedEvent { .. })),
                "amount {amount} must be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn each_missing_required_field_is_malformed() {
        let ingress = Ingress::new();
        let cases: Vec<Transaction> = vec![
            Transaction { transaction_id: String::new(), ..make_tx() },
            Transaction { account_id: String::new(), ..make_tx() },
            Transaction { country: String::new(), ..make_tx() },
            Transaction { currency: String::new(), ..make_tx() },
            Transaction { transaction_type: String::new(), ..make_tx() },
        ];
        for tx in cases {
            let result = ingress.accept(&encode(&tx));
            assert!(
                matches!(result, Err(IngressError::MalformedEvent { .. })),
                "expected MalformedEvent, got {result:?}"
            );
        }
    }

    #[test]
    fn undecodable_payload_is_serialization_error() {
        let ingress = Ingress::new();
        let result = ingress.accept(b"not json at all");
        assert!(
            matches!(result, Err(IngressError::Serialization(_))),
            "expected Serialization, got {result:?}"
        );
    }

    #[test]
    fn rejected_records_leave_watermark_untouched() {
        let ingress = Ingress::new();
        ingress.accept(&encode(&make_tx())).unwrap();
        let before = ingress.watermark();
        let newer = Transaction { amount: Decimal::ZERO, timestamp: ts(999), ..make_tx() };
        ingress.accept(&encode(&newer)).unwrap_err();
        assert_eq!(ingress.watermark(), before);
    }

    // ------------------------------------------------------------------
    // Watermark
    // ------------------------------------------------------------------

    #[test]
    fn watermark_advances_monotonically() {
        let tracker = WatermarkTracker::new();
        assert_eq!(tracker.observe(ts(100)), ts(100));
        // Out-of-order event does not regress the watermark.
        assert_eq!(tracker.observe(ts(50)), ts(100));
        assert_eq!(tracker.observe(ts(200)), ts(200));
        assert_eq!(tracker.current(), ts(200));
    }

    #[test]
    fn watermark_restores_from_checkpoint() {
        let ingress = Ingress::new();
        ingress.restore_watermark(ts(500));
        assert_eq!(ingress.watermark(), ts(500));
    }
}
