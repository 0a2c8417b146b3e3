// Rust guideline compliant 2026-07-08

//! Stable JSON wire codec for the pipeline's closed set of record variants.
//!
//! Every payload crossing a log boundary is an [`Envelope`] with an explicit
//! `type` tag: `transaction` (input log), `window` (state snapshots), or
//! `alert` (output log). The tag set is closed by design -- there is no
//! open-ended polymorphic encoding. Timestamps travel as ISO-8601 UTC with
//! millisecond precision via the [`ts_millis`] serde module.

use serde::{Deserialize, Serialize};

use crate::{AccountWindow, FraudAlert, Transaction};

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding wire payloads.
///
/// Decode failures are per-record: the worker logs the raw payload and
/// skips the record rather than aborting the partition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A value could not be serialized.
    #[error("encode failed: {reason}")]
    Encode {
        /// Human-readable description.
        reason: String,
    },
    /// A payload could not be deserialized.
    #[error("decode failed: {reason}")]
    Decode {
        /// Human-readable description.
        reason: String,
    },
    /// The payload decoded cleanly but carried the wrong variant tag.
    #[error("unexpected payload variant: expected {expected}, found {found}")]
    UnexpectedVariant {
        expected: &'static str,
        found: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Tagged union of every record kind the pipeline puts on a wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Transaction(Transaction),
    Window(AccountWindow),
    Alert(FraudAlert),
}

impl Envelope {
    fn variant_name(&self) -> &'static str {
        match self {
            Self::Transaction(_) => "transaction",
            Self::Window(_) => "window",
            Self::Alert(_) => "alert",
        }
    }
}

fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(|e| CodecError::Encode { reason: e.to_string() })
}

fn decode(payload: &[u8]) -> Result<Envelope, CodecError> {
    serde_json::from_slice(payload).map_err(|e| CodecError::Decode { reason: e.to_string() })
}

/// Encode a transaction for the input log.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when serialization fails.
pub fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>, CodecError> {
    encode(&Envelope::Transaction(tx.clone()))
}

/// Decode an input-log payload as a transaction.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed payloads and
/// [`CodecError::UnexpectedVariant`] when the payload carries a different tag.
pub fn decode_transaction(payload: &[u8]) -> Result<Transaction, CodecError> {
    match decode(payload)? {
        Envelope::Transaction(tx) => Ok(tx),
        other => Err(CodecError::UnexpectedVariant {
            expected: "transaction",
            found: other.variant_name(),
        }),
    }
}

/// Encode a window snapshot record.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when serialization fails.
pub fn encode_window(window: &AccountWindow) -> Result<Vec<u8>, CodecError> {
    encode(&Envelope::Window(window.clone()))
}

/// Decode a window snapshot record.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed payloads and
/// [`CodecError::UnexpectedVariant`] for a wrong tag.
pub fn decode_window(payload: &[u8]) -> Result<AccountWindow, CodecError> {
    match decode(payload)? {
        Envelope::Window(w) => Ok(w),
        other => Err(CodecError::UnexpectedVariant {
            expected: "window",
            found: other.variant_name(),
        }),
    }
}

/// Encode an alert for the output log.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when serialization fails.
pub fn encode_alert(alert: &FraudAlert) -> Result<Vec<u8>, CodecError> {
    encode(&Envelope::Alert(alert.clone()))
}

/// Decode an output-log payload as an alert.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed payloads and
/// [`CodecError::UnexpectedVariant`] for a wrong tag.
pub fn decode_alert(payload: &[u8]) -> Result<FraudAlert, CodecError> {
    match decode(payload)? {
        Envelope::Alert(a) => Ok(a),
        other => Err(CodecError::UnexpectedVariant {
            expected: "alert",
            found: other.variant_name(),
        }),
    }
}

// ---------------------------------------------------------------------------
// ts_millis
// ---------------------------------------------------------------------------

/// Serde helper: ISO-8601 UTC timestamps with exactly three fractional
/// digits (`2026-07-12T09:30:00.123Z`), matching the pipeline's wire schema.
/// Accepts any RFC 3339 offset on input and normalizes to UTC.
pub mod ts_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize as _, Deserializer, Serializer};

    /// Format `dt` with millisecond precision and a literal `Z` suffix.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the signature is dictated by serde.
    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Parse an RFC 3339 timestamp and normalize to UTC.
    ///
    /// # Errors
    ///
    /// Fails when the string is not a valid RFC 3339 timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
