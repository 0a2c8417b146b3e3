// Rust guideline compliant 2026-07-12

//! Demo adapter for the `AlertSink` port.
//!
//! Logs each published alert via `tracing::warn!` and always acknowledges.
//! `PublishError::Unavailable` is unreachable in this demo adapter.

use domain::{AlertSink, FraudAlert, PublishError, codec};

/// `AlertSink` adapter that emits a warning log per fraud alert.
///
/// Always returns `Ok(())`; use a real transport implementation for
/// production alerting.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a new tracing sink adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AlertSink for TracingSink {
    async fn publish(&self, alert: &FraudAlert) -> Result<(), PublishError> {
        // Render the wire payload so the log line matches what a real sink
        // would receive.
        let payload = codec::encode_alert(alert)
            .map(|p| String::from_utf8_lossy(&p).into_owned())
            .map_err(|e| PublishError::Unavailable { reason: e.to_string() })?;
        tracing::warn!(
            "alert_sink.published: alert={} account={} score={} payload={payload}",
            alert.alert_id,
            alert.account_id,
            alert.risk_score
        );
        Ok(())
    }
}
