// Rust guideline compliant 2026-07-10

//! Fraud Rule Evaluator -- pure mapping from an aggregated window to a
//! fraud decision.
//!
//! Entry points: [`FraudRuleEvaluator::evaluate`],
//! [`FraudRuleEvaluator::risk_score`]. Configuration via
//! [`RuleConfig::builder`].
//!
//! The evaluator is side-effect free and never consults processing state:
//! whether a window has already alerted is the caller's concern.

use domain::{AccountWindow, FraudDecision};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive as _};
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// RuleError
// ---------------------------------------------------------------------------

/// Errors from rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The supplied configuration is invalid.
    #[error("invalid rule configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// RuleConfig + builder
// ---------------------------------------------------------------------------

/// Thresholds for the multi-country high-value rule.
///
/// Construct via [`RuleConfig::builder`].
#[derive(Debug, Clone)]
pub struct RuleConfig {
    /// Total-amount threshold (inclusive).
    amount_threshold: Decimal,
    /// Distinct-country threshold (inclusive).
    country_threshold: usize,
    /// Window span in minutes, quoted in alert descriptions.
    window_minutes: u32,
}

/// Builder for [`RuleConfig`].
///
/// Obtain via [`RuleConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct RuleConfigBuilder {
    amount_threshold: Decimal,
    country_threshold: usize,
    window_minutes: u32,
}

impl RuleConfig {
    /// Create a builder with the pipeline defaults: 1000.00 total across
    /// at least 3 countries within a 5-minute window.
    #[must_use]
    pub fn builder() -> RuleConfigBuilder {
        RuleConfigBuilder {
            amount_threshold: dec!(1000.00),
            country_threshold: 3,
            window_minutes: 5,
        }
    }
}

impl RuleConfigBuilder {
    /// Override the total-amount threshold.
    #[must_use]
    pub fn amount_threshold(mut self, amount_threshold: Decimal) -> Self {
        self.amount_threshold = amount_threshold;
        self
    }

    /// Override the distinct-country threshold.
    #[must_use]
    pub fn country_threshold(mut self, country_threshold: usize) -> Self {
        self.country_threshold = country_threshold;
        self
    }

    /// Override the window span quoted in descriptions.
    #[must_use]
    pub fn window_minutes(mut self, window_minutes: u32) -> Self {
        self.window_minutes = window_minutes;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidConfig`] when the amount threshold is
    /// not positive or the country threshold is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<RuleConfig, RuleError> {
        if self.amount_threshold <= Decimal::ZERO {
            return Err(RuleError::InvalidConfig {
                reason: "amount_threshold must be positive".to_owned(),
            });
        }
        if self.country_threshold == 0 {
            return Err(RuleError::InvalidConfig {
                reason: "country_threshold must be >= 1".to_owned(),
            });
        }
        Ok(RuleConfig {
            amount_threshold: self.amount_threshold,
            country_threshold: self.country_threshold,
            window_minutes: self.window_minutes,
        })
    }
}

// ---------------------------------------------------------------------------
// FraudRuleEvaluator
// ---------------------------------------------------------------------------

/// Evaluates the multi-country high-value rule against aggregated windows.
#[derive(Debug)]
pub struct FraudRuleEvaluator {
    config: RuleConfig,
}

impl FraudRuleEvaluator {
    /// Create an evaluator from `config`.
    #[must_use]
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    /// True when the window crosses BOTH thresholds: total amount at or
    /// above the amount threshold AND distinct countries at or above the
    /// country threshold. Either alone never triggers.
    #[must_use]
    pub fn is_fraudulent(&self, window: &AccountWindow) -> bool {
        window.total_amount >= self.config.amount_threshold
            && window.country_count() >= self.config.country_threshold
    }

    /// Evaluate `window`, producing a decision only when the rule fires.
    #[must_use]
    pub fn evaluate(&self, window: &AccountWindow) -> Option<FraudDecision> {
        if !self.is_fraudulent(window) {
            return None;
        }
        let risk_score = self.risk_score(window);
        tracing::debug!(
            "evaluator.fraudulent: account={} total={} countries={} score={risk_score}",
            window.account_id,
            window.total_amount,
            window.country_count()
        );
        Some(FraudDecision {
            account_id: window.account_id.clone(),
            total_amount: window.total_amount,
            countries: window.countries.clone(),
            transaction_count: window.transaction_count,
            window_start: window.window_start,
            window_end: window.window_end,
            risk_score,
            description: self.describe(window),
        })
    }

    /// Risk score in `[0, 100]`, monotonically non-decreasing in total
    /// amount, country count, and transaction count:
    ///
    /// ```text
    /// score = clamp(50
    ///             + min(30, trunc(round_half_up(total / threshold, 2)) * 10)
    ///             + min(20, (countries - 2) * 5)
    ///             + min(10, transactions * 2),
    ///           0, 100)
    /// ```
    ///
    /// Rounding rule: the amount ratio is rounded HALF-UP to two decimal
    /// places, then truncated to its integer part. 1995.00 / 1000.00 gives
    /// ratio 2.00 (not 1), 1994.99 / 1000.00 gives 1.
    #[must_use]
    pub fn risk_score(&self, window: &AccountWindow) -> u8 {
        let base: i64 = 50;

        let ratio = (window.total_amount / self.config.amount_threshold)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        // Saturate absurdly large totals instead of failing the conversion.
        let multiplier = ratio.trunc().to_i64().unwrap_or(i64::MAX / 10);
        let amount_score = 30.min(multiplier.saturating_mul(10));

        let country_score = 20.min((window.country_count() as i64 - 2) * 5);

        let transaction_score = 10.min(i64::from(window.transaction_count) * 2);

        let total = base + amount_score + country_score + transaction_score;
        total.clamp(0, 100) as u8
    }

    /// Templated alert description, reproducible for testing.
    fn describe(&self, window: &AccountWindow) -> String {
        format!(
            "Suspicious activity detected: \u{20ac}{:.2} across {} countries in {} transactions within {}-minute window",
            window.total_amount,
            window.country_count(),
            window.transaction_count,
            self.config.window_minutes
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_window(total: Decimal, countries: &[&str], count: u32) -> AccountWindow {
        AccountWindow {
            account_id: "ACC-001".to_owned(),
            window_start: ts(0),
            window_end: ts(300),
            total_amount: total,
            transaction_count: count,
            countries: countries.iter().map(|c| (*c).to_owned()).collect::<BTreeSet<_>>(),
            earliest_event: ts(0),
            seen_transactions: BTreeSet::new(),
            alerted: false,
            last_updated: ts(300),
        }
    }

    fn make_evaluator() -> FraudRuleEvaluator {
        FraudRuleEvaluator::new(RuleConfig::builder().build().unwrap())
    }

    // ------------------------------------------------------------------
    // Config validation
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_non_positive_amount() {
        let result = RuleConfig::builder().amount_threshold(Decimal::ZERO).build();
        assert!(matches!(result, Err(RuleError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_zero_countries() {
        let result = RuleConfig::builder().country_threshold(0).build();
        assert!(matches!(result, Err(RuleError::InvalidConfig { .. })));
    }

    // ------------------------------------------------------------------
    // Predicate boundaries
    // ------------------------------------------------------------------

    #[test]
    fn amount_just_below_threshold_is_clean() {
        let w = make_window(dec!(999.99), &["ES", "FR", "DE"], 3);
        assert!(make_evaluator().evaluate(&w).is_none());
    }

    #[test]
    fn both_thresholds_at_boundary_trigger() {
        let w = make_window(dec!(1000.00), &["ES", "FR", "DE"], 3);
        assert!(make_evaluator().evaluate(&w).is_some());
    }

    #[test]
    fn two_countries_never_trigger_despite_amount() {
        let w = make_window(dec!(1000.00), &["ES", "FR"], 4);
        assert!(make_evaluator().evaluate(&w).is_none());
    }

    #[test]
    fn high_amount_few_countries_is_clean() {
        // 1500.00 across 2 countries: amount threshold met, country not.
        let w = make_window(dec!(1500.00), &["ES", "FR"], 6);
        assert!(make_evaluator().evaluate(&w).is_none());
    }

    // ------------------------------------------------------------------
    // Risk score formula
    // ------------------------------------------------------------------

    #[test]
    fn score_for_burst_scenario_is_85() {
        // 1250.00 / 1000.00 -> ratio 1.25 -> trunc 1 -> amount 10;
        // 5 countries -> 15; 5 transactions -> 10; 50 + 10 + 15 + 10 = 85.
        let w = make_window(dec!(1250.00), &["ES", "FR", "DE", "IT", "UK"], 5);
        assert_eq!(make_evaluator().risk_score(&w), 85);
    }

    #[test]
    fn score_at_exact_thresholds_is_71() {
        // ratio 1.00 -> 10; 3 countries -> 5; 3 transactions -> 6.
        let w = make_window(dec!(1000.00), &["ES", "FR", "DE"], 3);
        assert_eq!(make_evaluator().risk_score(&w), 71);
    }

    #[test]
    fn amount_ratio_rounds_half_up_before_truncation() {
        // 1995.00 / 1000.00 = 1.995 -> rounds to 2.00 -> trunc 2 -> 20.
        let up = make_window(dec!(1995.00), &["ES", "FR", "DE"], 3);
        // 1994.99 / 1000.00 = 1.99499 -> rounds to 1.99 -> trunc 1 -> 10.
        let down = make_window(dec!(1994.99), &["ES", "FR", "DE"], 3);
        let evaluator = make_evaluator();
        assert_eq!(evaluator.risk_score(&up) - evaluator.risk_score(&down), 10);
    }

    #[test]
    fn score_components_cap_and_clamp_to_100() {
        // amount capped at 30, countries at 20, transactions at 10: 110 -> 100.
        let w = make_window(
            dec!(99999.00),
            &["ES", "FR", "DE", "IT", "UK", "US", "CA", "JP"],
            50,
        );
        assert_eq!(make_evaluator().risk_score(&w), 100);
    }

    #[test]
    fn score_monotonic_in_amount() {
        let evaluator = make_evaluator();
        let mut last = 0;
        for hundreds in 10..40 {
            let w = make_window(Decimal::from(hundreds * 100), &["ES", "FR", "DE"], 3);
            let score = evaluator.risk_score(&w);
            assert!(score >= last, "score dropped at {hundreds}00.00: {score} < {last}");
            last = score;
        }
    }

    #[test]
    fn score_monotonic_in_countries() {
        let evaluator = make_evaluator();
        let pool = ["ES", "FR", "DE", "IT", "UK", "US", "CA", "JP", "AU", "BR"];
        let mut last = 0;
        for n in 3..=pool.len() {
            let w = make_window(dec!(1250.00), &pool[..n], 10);
            let score = evaluator.risk_score(&w);
            assert!(score >= last, "score dropped at {n} countries: {score} < {last}");
            last = score;
        }
    }

    #[test]
    fn score_monotonic_in_transaction_count() {
        let evaluator = make_evaluator();
        let mut last = 0;
        for count in 3..20 {
            let w = make_window(dec!(1250.00), &["ES", "FR", "DE"], count);
            let score = evaluator.risk_score(&w);
            assert!(score >= last, "score dropped at count {count}: {score} < {last}");
            last = score;
        }
    }

    // ------------------------------------------------------------------
    // Decision contents
    // ------------------------------------------------------------------

    #[test]
    fn decision_carries_window_facts_and_description() {
        let w = make_window(dec!(1250.00), &["ES", "FR", "DE", "IT", "UK"], 5);
        let decision = make_evaluator().evaluate(&w).unwrap();
        assert_eq!(decision.account_id, "ACC-001");
        assert_eq!(decision.total_amount, dec!(1250.00));
        assert_eq!(decision.transaction_count, 5);
        assert_eq!(decision.window_start, w.window_start);
        assert_eq!(decision.window_end, w.window_end);
        assert_eq!(decision.risk_score, 85);
        assert_eq!(
            decision.description,
            "Suspicious activity detected: \u{20ac}1250.00 across 5 countries in 5 transactions within 5-minute window"
        );
    }

    #[test]
    fn evaluate_ignores_alerted_flag() {
        // Pure function: suppression of repeat alerts is the caller's job.
        let mut w = make_window(dec!(1250.00), &["ES", "FR", "DE"], 5);
        w.alerted = true;
        assert!(make_evaluator().evaluate(&w).is_some());
    }
}
