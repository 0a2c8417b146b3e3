// Rust guideline compliant 2026-07-11

//! Transaction source collaborator -- generates synthetic transactions and
//! appends them, encoded and routed, to the input log.
//!
//! Entry points: [`TransactionSource::normal_transaction`],
//! [`TransactionSource::fraud_burst`], [`TransactionSource::run`].
//! Configuration via [`SourceConfig::builder`].
//!
//! This crate sits outside the detection core: it only has to be a valid
//! producer of the input format. Lookup pools (accounts, countries,
//! merchants, transaction types) are immutable configuration data, not
//! process-wide state.

use domain::{EventLog, LogError, Offset, PartitionId, Transaction, codec, now_millis};
use ingress::partition_for;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng, seq::SliceRandom as _};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::time::Duration;

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Errors that can occur during transaction generation and appending.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The supplied configuration is invalid.
    #[error("invalid source configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// An input-log append failed.
    #[error("input log error: {0}")]
    Log(#[from] LogError),
    /// A generated transaction could not be encoded.
    #[error("encode error: {0}")]
    Codec(#[from] codec::CodecError),
}

// ---------------------------------------------------------------------------
// SourceConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`TransactionSource`].
///
/// Construct via [`SourceConfig::builder`]; the default pools match the
/// demo data set (10 accounts, 15 countries, 14 merchants, 5 types).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Account id pool; transactions pick uniformly.
    pub accounts: Vec<String>,
    /// Country code pool.
    pub countries: Vec<String>,
    /// Merchant name pool.
    pub merchants: Vec<String>,
    /// Transaction type pool.
    pub transaction_types: Vec<String>,
    /// Currency stamped on every transaction.
    pub currency: String,
    /// Number of input-log partitions to route across.
    pub partitions: u32,
    /// Delay between normal transactions.
    pub transaction_interval: Duration,
    /// Delay between demo fraud bursts.
    pub fraud_interval: Duration,
    /// Transactions per fraud burst.
    pub burst_size: usize,
    /// Optional upper bound on generated normal transactions. `None` means infinite.
    pub iterations: Option<u64>,
    /// Optional RNG seed for reproducible output. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Builder for [`SourceConfig`].
///
/// Obtain via [`SourceConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct SourceConfigBuilder {
    accounts: Vec<String>,
    countries: Vec<String>,
    merchants: Vec<String>,
    transaction_types: Vec<String>,
    currency: String,
    partitions: u32,
    transaction_interval: Duration,
    fraud_interval: Duration,
    burst_size: usize,
    iterations: Option<u64>,
    seed: Option<u64>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

impl SourceConfig {
    /// Create a builder. `partitions` is the only required parameter.
    ///
    /// Defaults: demo pools, EUR, 2 s between transactions, 15 s between
    /// bursts, 4 transactions per burst, infinite, OS-seeded.
    #[must_use]
    pub fn builder(partitions: u32) -> SourceConfigBuilder {
        SourceConfigBuilder {
            accounts: (1..=10).map(|i| format!("ACC-{i:03}")).collect(),
            countries: owned(&[
                "ES", "FR", "DE", "IT", "UK", "US", "CA", "JP", "AU", "BR", "MX", "AR", "CN",
                "IN", "RU",
            ]),
            merchants: owned(&[
                "Amazon", "Apple Store", "Google Play", "Netflix", "Spotify", "Uber", "Airbnb",
                "McDonald's", "Starbucks", "Shell", "Repsol", "El Corte Ingl\u{e9}s", "Zara",
                "H&M",
            ]),
            transaction_types: owned(&["PURCHASE", "WITHDRAWAL", "TRANSFER", "PAYMENT", "DEPOSIT"]),
            currency: "EUR".to_owned(),
            partitions,
            transaction_interval: Duration::from_secs(2),
            fraud_interval: Duration::from_secs(15),
            burst_size: 4,
            iterations: None,
            seed: None,
        }
    }
}

impl SourceConfigBuilder {
    /// Override the account pool.
    #[must_use]
    pub fn accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Override the country pool.
    #[must_use]
    pub fn countries(mut self, countries: Vec<String>) -> Self {
        self.countries = countries;
        self
    }

    /// Override the delay between normal transactions.
    #[must_use]
    pub fn transaction_interval(mut self, transaction_interval: Duration) -> Self {
        self.transaction_interval = transaction_interval;
        self
    }

    /// Override the delay between demo fraud bursts.
    #[must_use]
    pub fn fraud_interval(mut self, fraud_interval: Duration) -> Self {
        self.fraud_interval = fraud_interval;
        self
    }

    /// Override the burst size.
    #[must_use]
    pub fn burst_size(mut self, burst_size: usize) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// Set a finite count of normal transactions. Without this the source
    /// runs until the log signals `Closed`.
    #[must_use]
    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = Some(n);
        self
    }

    /// Fix the RNG seed for deterministic output (useful in tests).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfig`] when `partitions` is zero,
    /// any pool is empty, or the burst size is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<SourceConfig, SourceError> {
        if self.partitions == 0 {
            return Err(SourceError::InvalidConfig {
                reason: "partitions must be >= 1".to_owned(),
            });
        }
        if self.accounts.is_empty()
            || self.countries.is_empty()
            || self.merchants.is_empty()
            || self.transaction_types.is_empty()
        {
            return Err(SourceError::InvalidConfig {
                reason: "pools must be non-empty".to_owned(),
            });
        }
        if self.burst_size == 0 {
            return Err(SourceError::InvalidConfig {
                reason: "burst_size must be >= 1".to_owned(),
            });
        }
        Ok(SourceConfig {
            accounts: self.accounts,
            countries: self.countries,
            merchants: self.merchants,
            transaction_types: self.transaction_types,
            currency: self.currency,
            partitions: self.partitions,
            transaction_interval: self.transaction_interval,
            fraud_interval: self.fraud_interval,
            burst_size: self.burst_size,
            iterations: self.iterations,
            seed: self.seed,
        })
    }
}

// ---------------------------------------------------------------------------
// TransactionSource
// ---------------------------------------------------------------------------

/// Generates synthetic transactions and forwards them to an [`EventLog`]
/// port, routed by account id.
///
/// Generic over `L: EventLog` for zero-cost static dispatch. Holds no
/// concrete log reference -- the dependency is injected per call.
#[derive(Debug)]
pub struct TransactionSource {
    config: SourceConfig,
    /// Interior mutability required because all public methods take `&self`.
    rng: RefCell<StdRng>,
}

impl TransactionSource {
    /// Create a new source from `config`.
    ///
    /// Seeds the RNG from `config.seed` if set, otherwise from the OS.
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng: RefCell::new(rng) }
    }

    fn next_transaction_id(&self) -> String {
        // UUID from raw random bytes, shortened to the demo's 8-char form.
        let mut bytes = [0u8; 16];
        self.rng.borrow_mut().fill_bytes(&mut bytes);
        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
        format!("TXN-{}", id.simple().to_string()[..8].to_uppercase())
    }

    /// Random amount in `[min_cents, max_cents]`, exact to the cent.
    fn amount_cents(&self, min_cents: i64, max_cents: i64) -> Decimal {
        let cents = self.rng.borrow_mut().random_range(min_cents..=max_cents);
        Decimal::new(cents, 2)
    }

    fn pick<'a>(&self, pool: &'a [String]) -> &'a str {
        let idx = self.rng.borrow_mut().random_range(0..pool.len());
        &pool[idx]
    }

    /// Generate one everyday transaction: 10.00-500.00, random pools.
    #[must_use]
    pub fn normal_transaction(&self) -> Transaction {
        Transaction {
            transaction_id: self.next_transaction_id(),
            account_id: self.pick(&self.config.accounts).to_owned(),
            amount: self.amount_cents(1_000, 50_000),
            country: self.pick(&self.config.countries).to_owned(),
            currency: self.config.currency.clone(),
            transaction_type: self.pick(&self.config.transaction_types).to_owned(),
            timestamp: now_millis(),
            merchant_name: Some(self.pick(&self.config.merchants).to_owned()),
            description: Some("Normal transaction".to_owned()),
        }
    }

    /// Generate a burst of high-value transactions for one account from
    /// DISTINCT countries, sized to trip the multi-country rule.
    #[must_use]
    pub fn fraud_burst(&self, account_id: &str) -> Vec<Transaction> {
        let mut countries = self.config.countries.clone();
        countries.shuffle(&mut *self.rng.borrow_mut());
        let n = self.config.burst_size.min(countries.len());
        countries
            .into_iter()
            .take(n)
            .map(|country| Transaction {
                transaction_id: self.next_transaction_id(),
                account_id: account_id.to_owned(),
                amount: self.amount_cents(30_000, 80_000),
                country,
                currency: self.config.currency.clone(),
                transaction_type: "PURCHASE".to_owned(),
                timestamp: now_millis(),
                merchant_name: Some(self.pick(&self.config.merchants).to_owned()),
                description: Some("Suspicious high-value transaction".to_owned()),
            })
            .collect()
    }

    /// Encode `tx` and append it to its owning partition.
    ///
    /// # Errors
    ///
    /// Propagates encode failures as [`SourceError::Codec`] and log
    /// failures as [`SourceError::Log`].
    pub async fn send<L: EventLog>(
        &self,
        log: &L,
        tx: &Transaction,
    ) -> Result<(PartitionId, Offset), SourceError> {
        let partition = partition_for(&tx.account_id, self.config.partitions);
        let payload = codec::encode_transaction(tx)?;
        let offset = log.append(partition, payload).await?;
        tracing::debug!(
            "source.sent: tx={} account={} partition={partition} offset={offset}",
            tx.transaction_id,
            tx.account_id
        );
        Ok((partition, offset))
    }

    /// Run the generation loop until stopped.
    ///
    /// Emits one normal transaction per iteration, plus a fraud burst for
    /// a random account whenever the fraud interval has elapsed (every
    /// `fraud_interval / transaction_interval` iterations). Stops cleanly
    /// when the log signals [`LogError::Closed`] or after
    /// `config.iterations` normal transactions.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] for any failure other than log `Closed`.
    pub async fn run<L: EventLog>(&self, log: &L) -> Result<(), SourceError> {
        let burst_every = (self.config.fraud_interval.as_millis()
            / self.config.transaction_interval.as_millis().max(1))
        .max(1) as u64;
        let mut count = 0u64;
        loop {
            let mut batch = vec![self.normal_transaction()];
            count += 1;
            if count % burst_every == 0 {
                let account = self.pick(&self.config.accounts).to_owned();
                tracing::info!("source.burst: account={account}");
                batch.extend(self.fraud_burst(&account));
            }
            for tx in &batch {
                match self.send(log, tx).await {
                    Ok(_) => {}
                    Err(SourceError::Log(LogError::Closed)) => {
                        tracing::info!("source.run.stopped: log closed after {count} iteration(s)");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Some(max) = self.config.iterations
                && count >= max
            {
                tracing::info!("source.run.stopped: iteration limit reached");
                return Ok(());
            }

            tokio::time::sleep(self.config.transaction_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    /// In-memory log that tracks appended payloads per partition.
    struct TestLog {
        appended: RefCell<Vec<(PartitionId, Vec<u8>)>>,
        closed: bool,
    }

    impl TestLog {
        fn new() -> Self {
            Self { appended: RefCell::new(vec![]), closed: false }
        }

        fn closed() -> Self {
            Self { appended: RefCell::new(vec![]), closed: true }
        }
    }

    impl EventLog for TestLog {
        async fn append(&self, partition: PartitionId, payload: Vec<u8>) -> Result<Offset, LogError> {
            if self.closed {
                return Err(LogError::Closed);
            }
            let mut appended = self.appended.borrow_mut();
            appended.push((partition, payload));
            Ok(appended.len() as Offset - 1)
        }
    }

    fn make_source(seed: u64) -> TransactionSource {
        TransactionSource::new(SourceConfig::builder(4).seed(seed).build().unwrap())
    }

    // ------------------------------------------------------------------
    // Config validation
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_zero_partitions() {
        let result = SourceConfig::builder(0).build();
        assert!(matches!(result, Err(SourceError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_empty_pool() {
        let result = SourceConfig::builder(1).accounts(vec![]).build();
        assert!(matches!(result, Err(SourceError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_zero_burst() {
        let result = SourceConfig::builder(1).burst_size(0).build();
        assert!(matches!(result, Err(SourceError::InvalidConfig { .. })));
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    #[test]
    fn normal_transaction_fields_are_valid() {
        let source = make_source(1);
        for _ in 0..50 {
            let tx = source.normal_transaction();
            assert!(tx.transaction_id.starts_with("TXN-"));
            assert_eq!(tx.transaction_id.len(), 12, "TXN- plus 8 hex chars");
            assert!(tx.account_id.starts_with("ACC-"));
            assert!(tx.amount >= dec!(10.00) && tx.amount <= dec!(500.00), "amount {}", tx.amount);
            assert_eq!(tx.currency, "EUR");
            assert!(tx.merchant_name.is_some());
        }
    }

    #[test]
    fn seeded_source_is_deterministic() {
        let a = make_source(99).normal_transaction();
        let b = make_source(99).normal_transaction();
        assert_eq!(a.transaction_id, b.transaction_id);
        assert_eq!(a.amount, b.amount);
        assert_eq!(a.country, b.country);
    }

    #[test]
    fn fraud_burst_targets_one_account_with_distinct_countries() {
        let source = make_source(7);
        let burst = source.fraud_burst("ACC-003");
        assert_eq!(burst.len(), 4);
        let countries: BTreeSet<&str> = burst.iter().map(|t| t.country.as_str()).collect();
        assert_eq!(countries.len(), 4, "burst countries must be distinct");
        for tx in &burst {
            assert_eq!(tx.account_id, "ACC-003");
            assert!(
                tx.amount >= dec!(300.00) && tx.amount <= dec!(800.00),
                "amount {}",
                tx.amount
            );
            assert_eq!(tx.transaction_type, "PURCHASE");
        }
    }

    // ------------------------------------------------------------------
    // Routing + run loop
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn send_routes_by_account_hash() {
        let source = make_source(3);
        let log = TestLog::new();
        let tx = source.normal_transaction();
        let (partition, offset) = source.send(&log, &tx).await.unwrap();
        assert_eq!(partition, partition_for(&tx.account_id, 4));
        assert_eq!(offset, 0);
        let appended = log.appended.borrow();
        assert_eq!(appended.len(), 1);
        // Payload is a decodable transaction envelope.
        let decoded = codec::decode_transaction(&appended[0].1).unwrap();
        assert_eq!(decoded, tx);
    }

    #[tokio::test]
    async fn run_emits_iterations_plus_periodic_bursts() {
        let config = SourceConfig::builder(2)
            .seed(5)
            .iterations(6)
            .transaction_interval(Duration::from_millis(1))
            .fraud_interval(Duration::from_millis(3))
            .burst_size(4)
            .build()
            .unwrap();
        let source = TransactionSource::new(config);
        let log = TestLog::new();
        source.run(&log).await.unwrap();
        // 6 normal + 2 bursts (every 3rd iteration) of 4 each.
        assert_eq!(log.appended.borrow().len(), 6 + 2 * 4);
    }

    #[tokio::test]
    async fn run_stops_cleanly_on_closed_log() {
        let config = SourceConfig::builder(1)
            .seed(5)
            .transaction_interval(Duration::ZERO)
            .build()
            .unwrap();
        let source = TransactionSource::new(config);
        let result = source.run(&TestLog::closed()).await;
        assert!(result.is_ok(), "Closed must terminate cleanly: {result:?}");
    }
}
