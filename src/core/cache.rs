//! In-memory snapshot of currencies and `Latest` rates served to readers.
//!
//! The snapshot is immutable once built. `reload` builds a complete replacement
//! off to the side and swaps the shared reference, so a reader holding a
//! snapshot always sees a single generation.

use crate::core::currency::{Currency, ExchangeRate, RateStatus};
use crate::core::store::RateStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct RateSnapshot {
    currencies: HashMap<String, Currency>,
    conversion_rates: HashMap<String, HashMap<String, Decimal>>,
    rate_timestamps: HashMap<String, HashMap<String, DateTime<Utc>>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    /// Builds a snapshot from reference data and `Latest` rows.
    ///
    /// Rows with any other status are ignored. Every base that has at least one
    /// rate also gets a self-rate of exactly one, stamped with the newest
    /// timestamp seen for that base.
    pub fn build(currencies: Vec<Currency>, latest_rates: Vec<ExchangeRate>) -> Self {
        let currencies: HashMap<String, Currency> = currencies
            .into_iter()
            .map(|c| (c.code.clone(), c))
            .collect();

        let mut conversion_rates: HashMap<String, HashMap<String, Decimal>> = HashMap::new();
        let mut rate_timestamps: HashMap<String, HashMap<String, DateTime<Utc>>> = HashMap::new();
        for rate in latest_rates.into_iter().filter(ExchangeRate::is_latest) {
            conversion_rates
                .entry(rate.base_currency.clone())
                .or_default()
                .insert(rate.target_currency.clone(), rate.rate);
            rate_timestamps
                .entry(rate.base_currency)
                .or_default()
                .insert(rate.target_currency, rate.rate_timestamp);
        }

        for (base, rates) in conversion_rates.iter_mut() {
            rates.insert(base.clone(), Decimal::ONE);
        }
        for (base, stamps) in rate_timestamps.iter_mut() {
            if let Some(newest) = stamps.values().max().copied() {
                stamps.insert(base.clone(), newest);
            }
        }

        RateSnapshot {
            currencies,
            conversion_rates,
            rate_timestamps,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn rate(&self, from: &str, to: &str) -> Option<Decimal> {
        self.conversion_rates.get(from)?.get(to).copied()
    }

    pub fn rate_timestamp(&self, from: &str, to: &str) -> Option<DateTime<Utc>> {
        self.rate_timestamps.get(from)?.get(to).copied()
    }

    pub fn rates_for(&self, base: &str) -> Option<&HashMap<String, Decimal>> {
        self.conversion_rates.get(base)
    }

    pub fn currency(&self, code: &str) -> Option<&Currency> {
        self.currencies.get(code)
    }

    pub fn currencies(&self) -> &HashMap<String, Currency> {
        &self.currencies
    }

    pub fn base_count(&self) -> usize {
        self.conversion_rates.len()
    }

    /// `None` until the first reload.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

pub struct RateCache {
    store: Arc<dyn RateStore>,
    current: RwLock<Arc<RateSnapshot>>,
}

impl RateCache {
    /// Creates an empty cache. Nothing is served until `reload` succeeds.
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(RateSnapshot::default())),
        }
    }

    /// Rebuilds the snapshot from the store and installs it in one swap.
    ///
    /// On error the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<()> {
        info!("Reloading currencies and conversion rates into cache");

        let currencies = self
            .store
            .find_all_currencies()
            .await
            .context("Failed to load currencies for cache reload")?;
        let latest = self
            .store
            .find_all_rates_by_status(RateStatus::Latest)
            .await
            .context("Failed to load latest rates for cache reload")?;
        debug!(
            currencies = currencies.len(),
            rates = latest.len(),
            "Building replacement snapshot"
        );

        let snapshot = Arc::new(RateSnapshot::build(currencies, latest));
        let (currency_count, base_count) = (snapshot.currencies.len(), snapshot.base_count());
        *self.current.write() = snapshot;

        info!(
            currencies = currency_count,
            bases = base_count,
            "Cache reloaded"
        );
        Ok(())
    }

    /// The current snapshot. Hold on to it to read several values from one generation.
    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.current.read().clone()
    }

    pub fn get_rate(&self, from: &str, to: &str) -> Option<Decimal> {
        self.snapshot().rate(from, to)
    }

    /// Copy of the rates quoted from `base`; empty if the base is unknown.
    pub fn get_rates_for_currency(&self, base: &str) -> HashMap<String, Decimal> {
        self.snapshot().rates_for(base).cloned().unwrap_or_default()
    }

    pub fn get_all_currencies(&self) -> HashMap<String, Currency> {
        self.snapshot().currencies.clone()
    }

    pub fn get_currency(&self, code: &str) -> Option<Currency> {
        self.snapshot().currency(code).cloned()
    }
}
