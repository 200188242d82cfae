//! External rate source abstraction

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Rates quoted against one base currency, keyed by target code.
pub type RateSet = HashMap<String, Decimal>;

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches current rates for `base` against every code in `currencies`.
    ///
    /// `Ok(None)` means the provider answered without a rate set; the caller
    /// treats that base as "no rates obtained" and moves on. Transport and
    /// decoding failures are returned as errors.
    async fn fetch_latest(&self, base: &str, currencies: &[String]) -> Result<Option<RateSet>>;
}
