//! Amount conversion over the cached rate snapshot

use crate::core::cache::{RateCache, RateSnapshot};
use crate::core::currency::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// A required request field is missing or blank.
    #[error("Invalid conversion request: missing {0}")]
    Validation(&'static str),

    #[error("Currency not found: {0}")]
    CurrencyNotFound(String),

    #[error("No rate available from {from} to {to}")]
    RateNotFound { from: String, to: String },
}

impl ConversionError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConversionError::CurrencyNotFound(_) | ConversionError::RateNotFound { .. }
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub from_currency: Option<String>,
    pub amount: Option<Decimal>,
    pub to_currency: Option<String>,
}

impl ConversionRequest {
    pub fn new(from: &str, amount: Decimal, to: Option<&str>) -> Self {
        ConversionRequest {
            from_currency: Some(from.to_string()),
            amount: Some(amount),
            to_currency: to.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyValue {
    pub code: String,
    pub name: String,
    pub description: String,
    pub value: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CurrencyValue {
    fn new(currency: &Currency, value: Decimal, last_updated: Option<DateTime<Utc>>) -> Self {
        CurrencyValue {
            code: currency.code.clone(),
            name: currency.name.clone(),
            description: currency.description.clone(),
            value,
            last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub from_currency: CurrencyValue,
    pub amount: Decimal,
    pub currency_values: BTreeMap<String, CurrencyValue>,
}

pub struct CurrencyConverter {
    cache: Arc<RateCache>,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ConversionError> {
    match value.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Ok(code.to_uppercase()),
        _ => Err(ConversionError::Validation(field)),
    }
}

fn source_value(
    snapshot: &RateSnapshot,
    from: &str,
    amount: Decimal,
) -> Result<ConversionResult, ConversionError> {
    let currency = snapshot
        .currency(from)
        .ok_or_else(|| ConversionError::CurrencyNotFound(from.to_string()))?;
    Ok(ConversionResult {
        from_currency: CurrencyValue::new(currency, amount, snapshot.rate_timestamp(from, from)),
        amount,
        currency_values: BTreeMap::new(),
    })
}

impl CurrencyConverter {
    pub fn new(cache: Arc<RateCache>) -> Self {
        Self { cache }
    }

    /// Converts `amount` of `fromCurrency` into `toCurrency`.
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult, ConversionError> {
        let from = required(&request.from_currency, "fromCurrency")?;
        let to = required(&request.to_currency, "toCurrency")?;
        let amount = request
            .amount
            .ok_or(ConversionError::Validation("amount"))?;
        debug!("Converting {} {} to {}", amount, from, to);

        let snapshot = self.cache.snapshot();
        let mut result = source_value(&snapshot, &from, amount)?;
        let target = snapshot
            .currency(&to)
            .ok_or_else(|| ConversionError::CurrencyNotFound(to.clone()))?;
        let rate = snapshot
            .rate(&from, &to)
            .ok_or_else(|| ConversionError::RateNotFound {
                from: from.clone(),
                to: to.clone(),
            })?;

        result.currency_values.insert(
            to.clone(),
            CurrencyValue::new(target, amount * rate, snapshot.rate_timestamp(&from, &to)),
        );
        Ok(result)
    }

    /// Converts `amount` of `fromCurrency` into every currency it has a rate for.
    ///
    /// Targets missing from the currency list are skipped rather than failing the result.
    pub fn convert_to_all(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConversionError> {
        let from = required(&request.from_currency, "fromCurrency")?;
        let amount = request
            .amount
            .ok_or(ConversionError::Validation("amount"))?;

        let snapshot = self.cache.snapshot();
        let mut result = source_value(&snapshot, &from, amount)?;
        let Some(rates) = snapshot.rates_for(&from) else {
            debug!("No rates cached for {}", from);
            return Ok(result);
        };

        for (code, rate) in rates {
            match snapshot.currency(code) {
                Some(target) => {
                    result.currency_values.insert(
                        code.clone(),
                        CurrencyValue::new(
                            target,
                            amount * *rate,
                            snapshot.rate_timestamp(&from, code),
                        ),
                    );
                }
                None => warn!("Target currency not found: {}", code),
            }
        }
        debug!(
            "Converted {} {} to {} currencies",
            amount,
            from,
            result.currency_values.len()
        );
        Ok(result)
    }

    /// All cached currencies, ordered by code.
    pub fn list_currencies(&self) -> Vec<Currency> {
        let mut currencies: Vec<Currency> = self.cache.get_all_currencies().into_values().collect();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        currencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::ExchangeRate;
    use crate::core::store::RateStore;
    use crate::store::memory::MemoryRateStore;
    use rust_decimal_macros::dec;

    async fn converter() -> CurrencyConverter {
        let store = Arc::new(MemoryRateStore::with_currencies(vec![
            Currency::new("USD", "US Dollar", "United States dollar"),
            Currency::new("EUR", "Euro", "Euro area currency"),
            Currency::new("GBP", "Pound Sterling", "British pound"),
            Currency::new("CHF", "Swiss Franc", "Swiss franc"),
        ]));
        let now = Utc::now();
        store
            .save_exchange_rates(&[
                ExchangeRate::latest("USD", "EUR", dec!(0.92), now, 1),
                ExchangeRate::latest("USD", "GBP", dec!(0.79), now, 1),
                // Quoted by the provider but not a known currency
                ExchangeRate::latest("USD", "XAU", dec!(0.0004), now, 1),
                ExchangeRate::latest("EUR", "USD", dec!(1.087), now, 1),
            ])
            .await
            .unwrap();
        let cache = Arc::new(RateCache::new(store));
        cache.reload().await.unwrap();
        CurrencyConverter::new(cache)
    }

    #[tokio::test]
    async fn test_convert_pair() {
        let converter = converter().await;
        let result = converter
            .convert(&ConversionRequest::new("USD", dec!(100), Some("EUR")))
            .unwrap();

        assert_eq!(result.amount, dec!(100));
        assert_eq!(result.from_currency.code, "USD");
        assert_eq!(result.from_currency.value, dec!(100));
        assert!(result.from_currency.last_updated.is_some());
        assert_eq!(result.currency_values.len(), 1);
        let eur = &result.currency_values["EUR"];
        assert_eq!(eur.value, dec!(92.0));
        assert_eq!(eur.name, "Euro");
        assert!(eur.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_convert_normalizes_codes() {
        let converter = converter().await;
        let result = converter
            .convert(&ConversionRequest::new(" usd", dec!(10), Some("eur")))
            .unwrap();
        assert_eq!(result.currency_values["EUR"].value, dec!(9.2));
    }

    #[tokio::test]
    async fn test_convert_unknown_currency_is_not_found() {
        let converter = converter().await;
        let err = converter
            .convert(&ConversionRequest::new("USD", dec!(10), Some("ZZZ")))
            .unwrap_err();
        assert_eq!(err, ConversionError::CurrencyNotFound("ZZZ".to_string()));
        assert!(err.is_not_found());

        let err = converter
            .convert(&ConversionRequest::new("ZZZ", dec!(10), Some("USD")))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_convert_missing_rate_is_not_found() {
        let converter = converter().await;
        let err = converter
            .convert(&ConversionRequest::new("GBP", dec!(10), Some("USD")))
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::RateNotFound {
                from: "GBP".to_string(),
                to: "USD".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_convert_validation() {
        let converter = converter().await;
        let mut request = ConversionRequest::new("USD", dec!(10), None);
        assert_eq!(
            converter.convert(&request).unwrap_err(),
            ConversionError::Validation("toCurrency")
        );

        request.to_currency = Some("EUR".to_string());
        request.amount = None;
        assert_eq!(
            converter.convert(&request).unwrap_err(),
            ConversionError::Validation("amount")
        );

        request.amount = Some(dec!(1));
        request.from_currency = Some("   ".to_string());
        let err = converter.convert(&request).unwrap_err();
        assert_eq!(err, ConversionError::Validation("fromCurrency"));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_convert_to_all_skips_unknown_targets() {
        let converter = converter().await;
        let result = converter
            .convert_to_all(&ConversionRequest::new("USD", dec!(50), None))
            .unwrap();

        let codes: Vec<&str> = result.currency_values.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["EUR", "GBP", "USD"]);
        assert_eq!(result.currency_values["EUR"].value, dec!(46));
        assert_eq!(result.currency_values["GBP"].value, dec!(39.5));
        assert_eq!(result.currency_values["USD"].value, dec!(50));
    }

    #[tokio::test]
    async fn test_convert_to_all_without_rates_is_empty() {
        let converter = converter().await;
        let result = converter
            .convert_to_all(&ConversionRequest::new("CHF", dec!(5), None))
            .unwrap();
        assert!(result.currency_values.is_empty());
        assert!(result.from_currency.last_updated.is_none());

        let err = converter
            .convert_to_all(&ConversionRequest::new("ZZZ", dec!(5), None))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_currencies_sorted() {
        let converter = converter().await;
        let codes: Vec<String> = converter
            .list_currencies()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["CHF", "EUR", "GBP", "USD"]);
    }

    #[test]
    fn test_request_json_shape() {
        let request: ConversionRequest =
            serde_json::from_str(r#"{"fromCurrency":"USD","amount":"12.5","toCurrency":"EUR"}"#)
                .unwrap();
        assert_eq!(request.from_currency.as_deref(), Some("USD"));
        assert_eq!(request.amount, Some(dec!(12.5)));
        assert_eq!(request.to_currency.as_deref(), Some("EUR"));
    }
}
