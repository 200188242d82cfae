//! Currency reference data and exchange rate rows

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Currency {
    pub fn new(code: &str, name: &str, description: &str) -> Self {
        Currency {
            code: code.to_uppercase(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Soft-versioning marker for rate rows. Superseded rows are kept as `Old`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RateStatus {
    Latest,
    Old,
}

impl Display for RateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RateStatus::Latest => "LATEST",
                RateStatus::Old => "OLD",
            }
        )
    }
}

/// One stored rate for a (base, target) pair at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base_currency: String,
    pub target_currency: String,
    pub rate: Decimal,
    pub rate_timestamp: DateTime<Utc>,
    pub status: RateStatus,
    pub job_execution_id: u64,
}

impl ExchangeRate {
    /// A fresh `Latest` row produced by the refresh job `job_execution_id`.
    pub fn latest(
        base: &str,
        target: &str,
        rate: Decimal,
        rate_timestamp: DateTime<Utc>,
        job_execution_id: u64,
    ) -> Self {
        ExchangeRate {
            base_currency: base.to_string(),
            target_currency: target.to_string(),
            rate,
            rate_timestamp,
            status: RateStatus::Latest,
            job_execution_id,
        }
    }

    pub fn is_latest(&self) -> bool {
        self.status == RateStatus::Latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_code_is_normalized() {
        let currency = Currency::new("usd", "US Dollar", "United States dollar");
        assert_eq!(currency.code, "USD");
    }

    #[test]
    fn test_rate_status_serializes_uppercase() {
        let rate = ExchangeRate::latest("USD", "EUR", dec!(0.92), Utc::now(), 1);
        let json = serde_json::to_string(&rate).unwrap();
        assert!(json.contains("\"status\":\"LATEST\""));

        let parsed: ExchangeRate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rate);
        assert!(parsed.is_latest());
    }
}
