use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::provider::{RateProvider, RateSet};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the `/latest` endpoint of a freecurrencyapi-compatible service.
pub struct FreeCurrencyApiProvider {
    base_url: String,
    api_key: String,
}

impl FreeCurrencyApiProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        FreeCurrencyApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn latest_url(&self, base: &str, currencies: &[String]) -> Result<Url> {
        let url = Url::parse_with_params(
            &format!("{}/latest", self.base_url),
            &[
                ("apikey", self.api_key.as_str()),
                ("base_currency", base),
                ("currencies", currencies.join(",").as_str()),
            ],
        )?;
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    data: Option<HashMap<String, f64>>,
}

/// Keeps the quoted decimal digits. Targets whose rate does not fit a
/// positive `Decimal` are dropped from the set.
fn to_rate_set(base: &str, data: HashMap<String, f64>) -> RateSet {
    data.into_iter()
        .filter_map(|(code, value)| match Decimal::from_str(&value.to_string()) {
            Ok(rate) if rate > Decimal::ZERO => Some((code, rate)),
            Ok(_) => {
                warn!(base, target = %code, value, "Skipping non-positive rate");
                None
            }
            Err(e) => {
                warn!(base, target = %code, value, error = %e, "Skipping unrepresentable rate");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RateProvider for FreeCurrencyApiProvider {
    #[instrument(
        name = "FreeCurrencyFetch",
        skip(self, currencies),
        fields(base = %base, targets = currencies.len())
    )]
    async fn fetch_latest(&self, base: &str, currencies: &[String]) -> Result<Option<RateSet>> {
        let url = self.latest_url(base, currencies)?;
        debug!("Requesting latest rates from {}{}", self.base_url, url.path());

        let client = reqwest::Client::builder()
            .user_agent("ratesync/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for base currency: {}", e, base))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for base currency: {}",
                response.status(),
                base
            ));
        }

        let text = response.text().await?;
        let body: LatestResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", base, e))?;

        match body.data {
            Some(data) => {
                let rates = to_rate_set(base, data);
                debug!("Received {} rates for {}", rates.len(), base);
                Ok(Some(rates))
            }
            None => {
                debug!("Response for {} carried no rate data", base);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn codes() -> Vec<String> {
        vec!["USD".to_string(), "EUR".to_string(), "JPY".to_string()]
    }

    #[tokio::test]
    async fn test_successful_latest_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("apikey", "test-key"))
            .and(query_param("base_currency", "USD"))
            .and(query_param("currencies", "USD,EUR,JPY"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": {"USD": 1, "EUR": 0.92, "JPY": 151.234567}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = FreeCurrencyApiProvider::new(&mock_server.uri(), "test-key");
        let rates = provider
            .fetch_latest("USD", &codes())
            .await
            .expect("Failed to fetch rates")
            .expect("Expected a rate set");

        assert_eq!(rates.len(), 3);
        assert_eq!(rates["EUR"], dec!(0.92));
        assert_eq!(rates["JPY"], dec!(151.234567));
        assert_eq!(rates["USD"], Decimal::ONE);
    }

    #[tokio::test]
    async fn test_missing_data_means_no_rates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"message": "quota exceeded"}"#),
            )
            .mount(&mock_server)
            .await;

        let provider = FreeCurrencyApiProvider::new(&mock_server.uri(), "test-key");
        let result = provider.fetch_latest("USD", &codes()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = FreeCurrencyApiProvider::new(&mock_server.uri(), "test-key");
        let result = provider.fetch_latest("EUR", &codes()).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for base currency: EUR"
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": ["EUR"]}"#))
            .mount(&mock_server)
            .await;

        let provider = FreeCurrencyApiProvider::new(&mock_server.uri(), "test-key");
        let result = provider.fetch_latest("USD", &codes()).await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for USD")
        );
    }

    #[tokio::test]
    async fn test_out_of_range_rate_is_skipped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": {"EUR": 0.92, "VEF": 1e40, "XXX": 0}}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = FreeCurrencyApiProvider::new(&mock_server.uri(), "test-key");
        let rates = provider
            .fetch_latest("USD", &codes())
            .await
            .expect("Out of range values should not fail the fetch")
            .expect("Expected a rate set");

        assert_eq!(rates.len(), 1);
        assert_eq!(rates["EUR"], dec!(0.92));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = FreeCurrencyApiProvider::new("http://localhost:9/v1/", "k");
        let url = provider.latest_url("USD", &codes()).unwrap();
        assert_eq!(url.path(), "/v1/latest");
        assert!(url.query().unwrap().contains("base_currency=USD"));
    }
}
