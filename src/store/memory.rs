use crate::core::currency::{Currency, ExchangeRate, RateStatus};
use crate::core::job::JobExecutionRecord;
use crate::core::store::RateStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    currencies: BTreeMap<String, Currency>,
    rates: Vec<ExchangeRate>,
    jobs: BTreeMap<u64, JobExecutionRecord>,
    next_job_id: u64,
}

impl Tables {
    fn supersede(&mut self, base: &str, status: RateStatus) -> usize {
        let mut touched = 0;
        for rate in self
            .rates
            .iter_mut()
            .filter(|r| r.base_currency == base && r.is_latest())
        {
            rate.status = status;
            touched += 1;
        }
        touched
    }

    fn insert_rates(&mut self, rates: &[ExchangeRate]) {
        for rate in rates {
            let existing = self.rates.iter().position(|r| {
                r.base_currency == rate.base_currency
                    && r.target_currency == rate.target_currency
                    && r.rate_timestamp == rate.rate_timestamp
            });
            match existing {
                Some(index) => self.rates[index] = rate.clone(),
                None => self.rates.push(rate.clone()),
            }
        }
    }
}

/// Volatile store kept entirely in process memory.
pub struct MemoryRateStore {
    inner: Mutex<Tables>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
        }
    }

    pub fn with_currencies(currencies: Vec<Currency>) -> Self {
        let tables = Tables {
            currencies: currencies
                .into_iter()
                .map(|c| (c.code.clone(), c))
                .collect(),
            ..Tables::default()
        };
        Self {
            inner: Mutex::new(tables),
        }
    }

    /// Every stored row, in insertion order.
    pub async fn all_rates(&self) -> Vec<ExchangeRate> {
        self.inner.lock().await.rates.clone()
    }
}

impl Default for MemoryRateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn find_all_currencies(&self) -> Result<Vec<Currency>> {
        Ok(self.inner.lock().await.currencies.values().cloned().collect())
    }

    async fn find_currency(&self, code: &str) -> Result<Option<Currency>> {
        Ok(self.inner.lock().await.currencies.get(code).cloned())
    }

    async fn save_currencies(&self, currencies: &[Currency]) -> Result<()> {
        let mut tables = self.inner.lock().await;
        for currency in currencies {
            tables
                .currencies
                .insert(currency.code.clone(), currency.clone());
        }
        Ok(())
    }

    async fn find_all_rates_by_status(&self, status: RateStatus) -> Result<Vec<ExchangeRate>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .rates
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn update_status_for_base_currency(
        &self,
        base: &str,
        status: RateStatus,
    ) -> Result<usize> {
        let touched = self.inner.lock().await.supersede(base, status);
        debug!("Flipped {} rows of {} to {}", touched, base, status);
        Ok(touched)
    }

    async fn has_recent_rates(&self, base: &str, since: DateTime<Utc>) -> Result<bool> {
        let tables = self.inner.lock().await;
        Ok(tables
            .rates
            .iter()
            .any(|r| r.base_currency == base && r.is_latest() && r.rate_timestamp >= since))
    }

    async fn save_exchange_rates(&self, rates: &[ExchangeRate]) -> Result<()> {
        self.inner.lock().await.insert_rates(rates);
        Ok(())
    }

    async fn find_latest_rate(&self, base: &str, target: &str) -> Result<Option<ExchangeRate>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .rates
            .iter()
            .filter(|r| r.base_currency == base && r.target_currency == target)
            .max_by_key(|r| r.rate_timestamp)
            .cloned())
    }

    async fn find_rate_history(&self, base: &str, target: &str) -> Result<Vec<ExchangeRate>> {
        let tables = self.inner.lock().await;
        let mut history: Vec<ExchangeRate> = tables
            .rates
            .iter()
            .filter(|r| r.base_currency == base && r.target_currency == target)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.rate_timestamp);
        Ok(history)
    }

    async fn save_job_execution(&self, mut record: JobExecutionRecord) -> Result<JobExecutionRecord> {
        let mut tables = self.inner.lock().await;
        let id = match record.id {
            Some(id) => id,
            None => {
                tables.next_job_id += 1;
                tables.next_job_id
            }
        };
        record.id = Some(id);
        tables.jobs.insert(id, record.clone());
        Ok(record)
    }

    async fn find_job_executions(&self, limit: usize) -> Result<Vec<JobExecutionRecord>> {
        let tables = self.inner.lock().await;
        Ok(tables.jobs.values().rev().take(limit).cloned().collect())
    }

    async fn commit_rate_generation(&self, bases: &[String], rates: &[ExchangeRate]) -> Result<()> {
        let mut tables = self.inner.lock().await;
        for base in bases {
            tables.supersede(base, RateStatus::Old);
        }
        tables.insert_rates(rates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::{CURRENCY_RATE_FETCH, JobStatus};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_commit_generation_soft_versions() {
        let store = MemoryRateStore::new();
        let first = Utc::now() - Duration::hours(30);
        let second = Utc::now();
        store
            .save_exchange_rates(&[
                ExchangeRate::latest("USD", "EUR", dec!(0.90), first, 1),
                ExchangeRate::latest("EUR", "USD", dec!(1.11), first, 1),
            ])
            .await
            .unwrap();

        store
            .commit_rate_generation(
                &["USD".to_string()],
                &[ExchangeRate::latest("USD", "EUR", dec!(0.92), second, 2)],
            )
            .await
            .unwrap();

        let history = store.find_rate_history("USD", "EUR").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, RateStatus::Old);
        assert_eq!(history[0].rate, dec!(0.90));
        assert_eq!(history[1].status, RateStatus::Latest);
        assert_eq!(history[1].rate, dec!(0.92));

        // Other bases are untouched
        let eur = store.find_latest_rate("EUR", "USD").await.unwrap().unwrap();
        assert!(eur.is_latest());
        assert_eq!(store.all_rates().await.len(), 3);
    }

    #[tokio::test]
    async fn test_has_recent_rates_only_counts_latest() {
        let store = MemoryRateStore::new();
        let now = Utc::now();
        store
            .save_exchange_rates(&[ExchangeRate::latest("USD", "EUR", dec!(0.9), now, 1)])
            .await
            .unwrap();
        let since = now - Duration::hours(24);
        assert!(store.has_recent_rates("USD", since).await.unwrap());
        assert!(!store.has_recent_rates("EUR", since).await.unwrap());

        store
            .update_status_for_base_currency("USD", RateStatus::Old)
            .await
            .unwrap();
        assert!(!store.has_recent_rates("USD", since).await.unwrap());
    }

    #[tokio::test]
    async fn test_job_ids_are_assigned_once() {
        let store = MemoryRateStore::new();
        let mut job = store
            .save_job_execution(JobExecutionRecord::start(CURRENCY_RATE_FETCH))
            .await
            .unwrap();
        assert_eq!(job.id, Some(1));

        job.complete(3);
        let job = store.save_job_execution(job).await.unwrap();
        assert_eq!(job.id, Some(1));

        store
            .save_job_execution(JobExecutionRecord::start(CURRENCY_RATE_FETCH))
            .await
            .unwrap();
        let jobs = store.find_job_executions(10).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, Some(2));
        assert_eq!(jobs[1].status, JobStatus::Completed);
    }
}
