//! Persistence abstraction for currencies, rate rows and job history

use crate::core::currency::{Currency, ExchangeRate, RateStatus};
use crate::core::job::JobExecutionRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait RateStore: Send + Sync {
    async fn find_all_currencies(&self) -> Result<Vec<Currency>>;

    async fn find_currency(&self, code: &str) -> Result<Option<Currency>>;

    /// Inserts or replaces currencies by code.
    async fn save_currencies(&self, currencies: &[Currency]) -> Result<()>;

    async fn find_all_rates_by_status(&self, status: RateStatus) -> Result<Vec<ExchangeRate>>;

    /// Flips every `Latest` row of `base` to `status`. Returns the number of rows touched.
    async fn update_status_for_base_currency(&self, base: &str, status: RateStatus)
    -> Result<usize>;

    /// True if `base` has at least one `Latest` row stamped at or after `since`.
    async fn has_recent_rates(&self, base: &str, since: DateTime<Utc>) -> Result<bool>;

    async fn save_exchange_rates(&self, rates: &[ExchangeRate]) -> Result<()>;

    /// Newest row for a pair, regardless of status.
    async fn find_latest_rate(&self, base: &str, target: &str) -> Result<Option<ExchangeRate>>;

    /// Every row ever stored for a pair, oldest first.
    async fn find_rate_history(&self, base: &str, target: &str) -> Result<Vec<ExchangeRate>>;

    /// Persists the record, assigning an id on first save.
    async fn save_job_execution(&self, record: JobExecutionRecord) -> Result<JobExecutionRecord>;

    /// Most recent job records first.
    async fn find_job_executions(&self, limit: usize) -> Result<Vec<JobExecutionRecord>>;

    /// Supersedes the `Latest` rows of `bases` and inserts `rates` as the new generation.
    ///
    /// Stores that can write atomically should override this so readers never
    /// see a base with its old rows flipped but the new rows missing.
    async fn commit_rate_generation(&self, bases: &[String], rates: &[ExchangeRate]) -> Result<()> {
        for base in bases {
            self.update_status_for_base_currency(base, RateStatus::Old)
                .await?;
        }
        self.save_exchange_rates(rates).await
    }
}
