//! One refresh run: staleness gate, fetch into a buffer, commit the buffer.
//!
//! Provider calls happen before anything but the job record is written, so a
//! slow or failing provider never leaves a half-superseded base behind. The
//! buffered generation is committed in one `commit_rate_generation` call.

use crate::core::currency::{Currency, ExchangeRate};
use crate::core::job::{CURRENCY_RATE_FETCH, JobExecutionRecord};
use crate::core::provider::RateProvider;
use crate::core::store::RateStore;
use crate::refresh::staleness::StalenessChecker;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Every currency was fresh; no job record was created.
    Skipped,
    Completed {
        job_id: u64,
        records_processed: u64,
        currencies_skipped: usize,
    },
    Failed {
        job_id: u64,
        error: String,
    },
}

impl RefreshOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RefreshOutcome::Failed { .. })
    }
}

/// Rows fetched during a run, not yet written.
#[derive(Default)]
struct FetchBuffer {
    bases: Vec<String>,
    rates: Vec<ExchangeRate>,
    currencies_skipped: usize,
}

pub struct RateRefreshOrchestrator {
    store: Arc<dyn RateStore>,
    provider: Arc<dyn RateProvider>,
    staleness: StalenessChecker,
    request_delay: Duration,
}

impl RateRefreshOrchestrator {
    pub fn new(
        store: Arc<dyn RateStore>,
        provider: Arc<dyn RateProvider>,
        staleness: StalenessChecker,
        request_delay: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            staleness,
            request_delay,
        }
    }

    /// Refreshes every stale base currency.
    ///
    /// Returns `Err` only when the run cannot get as far as creating its job
    /// record. Anything that goes wrong afterwards is recorded on the job and
    /// reported as `RefreshOutcome::Failed`.
    #[instrument(name = "CurrencyRateFetch", skip(self))]
    pub async fn fetch_and_store_currency_rates(&self) -> Result<RefreshOutcome> {
        let started = Instant::now();
        info!("Starting currency rates fetch job");

        let currencies = self.store.find_all_currencies().await?;
        debug!("Found {} currencies in store", currencies.len());

        if !self.staleness.needs_rate_refresh().await? {
            info!("Skipping provider calls as rates are fresh");
            return Ok(RefreshOutcome::Skipped);
        }

        let mut job = self
            .store
            .save_job_execution(JobExecutionRecord::start(CURRENCY_RATE_FETCH))
            .await?;
        let job_id = job
            .id
            .ok_or_else(|| anyhow!("Store did not assign a job execution id"))?;
        info!(
            job_id,
            "Starting currency rates fetch job for {} currencies",
            currencies.len()
        );

        let result = self.run_job(job_id, &currencies).await;
        let outcome = match result {
            Ok(buffer) => {
                let processed = buffer.rates.len() as u64;
                job.complete(processed);
                info!(
                    job_id,
                    records = processed,
                    skipped = buffer.currencies_skipped,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Currency rates fetch job completed"
                );
                RefreshOutcome::Completed {
                    job_id,
                    records_processed: processed,
                    currencies_skipped: buffer.currencies_skipped,
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id, error = ?e, "Failed to fetch currency rates");
                job.fail(message.clone());
                RefreshOutcome::Failed {
                    job_id,
                    error: message,
                }
            }
        };

        if let Err(e) = self.store.save_job_execution(job).await {
            error!(job_id, error = %e, "Failed to finalize job execution record");
        }
        Ok(outcome)
    }

    async fn run_job(&self, job_id: u64, currencies: &[Currency]) -> Result<FetchBuffer> {
        let buffer = self.fetch_stale_rates(job_id, currencies).await?;
        self.persist(&buffer).await?;
        Ok(buffer)
    }

    /// Stops at the first provider error; remaining currencies wait for the next run.
    async fn fetch_stale_rates(&self, job_id: u64, currencies: &[Currency]) -> Result<FetchBuffer> {
        let codes: Vec<String> = currencies.iter().map(|c| c.code.clone()).collect();
        let rate_timestamp: DateTime<Utc> = Utc::now();
        let mut buffer = FetchBuffer::default();
        let mut calls = 0usize;

        for (index, base) in codes.iter().enumerate() {
            if self.staleness.is_fresh(base).await? {
                debug!(base = %base, "Skipping currency as rates are fresh");
                buffer.currencies_skipped += 1;
                continue;
            }

            if calls > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            calls += 1;

            info!(
                base = %base,
                processed = buffer.rates.len(),
                "Fetching rates for base currency ({}/{})",
                index + 1,
                codes.len()
            );
            match self.provider.fetch_latest(base, &codes).await? {
                Some(rates) => {
                    let before = buffer.rates.len();
                    buffer.rates.extend(
                        rates
                            .into_iter()
                            .filter(|(target, _)| target != base)
                            .map(|(target, rate)| {
                                ExchangeRate::latest(base, &target, rate, rate_timestamp, job_id)
                            }),
                    );
                    buffer.bases.push(base.clone());
                    debug!(
                        base = %base,
                        "Fetched {} rates",
                        buffer.rates.len() - before
                    );
                }
                None => warn!(base = %base, "Provider returned no rates"),
            }
        }

        Ok(buffer)
    }

    async fn persist(&self, buffer: &FetchBuffer) -> Result<()> {
        if buffer.bases.is_empty() {
            warn!("No new rates to save to store");
            return Ok(());
        }
        debug!(
            "Saving {} exchange rates for {} base currencies",
            buffer.rates.len(),
            buffer.bases.len()
        );
        self.store
            .commit_rate_generation(&buffer.bases, &buffer.rates)
            .await
    }
}
