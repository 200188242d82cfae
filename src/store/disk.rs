use crate::core::currency::{Currency, ExchangeRate, RateStatus};
use crate::core::job::JobExecutionRecord;
use crate::core::store::RateStore;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::Path;
use tracing::{debug, info};

const CURRENCIES: &str = "currencies";
const EXCHANGE_RATES: &str = "exchange_rates";
const LATEST_RATES: &str = "latest_rates";
const JOB_EXECUTIONS: &str = "job_executions";
const LOCK_FILE: &str = "ratesync.lock";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// History rows sort by pair, then by time within the pair.
fn rate_key(rate: &ExchangeRate) -> String {
    format!(
        "{}/{}/{:020}",
        rate.base_currency,
        rate.target_currency,
        rate.rate_timestamp.timestamp_micros()
    )
}

fn latest_key(rate: &ExchangeRate) -> String {
    format!("{}/{}", rate.base_currency, rate.target_currency)
}

fn base_prefix(base: &str) -> String {
    format!("{base}/")
}

fn pair_prefix(base: &str, target: &str) -> String {
    format!("{base}/{target}/")
}

fn job_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn job_id_from_key(key: &[u8]) -> Result<u64> {
    let bytes = <[u8; 8]>::try_from(key).map_err(|_| anyhow!("Corrupt job execution key"))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Takes an exclusive lock on the data directory for the life of the returned file.
fn lock_data_dir(path: &Path) -> Result<File> {
    let lock_path = path.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
    match file.try_lock() {
        Ok(()) => Ok(file),
        Err(TryLockError::WouldBlock) => bail!(
            "Rate store at {} is in use by another ratesync process",
            path.display()
        ),
        Err(TryLockError::Error(e)) => {
            Err(e).with_context(|| format!("Failed to lock {}", lock_path.display()))
        }
    }
}

/// Durable store on a fjall keyspace with one partition per table.
///
/// `exchange_rates` keeps every row ever written. `latest_rates` holds only the
/// current `Latest` row per pair and is rewritten in the same batch as history.
pub struct FjallRateStore {
    keyspace: Keyspace,
    currencies: PartitionHandle,
    rates: PartitionHandle,
    latest: PartitionHandle,
    jobs: PartitionHandle,
    job_ids: Mutex<()>,
    _lock: File,
}

impl FjallRateStore {
    /// Fails if another process already holds the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        let lock = lock_data_dir(path)?;

        let keyspace = Config::new(path.join("fjall_db"))
            .open()
            .with_context(|| format!("Failed to open rate store at {}", path.display()))?;
        let currencies = keyspace.open_partition(CURRENCIES, PartitionCreateOptions::default())?;
        let rates = keyspace.open_partition(EXCHANGE_RATES, PartitionCreateOptions::default())?;
        let latest = keyspace.open_partition(LATEST_RATES, PartitionCreateOptions::default())?;
        let jobs = keyspace.open_partition(JOB_EXECUTIONS, PartitionCreateOptions::default())?;

        let store = Self {
            keyspace,
            currencies,
            rates,
            latest,
            jobs,
            job_ids: Mutex::new(()),
            _lock: lock,
        };
        store.rebuild_latest_index()?;
        debug!(path = %path.display(), "Opened rate store");
        Ok(store)
    }

    /// Fills `latest_rates` from history for stores written before the index existed.
    fn rebuild_latest_index(&self) -> Result<()> {
        if self.latest.first_key_value()?.is_some() || self.rates.first_key_value()?.is_none() {
            return Ok(());
        }
        let mut batch = self.keyspace.batch();
        let mut indexed = 0;
        for kv in self.rates.iter() {
            let (_, value) = kv?;
            let rate: ExchangeRate = decode(&value)?;
            if rate.is_latest() {
                batch.insert(&self.latest, latest_key(&rate), value.to_vec());
                indexed += 1;
            }
        }
        if indexed > 0 {
            self.commit(batch)?;
            info!("Indexed {} latest rates", indexed);
        }
        Ok(())
    }

    fn scan(&self, partition: &PartitionHandle, prefix: &str) -> Result<Vec<ExchangeRate>> {
        let mut rows = Vec::new();
        for kv in partition.prefix(prefix) {
            let (_, value) = kv?;
            rows.push(decode::<ExchangeRate>(&value)?);
        }
        Ok(rows)
    }

    /// Rewrites the current `Latest` rows of `base` with `status`.
    ///
    /// Index entries listed in `replaced` are left for the caller to overwrite.
    fn stage_supersede(
        &self,
        batch: &mut Batch,
        base: &str,
        status: RateStatus,
        replaced: &HashSet<String>,
    ) -> Result<usize> {
        let mut touched = 0;
        for mut rate in self.scan(&self.latest, &base_prefix(base))? {
            rate.status = status;
            batch.insert(&self.rates, rate_key(&rate), encode(&rate)?);
            let index_key = latest_key(&rate);
            if !rate.is_latest() && !replaced.contains(&index_key) {
                batch.remove(&self.latest, index_key);
            }
            touched += 1;
        }
        Ok(touched)
    }

    fn stage_rates(&self, batch: &mut Batch, rates: &[ExchangeRate]) -> Result<()> {
        for rate in rates {
            let value = encode(rate)?;
            if rate.is_latest() {
                batch.insert(&self.latest, latest_key(rate), value.clone());
            }
            batch.insert(&self.rates, rate_key(rate), value);
        }
        Ok(())
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl RateStore for FjallRateStore {
    async fn find_all_currencies(&self) -> Result<Vec<Currency>> {
        let mut currencies = Vec::new();
        for kv in self.currencies.iter() {
            let (_, value) = kv?;
            currencies.push(decode(&value)?);
        }
        Ok(currencies)
    }

    async fn find_currency(&self, code: &str) -> Result<Option<Currency>> {
        match self.currencies.get(code)? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    async fn save_currencies(&self, currencies: &[Currency]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for currency in currencies {
            batch.insert(&self.currencies, currency.code.as_str(), encode(currency)?);
        }
        self.commit(batch)
    }

    async fn find_all_rates_by_status(&self, status: RateStatus) -> Result<Vec<ExchangeRate>> {
        if status == RateStatus::Latest {
            return self.scan(&self.latest, "");
        }
        Ok(self
            .scan(&self.rates, "")?
            .into_iter()
            .filter(|rate| rate.status == status)
            .collect())
    }

    async fn update_status_for_base_currency(
        &self,
        base: &str,
        status: RateStatus,
    ) -> Result<usize> {
        let mut batch = self.keyspace.batch();
        let touched = self.stage_supersede(&mut batch, base, status, &HashSet::new())?;
        self.commit(batch)?;
        debug!("Flipped {} rows of {} to {}", touched, base, status);
        Ok(touched)
    }

    async fn has_recent_rates(&self, base: &str, since: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .scan(&self.latest, &base_prefix(base))?
            .iter()
            .any(|rate| rate.rate_timestamp >= since))
    }

    async fn save_exchange_rates(&self, rates: &[ExchangeRate]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        self.stage_rates(&mut batch, rates)?;
        self.commit(batch)
    }

    async fn find_latest_rate(&self, base: &str, target: &str) -> Result<Option<ExchangeRate>> {
        match self.rates.prefix(pair_prefix(base, target)).next_back() {
            Some(kv) => {
                let (_, value) = kv?;
                Ok(Some(decode(&value)?))
            }
            None => Ok(None),
        }
    }

    async fn find_rate_history(&self, base: &str, target: &str) -> Result<Vec<ExchangeRate>> {
        self.scan(&self.rates, &pair_prefix(base, target))
    }

    /// New ids follow the highest id on disk.
    async fn save_job_execution(&self, mut record: JobExecutionRecord) -> Result<JobExecutionRecord> {
        let _guard = self.job_ids.lock();
        let id = match record.id {
            Some(id) => id,
            None => match self.jobs.last_key_value()? {
                Some((key, _)) => job_id_from_key(&key)? + 1,
                None => 1,
            },
        };
        record.id = Some(id);
        self.jobs.insert(job_key(id), encode(&record)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(record)
    }

    async fn find_job_executions(&self, limit: usize) -> Result<Vec<JobExecutionRecord>> {
        let mut records = Vec::new();
        for kv in self.jobs.iter().rev().take(limit) {
            let (_, value) = kv?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }

    /// Supersede and insert land in a single batch.
    async fn commit_rate_generation(&self, bases: &[String], rates: &[ExchangeRate]) -> Result<()> {
        let replaced: HashSet<String> = rates
            .iter()
            .filter(|rate| rate.is_latest())
            .map(latest_key)
            .collect();
        let mut batch = self.keyspace.batch();
        for base in bases {
            self.stage_supersede(&mut batch, base, RateStatus::Old, &replaced)?;
        }
        self.stage_rates(&mut batch, rates)?;
        self.commit(batch)?;
        debug!(
            bases = bases.len(),
            rows = rates.len(),
            "Committed rate generation"
        );
        Ok(())
    }
}
