pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::currency::Currency;
use crate::core::store::RateStore;
use anyhow::Result;
use disk::FjallRateStore;
use std::sync::Arc;
use tracing::info;

/// Opens the durable store under the configured data directory.
pub fn open(config: &AppConfig) -> Result<Arc<dyn RateStore>> {
    let path = config.default_data_path()?;
    info!("Opening rate store at {}", path.display());
    Ok(Arc::new(FjallRateStore::open(&path)?))
}

/// Upserts the configured reference currencies.
pub async fn seed_currencies(store: &dyn RateStore, currencies: &[Currency]) -> Result<()> {
    if currencies.is_empty() {
        return Ok(());
    }
    let normalized: Vec<Currency> = currencies
        .iter()
        .map(|c| Currency::new(&c.code, &c.name, &c.description))
        .collect();
    store.save_currencies(&normalized).await?;
    info!("Seeded {} currencies", normalized.len());
    Ok(())
}
