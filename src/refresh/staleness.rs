use crate::core::store::RateStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::hours(24);

/// Decides whether stored `Latest` rates have aged past the freshness window.
#[derive(Clone)]
pub struct StalenessChecker {
    store: Arc<dyn RateStore>,
    window: Duration,
}

impl StalenessChecker {
    pub fn new(store: Arc<dyn RateStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// True as soon as one known currency lacks a fresh `Latest` rate.
    pub async fn needs_rate_refresh(&self) -> Result<bool> {
        self.needs_rate_refresh_at(Utc::now()).await
    }

    pub async fn needs_rate_refresh_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let since = now - self.window;
        let currencies = self.store.find_all_currencies().await?;
        debug!(
            "Checking rate refresh status for {} currencies",
            currencies.len()
        );

        for currency in &currencies {
            if !self.store.has_recent_rates(&currency.code, since).await? {
                info!(
                    base = %currency.code,
                    "Currency needs rate refresh, last update before {}",
                    since
                );
                return Ok(true);
            }
            debug!(base = %currency.code, "Currency rates are up to date");
        }

        info!("All {} currency rates are up to date", currencies.len());
        Ok(false)
    }

    /// Whether `base` alone has a `Latest` rate inside the window.
    pub async fn is_fresh(&self, base: &str) -> Result<bool> {
        self.is_fresh_at(base, Utc::now()).await
    }

    pub async fn is_fresh_at(&self, base: &str, now: DateTime<Utc>) -> Result<bool> {
        self.store.has_recent_rates(base, now - self.window).await
    }
}
