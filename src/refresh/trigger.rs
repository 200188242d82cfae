use crate::core::cache::RateCache;
use crate::refresh::orchestrator::{RateRefreshOrchestrator, RefreshOutcome};
use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const HOUR: Duration = Duration::from_secs(3600);

/// What an on-demand refresh reports back to its caller.
#[derive(Debug)]
pub struct TriggerReport {
    pub elapsed: Duration,
    pub outcome: Result<RefreshOutcome>,
}

impl TriggerReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(outcome) if !outcome.is_failure())
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            Ok(RefreshOutcome::Failed { error, .. }) => Some(error.clone()),
            Ok(_) => None,
            Err(e) => Some(format!("{:#}", e)),
        }
    }
}

/// Entry point shared by the startup, periodic and on-demand paths.
///
/// Runs are serialized: a trigger arriving while another run is in flight
/// waits for it and then runs itself.
pub struct RefreshTrigger {
    orchestrator: RateRefreshOrchestrator,
    cache: Arc<RateCache>,
    run_lock: Mutex<()>,
    run_on_startup: bool,
}

impl RefreshTrigger {
    pub fn new(
        orchestrator: RateRefreshOrchestrator,
        cache: Arc<RateCache>,
        run_on_startup: bool,
    ) -> Self {
        Self {
            orchestrator,
            cache,
            run_lock: Mutex::new(()),
            run_on_startup,
        }
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Refreshes, then reloads the cache whatever the refresh did.
    ///
    /// A failed reload keeps the previous snapshot and does not change the
    /// reported outcome.
    pub async fn run_once(&self) -> Result<RefreshOutcome> {
        let _guard = self.run_lock.lock().await;
        let outcome = self.orchestrator.fetch_and_store_currency_rates().await;
        if let Err(e) = self.cache.reload().await {
            error!(error = ?e, "Failed to reload rate cache after refresh");
        }
        outcome
    }

    pub async fn trigger_now(&self) -> TriggerReport {
        info!("Manual currency rates refresh triggered");
        let started = Instant::now();
        let outcome = self.run_once().await;
        let report = TriggerReport {
            elapsed: started.elapsed(),
            outcome,
        };
        match report.error_message() {
            None => info!(
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Manual currency rates refresh completed"
            ),
            Some(message) => error!(error = %message, "Manual currency rates refresh failed"),
        }
        report
    }

    /// Startup refresh. Without it the cache is still loaded from the store.
    pub async fn startup(&self) -> Result<()> {
        if !self.run_on_startup {
            info!("Startup refresh disabled, loading cached rates from store");
            return self.cache.reload().await;
        }
        info!("Fetching currency rates on startup");
        match self.run_once().await {
            Ok(RefreshOutcome::Failed { error, .. }) => {
                warn!(error = %error, "Startup refresh failed, serving stored rates")
            }
            Ok(_) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Runs at the top of every UTC hour until `shutdown` completes.
    pub async fn run_periodic<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let wait = duration_until_next_hour(Utc::now());
            info!(
                "Next scheduled refresh in {} minutes {} seconds",
                wait.as_secs() / 60,
                wait.as_secs() % 60
            );
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping scheduled refresh");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            match self.run_once().await {
                Ok(RefreshOutcome::Failed { job_id, error }) => {
                    warn!(job_id, error = %error, "Scheduled refresh failed")
                }
                Ok(outcome) => info!(?outcome, "Scheduled refresh finished"),
                Err(e) => error!(error = ?e, "Scheduled refresh could not run"),
            }
        }
    }
}

/// Time left until the next `HH:00:00` boundary, never zero.
pub fn duration_until_next_hour(now: DateTime<Utc>) -> Duration {
    let into_hour = Duration::from_secs(u64::from(now.minute() * 60 + now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    HOUR.saturating_sub(into_hour).max(Duration::from_millis(1))
}
