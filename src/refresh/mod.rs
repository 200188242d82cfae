pub mod orchestrator;
pub mod staleness;
pub mod trigger;

use crate::core::cache::RateCache;
use crate::core::config::AppConfig;
use crate::core::provider::RateProvider;
use crate::core::store::RateStore;
use orchestrator::RateRefreshOrchestrator;
use staleness::StalenessChecker;
use std::sync::Arc;
use trigger::RefreshTrigger;

/// Wires the refresh pipeline for one store, provider and cache.
pub fn build_trigger(
    config: &AppConfig,
    store: Arc<dyn RateStore>,
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
) -> RefreshTrigger {
    let staleness = StalenessChecker::new(store.clone(), config.refresh.freshness_window());
    let orchestrator =
        RateRefreshOrchestrator::new(store, provider, staleness, config.refresh.request_delay());
    RefreshTrigger::new(orchestrator, cache, config.refresh.run_on_startup)
}
