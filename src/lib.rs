pub mod cli;
pub mod core;
pub mod providers;
pub mod refresh;
pub mod store;

use crate::core::cache::RateCache;
use crate::core::config::AppConfig;
use crate::core::converter::CurrencyConverter;
use crate::core::store::RateStore;
use crate::providers::FreeCurrencyApiProvider;
use crate::refresh::trigger::RefreshTrigger;
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Serve,
    Refresh,
    Convert {
        amount: Decimal,
        from: String,
        to: String,
    },
    ConvertAll {
        amount: Decimal,
        from: String,
    },
    Currencies,
    Jobs {
        limit: usize,
    },
    History {
        base: String,
        target: String,
    },
}

/// Store, cache and refresh pipeline built from one configuration.
pub struct App {
    pub store: Arc<dyn RateStore>,
    pub cache: Arc<RateCache>,
    pub converter: CurrencyConverter,
    pub trigger: RefreshTrigger,
}

impl App {
    pub async fn build(config: &AppConfig, store: Arc<dyn RateStore>) -> Result<Self> {
        store::seed_currencies(store.as_ref(), &config.currencies).await?;

        let provider = Arc::new(FreeCurrencyApiProvider::new(
            &config.provider.base_url,
            &config.provider.api_key,
        ));
        let cache = Arc::new(RateCache::new(store.clone()));
        let converter = CurrencyConverter::new(cache.clone());
        let trigger = refresh::build_trigger(config, store.clone(), provider, cache.clone());

        Ok(App {
            store,
            cache,
            converter,
            trigger,
        })
    }

    pub async fn execute(&self, command: AppCommand) -> Result<()> {
        match command {
            AppCommand::Serve => cli::serve::run(&self.trigger).await,
            AppCommand::Refresh => cli::refresh::run(&self.trigger).await,
            AppCommand::Convert { amount, from, to } => {
                self.cache.reload().await?;
                cli::convert::run(&self.converter, amount, &from, Some(&to))
            }
            AppCommand::ConvertAll { amount, from } => {
                self.cache.reload().await?;
                cli::convert::run(&self.converter, amount, &from, None)
            }
            AppCommand::Currencies => {
                self.cache.reload().await?;
                cli::currencies::run(&self.converter)
            }
            AppCommand::Jobs { limit } => cli::jobs::run(self.store.as_ref(), limit).await,
            AppCommand::History { base, target } => {
                cli::history::run(self.store.as_ref(), &base, &target).await
            }
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("ratesync starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = store::open(&config)?;
    let app = App::build(&config, store).await?;
    app.execute(command).await
}
