//! Domain types, collaborator traits and the read-side cache

pub mod cache;
pub mod config;
pub mod converter;
pub mod currency;
pub mod job;
pub mod log;
pub mod provider;
pub mod store;

// Re-export main types for cleaner imports
pub use cache::RateCache;
pub use converter::{ConversionError, ConversionRequest, CurrencyConverter};
pub use currency::{Currency, ExchangeRate, RateStatus};
pub use job::{JobExecutionRecord, JobStatus};
pub use provider::{RateProvider, RateSet};
pub use store::RateStore;
