use crate::core::currency::Currency;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.freecurrencyapi.com/v1".to_string(),
            api_key: String::new(),
        }
    }
}

fn default_freshness_window_hours() -> u64 {
    24
}

fn default_request_delay_ms() -> u64 {
    100
}

fn default_run_on_startup() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RefreshConfig {
    /// Rates younger than this are not fetched again.
    #[serde(default = "default_freshness_window_hours")]
    pub freshness_window_hours: u64,
    /// Pause between provider calls within one run.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            freshness_window_hours: default_freshness_window_hours(),
            request_delay_ms: default_request_delay_ms(),
            run_on_startup: default_run_on_startup(),
        }
    }
}

impl RefreshConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_window_hours as i64)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Reference data upserted into the store on startup.
    #[serde(default)]
    pub currencies: Vec<Currency>,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratesync", "ratesync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "ratesync", "ratesync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/v1"
  api_key: "secret"
refresh:
  freshness_window_hours: 12
  request_delay_ms: 250
  run_on_startup: false
currencies:
  - code: "USD"
    name: "US Dollar"
    description: "United States dollar"
  - code: "EUR"
    name: "Euro"
data_path: "/tmp/ratesync"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/v1");
        assert_eq!(config.provider.api_key, "secret");
        assert_eq!(config.refresh.freshness_window(), chrono::Duration::hours(12));
        assert_eq!(config.refresh.request_delay(), Duration::from_millis(250));
        assert!(!config.refresh.run_on_startup);
        assert_eq!(config.currencies.len(), 2);
        assert_eq!(config.currencies[1].code, "EUR");
        assert!(config.currencies[1].description.is_empty());
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/ratesync")
        );
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("currencies: []").unwrap();
        assert_eq!(config.provider.base_url, "https://api.freecurrencyapi.com/v1");
        assert_eq!(config.refresh.freshness_window_hours, 24);
        assert_eq!(config.refresh.request_delay_ms, 100);
        assert!(config.refresh.run_on_startup);
        assert!(config.data_path.is_none());

        let partial: AppConfig =
            serde_yaml::from_str("refresh:\n  request_delay_ms: 0\n").unwrap();
        assert_eq!(partial.refresh.request_delay_ms, 0);
        assert_eq!(partial.refresh.freshness_window_hours, 24);
    }
}
