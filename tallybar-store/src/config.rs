//! Configuration management.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tallybar_fetch::{FetchSettings, RetryPolicy};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::default_config_path;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Request stack settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Analytics settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Badge and background refresh interval in seconds.
    #[serde(default = "default_interval")]
    pub refresh_interval_secs: u64,
    /// Usage alert poll interval in seconds.
    #[serde(default = "default_interval")]
    pub alert_interval_secs: u64,
    /// How long background work waits for stores to hydrate.
    #[serde(default = "default_hydration_timeout")]
    pub hydration_timeout_secs: u64,
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Rate limiting, retry and timeout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Requests per second per base URL.
    #[serde(default = "default_qps")]
    pub default_qps: usize,
    /// Per-base-URL QPS overrides.
    #[serde(default)]
    pub qps_overrides: HashMap<String, usize>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Upper bound for one retry delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Cooldown after a 429, in seconds.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

/// Analytics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Maximum number of points in a time series.
    #[serde(default = "default_max_points")]
    pub max_points: usize,
}

fn default_interval() -> u64 {
    60
}

fn default_hydration_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_qps() -> usize {
    3
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_cooldown() -> u64 {
    30
}

fn default_max_points() -> usize {
    1_000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_interval(),
            alert_interval_secs: default_interval(),
            hydration_timeout_secs: default_hydration_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_qps: default_qps(),
            qps_overrides: HashMap::new(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            cooldown_secs: default_cooldown(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
        }
    }
}

impl GeneralConfig {
    /// Refresh interval as a duration (at least one second).
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Alert interval as a duration (at least one second).
    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs.max(1))
    }

    /// Hydration timeout as a duration.
    pub fn hydration_timeout(&self) -> Duration {
        Duration::from_secs(self.hydration_timeout_secs)
    }
}

impl NetworkConfig {
    /// Builds the request stack settings.
    pub fn fetch_settings(&self) -> FetchSettings {
        let retry = RetryPolicy::new(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms));
        let qps_overrides = self
            .qps_overrides
            .iter()
            .map(|(url, qps)| (url.clone(), (*qps).max(1)))
            .collect();
        FetchSettings {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            retry,
            default_qps: self.default_qps.max(1),
            qps_overrides,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path. A missing file yields the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::default_path())
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Request stack settings.
    pub fn fetch_settings(&self) -> FetchSettings {
        self.network.fetch_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.refresh_interval_secs, 60);
        assert_eq!(config.general.hydration_timeout(), Duration::from_secs(5));
        assert_eq!(config.network.default_qps, 3);
        assert_eq!(config.analytics.max_points, 1000);

        let fetch = config.fetch_settings();
        assert_eq!(fetch.retry.max_retries, 3);
        assert_eq!(fetch.retry.base_delay, Duration::from_millis(1000));
        assert_eq!(fetch.retry.max_delay, Duration::from_millis(10_000));
        assert_eq!(fetch.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"network": {"default_qps": 5, "qps_overrides": {"https://a.example/": 1}}}"#,
        )
        .unwrap();
        assert_eq!(config.network.default_qps, 5);
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.general.alert_interval_secs, 60);

        let fetch = config.fetch_settings();
        assert_eq!(fetch.qps_overrides.get("https://a.example/"), Some(&1));
    }

    #[test]
    fn test_load_missing_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.analytics.max_points = 200;
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().analytics.max_points, 200);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(Config::load_from(&path), Err(StoreError::Config(_))));
    }
}
