//! Configuration types for marketx

use crate::feed::{UPBIT_API_URL, UPBIT_WS_URL};
use crate::market::catalog::{default_asset_ids, default_catalog};
use crate::market::AssetInfo;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Validation failures for a loaded configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("feed.assets must not be empty")]
    NoAssets,
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("streaming and polling are both disabled")]
    NoSourceEnabled,
    #[error("quote_currency must not be empty")]
    EmptyQuoteCurrency,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub catalog: Vec<AssetInfo>,
    pub portfolio: PortfolioConfig,
    pub telemetry: TelemetryConfig,
}

/// Price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Market prefix (e.g., "KRW" for `KRW-BTC`)
    pub quote_currency: String,
    /// Asset ids tracked by `watch`
    pub assets: Vec<String>,
    pub streaming_enabled: bool,
    pub polling_enabled: bool,
    /// Samples kept per asset
    pub buffer_capacity: usize,
    /// Decimal places prices are rounded to
    pub price_decimals: u32,
    pub stream: StreamConfig,
    pub polling: PollingConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            quote_currency: "KRW".to_string(),
            assets: default_asset_ids(),
            streaming_enabled: true,
            polling_enabled: true,
            buffer_capacity: 40,
            price_decimals: 0,
            stream: StreamConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

/// WebSocket stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub url: String,
    /// Ticket prefix sent in the subscription frame
    pub ticket: String,
    pub reconnect_delay_ms: u64,
    /// Equal to `reconnect_delay_ms` for a fixed retry interval
    pub max_reconnect_delay_ms: u64,
    /// Consecutive failed connects before the stream gives up (0 = never)
    pub max_reconnect_attempts: u32,
    pub ping_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: UPBIT_WS_URL.to_string(),
            ticket: "marketx".to_string(),
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 1000,
            max_reconnect_attempts: 0,
            ping_interval_secs: 30,
        }
    }
}

/// REST polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub base_url: String,
    pub interval_ms: u64,
    /// Feed silence after which fallback polling kicks in
    pub quiet_threshold_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_url: UPBIT_API_URL.to_string(),
            interval_ms: 1000,
            quiet_threshold_ms: 1500,
            request_timeout_ms: 5000,
        }
    }
}

/// Paper portfolio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// JSON file backing the key-value store
    pub store_path: PathBuf,
    /// Cash used when nothing has been stored yet
    pub initial_cash: Decimal,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("marketx-state.json"),
            initial_cash: Decimal::from(5_000_000),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if config.catalog.is_empty() {
            config.catalog = default_catalog();
        }
        Ok(config)
    }

    /// Defaults with the built-in asset catalog filled in
    pub fn with_default_catalog() -> Self {
        Self {
            catalog: default_catalog(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let feed = &self.feed;
        if feed.assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }
        if feed.quote_currency.trim().is_empty() {
            return Err(ConfigError::EmptyQuoteCurrency);
        }
        if !feed.streaming_enabled && !feed.polling_enabled {
            return Err(ConfigError::NoSourceEnabled);
        }
        if feed.buffer_capacity == 0 {
            return Err(ConfigError::ZeroValue("feed.buffer_capacity"));
        }
        if feed.polling.interval_ms == 0 {
            return Err(ConfigError::ZeroValue("feed.polling.interval_ms"));
        }
        if feed.stream.reconnect_delay_ms == 0 {
            return Err(ConfigError::ZeroValue("feed.stream.reconnect_delay_ms"));
        }
        if feed.stream.ping_interval_secs == 0 {
            return Err(ConfigError::ZeroValue("feed.stream.ping_interval_secs"));
        }
        Ok(())
    }
}
