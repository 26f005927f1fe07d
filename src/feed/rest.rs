//! Upbit REST ticker snapshot client

use super::types::{asset_id_from_code, millis_to_utc, positive_price, PriceTick, TickSource};
use super::SnapshotSource;
use crate::config::PollingConfig;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Upbit REST API base URL
pub const UPBIT_API_URL: &str = "https://api.upbit.com";

/// One element of the `/v1/ticker` response
#[derive(Debug, Deserialize)]
struct UpbitRestTicker {
    market: Option<String>,
    trade_price: Option<f64>,
    acc_trade_price_24h: Option<f64>,
    timestamp: Option<i64>,
}

/// Client for Upbit's public ticker snapshot endpoint
pub struct UpbitRestClient {
    base_url: String,
    client: Client,
}

impl UpbitRestClient {
    /// Create a client against the public API with default timeout
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(&PollingConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: &PollingConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self::with_client(&config.base_url, client))
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn ticker_url(&self) -> String {
        format!("{}/v1/ticker", self.base_url)
    }

    /// Map a snapshot response body to ticks
    ///
    /// Elements without a market code or numeric positive price are skipped
    /// one by one; only a body that is not a JSON array is an error.
    fn parse_snapshot(body: &str) -> anyhow::Result<Vec<PriceTick>> {
        let items: Vec<serde_json::Value> = serde_json::from_str(body)?;
        let received = Utc::now();

        let ticks = items
            .into_iter()
            .filter_map(|item| {
                let ticker: UpbitRestTicker = serde_json::from_value(item).ok()?;
                let market = ticker.market?;
                let asset_id = asset_id_from_code(&market)?;
                let price = positive_price(ticker.trade_price?)?;

                Some(PriceTick {
                    asset_id: asset_id.to_string(),
                    price,
                    volume_24h: ticker.acc_trade_price_24h.and_then(positive_price),
                    timestamp: received,
                    exchange_ts: ticker.timestamp.and_then(millis_to_utc),
                    source: TickSource::Poll,
                })
            })
            .collect();

        Ok(ticks)
    }
}

#[async_trait]
impl SnapshotSource for UpbitRestClient {
    async fn fetch_snapshot(&self, markets: &[String]) -> anyhow::Result<Vec<PriceTick>> {
        let url = self.ticker_url();

        tracing::debug!(url = %url, count = markets.len(), "Fetching ticker snapshot");

        let response = self
            .client
            .get(&url)
            .query(&[("markets", markets.join(","))])
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upbit API error: {} - {}", status, body);
        }

        let body = response.text().await?;
        Self::parse_snapshot(&body)
    }
}
