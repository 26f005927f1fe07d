//! Upbit WebSocket ticker feed

use super::types::{
    asset_id_from_code, millis_to_utc, positive_price, PriceTick, TickParseError, TickSource,
};
use super::PriceFeed;
use crate::config::StreamConfig;
use crate::telemetry::{increment_counter, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Upbit WebSocket endpoint
pub const UPBIT_WS_URL: &str = "wss://api.upbit.com/websocket/v1";

/// Upbit ticker frame (DEFAULT format)
#[derive(Debug, Deserialize)]
struct UpbitTickerMessage {
    /// Frame type, "ticker" for price updates
    #[serde(rename = "type")]
    kind: Option<String>,
    /// Market code (e.g., "KRW-BTC")
    code: Option<String>,
    /// Last trade price
    trade_price: Option<f64>,
    /// 24h accumulated traded value
    acc_trade_price_24h: Option<f64>,
    /// Exchange timestamp (milliseconds)
    timestamp: Option<i64>,
}

/// Upbit ticker subscription over a reconnecting WebSocket
pub struct UpbitFeed {
    url: String,
    ticket: String,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    ping_interval: Duration,
}

impl UpbitFeed {
    /// Create a feed for the given endpoint with default timings
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(&StreamConfig {
            url: url.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            url: config.url.clone(),
            ticket: config.ticket.clone(),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(config.max_reconnect_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            ping_interval: Duration::from_secs(config.ping_interval_secs),
        }
    }

    /// Build the subscription frame for the given market codes
    fn build_subscription(ticket: &str, markets: &[String]) -> String {
        serde_json::json!([
            { "ticket": ticket },
            { "type": "ticker", "codes": markets },
            { "format": "DEFAULT" }
        ])
        .to_string()
    }

    /// Unique ticket per subscription
    fn next_ticket(&self) -> String {
        format!("{}-{}", self.ticket, Uuid::new_v4().simple())
    }

    /// Parse an Upbit frame into a PriceTick
    ///
    /// Frames that are not tickers, or that lack a numeric trade price, are
    /// not ticks and yield `Ok(None)`.
    fn parse_message(msg: &str) -> Result<Option<PriceTick>, TickParseError> {
        let ticker: UpbitTickerMessage = serde_json::from_str(msg)?;

        if ticker.kind.as_deref() != Some("ticker") {
            return Ok(None);
        }
        let Some(raw_price) = ticker.trade_price else {
            return Ok(None);
        };

        let code = ticker.code.unwrap_or_default();
        let asset_id = asset_id_from_code(&code)
            .ok_or_else(|| TickParseError::InvalidCode(code.clone()))?;
        let price =
            positive_price(raw_price).ok_or_else(|| TickParseError::InvalidPrice(code.clone()))?;

        Ok(Some(PriceTick {
            asset_id: asset_id.to_string(),
            price,
            volume_24h: ticker.acc_trade_price_24h.and_then(positive_price),
            timestamp: Utc::now(),
            exchange_ts: ticker.timestamp.and_then(millis_to_utc),
            source: TickSource::Stream,
        }))
    }

    /// Upbit sends tickers as binary frames carrying UTF-8 JSON
    fn parse_binary(data: Vec<u8>) -> Result<Option<PriceTick>, TickParseError> {
        let text = String::from_utf8(data)?;
        Self::parse_message(&text)
    }

    /// Run the message processing loop
    async fn run_message_loop(
        mut ws_rx: mpsc::Receiver<WsMessage>,
        tick_tx: mpsc::Sender<PriceTick>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            let parsed = match msg {
                WsMessage::Text(text) => Self::parse_message(&text),
                WsMessage::Binary(data) => Self::parse_binary(data),
                WsMessage::Connected => {
                    tracing::info!("Upbit feed connected");
                    continue;
                }
                WsMessage::Disconnected => {
                    tracing::warn!("Upbit feed disconnected");
                    break;
                }
                WsMessage::Reconnecting { attempt } => {
                    tracing::warn!(attempt, "Upbit feed reconnecting...");
                    continue;
                }
            };

            match parsed {
                Ok(Some(tick)) => {
                    if tick_tx.send(tick).await.is_err() {
                        tracing::debug!("Tick receiver dropped, stopping feed");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    increment_counter(CounterMetric::ParseFailure);
                    tracing::debug!(error = %e, "Dropping malformed feed frame");
                }
            }
        }
    }
}

impl Default for UpbitFeed {
    fn default() -> Self {
        Self::new(UPBIT_WS_URL)
    }
}

#[async_trait]
impl PriceFeed for UpbitFeed {
    async fn subscribe(
        &self,
        markets: &[String],
        cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
        if markets.is_empty() {
            anyhow::bail!("No markets to subscribe to");
        }

        let (tick_tx, tick_rx) = mpsc::channel(1024);
        let subscription = Self::build_subscription(&self.next_ticket(), markets);

        tracing::info!(url = %self.url, markets = ?markets, "Subscribing to Upbit ticker feed");

        let config = WsConfig::new(self.url.clone())
            .subscribe_with(subscription)
            .initial_delay(self.reconnect_delay)
            .max_delay(self.max_reconnect_delay)
            .max_reconnects(self.max_reconnect_attempts)
            .ping_interval(self.ping_interval);

        let ws_rx = WsClient::new(config).connect(cancel);

        tokio::spawn(async move {
            Self::run_message_loop(ws_rx, tick_tx).await;
        });

        Ok(tick_rx)
    }
}
