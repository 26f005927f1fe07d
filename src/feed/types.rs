//! Price feed types

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which source produced a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickSource {
    /// Streaming WebSocket subscription
    Stream,
    /// REST snapshot poll
    Poll,
}

impl TickSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickSource::Stream => "stream",
            TickSource::Poll => "poll",
        }
    }
}

/// A single price observation from either source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Asset id without market prefix (e.g., "BTC")
    pub asset_id: String,
    /// Trade price
    pub price: Decimal,
    /// 24h accumulated traded value, when the exchange reports it
    pub volume_24h: Option<Decimal>,
    /// Local timestamp when the tick was received
    pub timestamp: DateTime<Utc>,
    /// Exchange timestamp, when present
    pub exchange_ts: Option<DateTime<Utc>>,
    /// Originating source
    pub source: TickSource,
}

impl PriceTick {
    /// Create a tick stamped with the current time
    pub fn new(asset_id: impl Into<String>, price: Decimal, source: TickSource) -> Self {
        Self {
            asset_id: asset_id.into(),
            price,
            volume_24h: None,
            timestamp: Utc::now(),
            exchange_ts: None,
            source,
        }
    }
}

/// Exchange market code for an asset (e.g., "KRW" + "BTC" -> "KRW-BTC")
pub fn market_code(quote: &str, asset_id: &str) -> String {
    format!("{}-{}", quote, asset_id)
}

/// Asset id from a prefixed market code: the second `-` segment
pub fn asset_id_from_code(code: &str) -> Option<&str> {
    code.split('-').nth(1).filter(|id| !id.is_empty())
}

/// Positive, finite exchange price as a decimal
pub fn positive_price(raw: f64) -> Option<Decimal> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    Decimal::try_from(raw).ok()
}

/// Exchange millisecond timestamp as UTC
pub fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Reasons a feed frame could not be turned into a tick
#[derive(Debug, Error)]
pub enum TickParseError {
    /// Frame was not valid JSON of the expected shape
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary frame was not UTF-8
    #[error("Binary frame is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// Market code could not be split into an asset id
    #[error("Invalid market code: {0:?}")]
    InvalidCode(String),
    /// Price was missing, non-finite or not positive
    #[error("Invalid trade price for {0}")]
    InvalidPrice(String),
}

/// Errors surfaced once by the coordinator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// No asset ids were supplied
    #[error("Asset list is empty")]
    EmptyAssetList,
    /// An asset id is empty or contains characters outside [A-Z0-9]
    #[error("Invalid asset id: {0:?}")]
    InvalidAssetId(String),
    /// The same asset id was supplied twice
    #[error("Duplicate asset id: {0}")]
    DuplicateAssetId(String),
    /// Streaming is disabled and polling is not configured
    #[error("No price source available: streaming disabled and polling disabled")]
    NoSourceAvailable,
    /// `start` called on a running coordinator
    #[error("Price feed already running")]
    AlreadyRunning,
}
