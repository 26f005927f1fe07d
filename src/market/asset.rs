//! Per-asset price record

use super::catalog::AssetInfo;
use super::series::{Sample, TimeSeriesBuffer};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Live state for one tracked asset
///
/// The current price is always read from the newest sample in the history,
/// so it cannot drift from the window.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    pub name: String,
    /// 24h traded value as last reported by the exchange (informational)
    pub volume: Option<Decimal>,
    /// UI-owned flag, passed through untouched by the feed
    pub starred: bool,
    previous_price: Option<Decimal>,
    history: TimeSeriesBuffer,
    updated_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Create an asset with an empty history
    pub fn new(info: &AssetInfo, capacity: usize) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            volume: None,
            starred: info.starred,
            previous_price: None,
            history: TimeSeriesBuffer::new(capacity),
            updated_at: None,
        }
    }

    /// Fold a new price into the rolling history
    pub fn apply_price(
        &mut self,
        price: Decimal,
        volume: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> Sample {
        self.previous_price = self.price();
        if volume.is_some() {
            self.volume = volume;
        }
        self.updated_at = Some(at);
        self.history.push(price)
    }

    /// Latest price, if any tick has been applied
    pub fn price(&self) -> Option<Decimal> {
        self.history.latest().map(|s| s.value)
    }

    /// Price before the latest update
    pub fn previous_price(&self) -> Option<Decimal> {
        self.previous_price
    }

    /// Percent change over the rolling window
    pub fn change_pct(&self) -> Decimal {
        self.history.change_pct()
    }

    pub fn history(&self) -> &TimeSeriesBuffer {
        &self.history
    }

    /// Immutable snapshot handed to consumers
    pub fn view(&self) -> AssetView {
        AssetView {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price(),
            previous_price: self.previous_price,
            change_pct: self.change_pct(),
            volume: self.volume,
            starred: self.starred,
            samples: self.history.to_vec(),
            updated_at: self.updated_at,
        }
    }
}

/// Snapshot of an asset after an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetView {
    pub id: String,
    pub name: String,
    pub price: Option<Decimal>,
    pub previous_price: Option<Decimal>,
    pub change_pct: Decimal,
    pub volume: Option<Decimal>,
    pub starred: bool,
    pub samples: Vec<Sample>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AssetView {
    /// Whether the latest update moved the price up or held it flat
    pub fn ticked_up(&self) -> bool {
        match (self.price, self.previous_price) {
            (Some(price), Some(prev)) => price >= prev,
            _ => true,
        }
    }
}
