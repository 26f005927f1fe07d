//! Market state module
//!
//! Asset catalog, per-asset rolling price history, and the shared board
//! that consumers read.

mod asset;
mod board;
pub mod catalog;
mod series;

pub use asset::{Asset, AssetView};
pub use board::{BoardSort, MarketBoard};
pub use catalog::{default_catalog, AssetInfo};
pub use series::{pct_change, Sample, TimeSeriesBuffer, DEFAULT_CAPACITY};

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Read access to the latest known price per asset
pub trait PriceLookup {
    /// Latest price for an asset, if one has been observed
    fn price_of(&self, asset_id: &str) -> Option<Decimal>;
}

impl PriceLookup for HashMap<String, Decimal> {
    fn price_of(&self, asset_id: &str) -> Option<Decimal> {
        self.get(asset_id).copied()
    }
}
