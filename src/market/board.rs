//! Shared board of tracked assets

use super::asset::{Asset, AssetView};
use super::catalog::{self, AssetInfo};
use super::PriceLookup;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

/// Board ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BoardSort {
    /// Catalog order
    #[default]
    Popular,
    /// Price, highest first
    Price,
    /// Window change, highest first
    Change,
    /// Traded value, highest first
    Volume,
}

/// Cloneable handle to the asset records written by the feed dispatcher
///
/// Only the dispatcher mutates prices; readers take short read locks and get
/// owned snapshots back.
#[derive(Debug, Clone, Default)]
pub struct MarketBoard {
    assets: Arc<RwLock<Vec<Asset>>>,
}

impl MarketBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board contents with fresh assets for the given ids
    pub(crate) fn reset(&self, asset_ids: &[String], catalog: &[AssetInfo], capacity: usize) {
        let assets = asset_ids
            .iter()
            .map(|id| {
                let info = catalog::lookup(catalog, id)
                    .cloned()
                    .unwrap_or_else(|| AssetInfo::new(id.clone(), id.clone(), false));
                Asset::new(&info, capacity)
            })
            .collect();
        *self.assets.write() = assets;
    }

    /// Apply a price to a tracked asset, returning the updated view
    ///
    /// Returns `None` for ids that are not on the board.
    pub(crate) fn apply(
        &self,
        asset_id: &str,
        price: Decimal,
        volume: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> Option<AssetView> {
        let mut assets = self.assets.write();
        let asset = assets.iter_mut().find(|a| a.id == asset_id)?;
        asset.apply_price(price, volume, at);
        Some(asset.view())
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.assets.read().iter().any(|a| a.id == asset_id)
    }

    pub fn get(&self, asset_id: &str) -> Option<AssetView> {
        self.assets
            .read()
            .iter()
            .find(|a| a.id == asset_id)
            .map(Asset::view)
    }

    /// All assets in catalog order
    pub fn views(&self) -> Vec<AssetView> {
        self.assets.read().iter().map(Asset::view).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }

    /// Flip the starred flag, returning the new value
    pub fn toggle_star(&self, asset_id: &str) -> Option<bool> {
        let mut assets = self.assets.write();
        let asset = assets.iter_mut().find(|a| a.id == asset_id)?;
        asset.starred = !asset.starred;
        Some(asset.starred)
    }

    /// Filtered, sorted listing with starred assets first
    pub fn list(&self, query: &str, sort: BoardSort) -> Vec<AssetView> {
        let query = query.trim().to_lowercase();
        let matching: Vec<AssetView> = self
            .views()
            .into_iter()
            .filter(|a| {
                query.is_empty()
                    || a.name.to_lowercase().contains(&query)
                    || a.id.to_lowercase().contains(&query)
            })
            .collect();

        let (mut starred, mut rest): (Vec<_>, Vec<_>) =
            matching.into_iter().partition(|a| a.starred);
        sort_views(&mut starred, sort);
        sort_views(&mut rest, sort);
        starred.extend(rest);
        starred
    }
}

fn sort_views(views: &mut [AssetView], sort: BoardSort) {
    let zero = Decimal::ZERO;
    match sort {
        BoardSort::Popular => {}
        BoardSort::Price => {
            views.sort_by(|a, b| b.price.unwrap_or(zero).cmp(&a.price.unwrap_or(zero)))
        }
        BoardSort::Change => views.sort_by(|a, b| b.change_pct.cmp(&a.change_pct)),
        BoardSort::Volume => {
            views.sort_by(|a, b| b.volume.unwrap_or(zero).cmp(&a.volume.unwrap_or(zero)))
        }
    }
}

impl PriceLookup for MarketBoard {
    fn price_of(&self, asset_id: &str) -> Option<Decimal> {
        self.assets
            .read()
            .iter()
            .find(|a| a.id == asset_id)
            .and_then(Asset::price)
    }
}
