//! Paper portfolio ledger

use super::types::{
    HoldingPosition, LedgerError, PortfolioSummary, PositionPatch, PositionValuation,
    QuickAddPreset,
};
use crate::market::PriceLookup;
use crate::telemetry::{set_gauge, GaugeMetric};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cash balance plus positions keyed by asset id
///
/// Never touched by the feed; every mutation is an explicit user edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLedger {
    cash: Decimal,
    positions: Vec<HoldingPosition>,
}

impl PortfolioLedger {
    pub fn new(cash: Decimal) -> Self {
        Self::with_positions(cash, Vec::new())
    }

    /// Build from stored state, keeping the first position per asset
    pub fn with_positions(cash: Decimal, positions: Vec<HoldingPosition>) -> Self {
        let mut ledger = Self {
            cash,
            positions: Vec::with_capacity(positions.len()),
        };
        for position in positions {
            if ledger.find(&position.asset_id).is_some() {
                tracing::warn!(asset = %position.asset_id, "Dropping duplicate stored position");
                continue;
            }
            ledger.positions.push(position);
        }
        ledger
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn positions(&self) -> &[HoldingPosition] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> Option<&HoldingPosition> {
        self.positions.get(index)
    }

    /// Index of the position for `asset_id`
    pub fn find(&self, asset_id: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.asset_id == asset_id)
    }

    /// Append a position unless the asset is already held
    ///
    /// Returns `false` and leaves the ledger unchanged for a held asset.
    pub fn add_position(
        &mut self,
        asset_id: impl Into<String>,
        name: impl Into<String>,
        average_cost: Decimal,
        quantity: Decimal,
    ) -> bool {
        let position = HoldingPosition::new(asset_id, name, average_cost, quantity);
        if self.find(&position.asset_id).is_some() {
            tracing::debug!(asset = %position.asset_id, "Position already held");
            return false;
        }

        tracing::info!(asset = %position.asset_id, avg = %average_cost, qty = %quantity, "Position added");
        self.positions.push(position);
        true
    }

    pub fn quick_add(&mut self, preset: &QuickAddPreset) -> bool {
        self.add_position(
            preset.asset_id,
            preset.name,
            preset.average_cost,
            preset.quantity,
        )
    }

    /// Merge `patch` into the position at `index`
    pub fn update_position(
        &mut self,
        index: usize,
        patch: PositionPatch,
    ) -> Result<&HoldingPosition, LedgerError> {
        let position = self
            .positions
            .get_mut(index)
            .ok_or(LedgerError::PositionNotFound(index))?;

        if let Some(name) = patch.name {
            position.name = name;
        }
        if let Some(average_cost) = patch.average_cost {
            position.average_cost = average_cost;
        }
        if let Some(quantity) = patch.quantity {
            position.quantity = quantity;
        }

        tracing::info!(asset = %position.asset_id, index, "Position updated");
        Ok(position)
    }

    pub fn remove_position(&mut self, index: usize) -> Option<HoldingPosition> {
        if index >= self.positions.len() {
            return None;
        }
        let removed = self.positions.remove(index);
        tracing::info!(asset = %removed.asset_id, index, "Position removed");
        Some(removed)
    }

    /// Deposit (positive) or withdraw (negative); the balance never goes below zero
    pub fn adjust_cash(&mut self, delta: Decimal) -> Decimal {
        self.cash = self.cash.saturating_add(delta).max(Decimal::ZERO);
        self.cash
    }

    /// Per-position figures; assets without a price are valued at zero
    pub fn valuate(&self, prices: &impl PriceLookup) -> Vec<PositionValuation> {
        self.positions
            .iter()
            .map(|p| {
                let price = prices.price_of(&p.asset_id).unwrap_or(Decimal::ZERO);
                PositionValuation::at_price(p, price)
            })
            .collect()
    }

    pub fn summary(&self, prices: &impl PriceLookup) -> PortfolioSummary {
        let rows = self.valuate(prices);
        let total = |field: fn(&PositionValuation) -> Decimal| {
            rows.iter()
                .map(field)
                .fold(Decimal::ZERO, Decimal::saturating_add)
        };
        let total_cost = total(|r| r.cost_basis);
        let total_value = total(|r| r.market_value);

        PortfolioSummary {
            cash: self.cash,
            total_cost,
            total_value,
            total_pnl: total_value.saturating_sub(total_cost),
            total_equity: self.cash.saturating_add(total_value),
            positions: rows.len(),
        }
    }
}

impl PortfolioSummary {
    /// Publish totals as gauges
    pub fn record_gauges(&self) {
        set_gauge(GaugeMetric::Cash, self.cash.to_f64().unwrap_or_default());
        set_gauge(
            GaugeMetric::HoldingsValue,
            self.total_value.to_f64().unwrap_or_default(),
        );
        set_gauge(
            GaugeMetric::UnrealizedPnl,
            self.total_pnl.to_f64().unwrap_or_default(),
        );
        set_gauge(GaugeMetric::OpenPositions, self.positions as f64);
    }
}
