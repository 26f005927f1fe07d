//! Portfolio types

use crate::market::pct_change;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger operation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no position at index {0}")]
    PositionNotFound(usize),
}

/// A held position, edited only by the user
///
/// Field names on the wire match the stored `holdings` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingPosition {
    #[serde(rename = "id")]
    pub asset_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "avg")]
    pub average_cost: Decimal,
    #[serde(rename = "qty")]
    pub quantity: Decimal,
}

impl HoldingPosition {
    pub fn new(
        asset_id: impl Into<String>,
        name: impl Into<String>,
        average_cost: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            name: name.into(),
            average_cost,
            quantity,
        }
    }

    // Figures saturate at the Decimal range instead of overflowing

    pub fn cost_basis(&self) -> Decimal {
        self.average_cost.saturating_mul(self.quantity)
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        price.saturating_mul(self.quantity)
    }

    pub fn pnl(&self, price: Decimal) -> Decimal {
        self.market_value(price).saturating_sub(self.cost_basis())
    }

    /// Return on average cost in percent; zero when the cost is not positive
    pub fn pnl_rate(&self, price: Decimal) -> Decimal {
        if self.average_cost > Decimal::ZERO {
            pct_change(self.average_cost, price)
        } else {
            Decimal::ZERO
        }
    }
}

/// Partial edit of a position; `None` fields are left as they are
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionPatch {
    pub name: Option<String>,
    pub average_cost: Option<Decimal>,
    pub quantity: Option<Decimal>,
}

impl PositionPatch {
    pub fn average_cost(value: Decimal) -> Self {
        Self {
            average_cost: Some(value),
            ..Default::default()
        }
    }

    pub fn quantity(value: Decimal) -> Self {
        Self {
            quantity: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.average_cost.is_none() && self.quantity.is_none()
    }
}

/// One-click position templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAddPreset {
    pub asset_id: &'static str,
    pub name: &'static str,
    pub average_cost: Decimal,
    pub quantity: Decimal,
}

impl QuickAddPreset {
    pub const BTC: Self = Self {
        asset_id: "BTC",
        name: "비트코인",
        average_cost: dec!(100000000),
        quantity: dec!(0.3),
    };

    pub const ETH: Self = Self {
        asset_id: "ETH",
        name: "이더리움",
        average_cost: dec!(3500000),
        quantity: dec!(2.8571429),
    };

    pub const ALL: [Self; 2] = [Self::BTC, Self::ETH];

    /// Preset for an asset id, case-insensitive
    pub fn for_asset(asset_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.asset_id.eq_ignore_ascii_case(asset_id))
    }

    pub fn to_position(&self) -> HoldingPosition {
        HoldingPosition::new(self.asset_id, self.name, self.average_cost, self.quantity)
    }
}

/// Position figures at a given price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValuation {
    pub asset_id: String,
    pub name: String,
    pub average_cost: Decimal,
    pub quantity: Decimal,
    /// Zero when no price is known
    pub price: Decimal,
    pub cost_basis: Decimal,
    pub market_value: Decimal,
    pub pnl: Decimal,
    pub pnl_rate: Decimal,
}

impl PositionValuation {
    pub fn at_price(position: &HoldingPosition, price: Decimal) -> Self {
        Self {
            asset_id: position.asset_id.clone(),
            name: position.name.clone(),
            average_cost: position.average_cost,
            quantity: position.quantity,
            price,
            cost_basis: position.cost_basis(),
            market_value: position.market_value(price),
            pnl: position.pnl(price),
            pnl_rate: position.pnl_rate(price),
        }
    }
}

/// Portfolio totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub cash: Decimal,
    pub total_cost: Decimal,
    pub total_value: Decimal,
    pub total_pnl: Decimal,
    /// Cash plus market value of all positions
    pub total_equity: Decimal,
    pub positions: usize,
}
