//! Portfolio command implementation

use super::{format_krw, format_pct};
use crate::config::Config;
use crate::feed::{market_code, round_price, SnapshotSource, UpbitRestClient};
use crate::market::catalog;
use crate::portfolio::{
    PortfolioLedger, PortfolioStore, PortfolioSummary, PositionPatch, PositionValuation,
    QuickAddPreset,
};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Args, Debug)]
pub struct PortfolioArgs {
    #[command(subcommand)]
    pub command: PortfolioCommand,
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommand {
    /// Value positions at current prices
    Show,
    /// Add a position (ignored if the asset is already held)
    Add {
        /// Asset symbol, e.g. BTC
        asset: String,
        /// Average cost per unit
        avg: Decimal,
        /// Quantity held
        qty: Decimal,
    },
    /// Edit a position by index
    Update {
        index: usize,
        #[arg(long)]
        avg: Option<Decimal>,
        #[arg(long)]
        qty: Option<Decimal>,
    },
    /// Remove a position by index
    Remove { index: usize },
    /// Deposit (positive) or withdraw (negative) cash
    Cash {
        #[arg(allow_hyphen_values = true)]
        delta: Decimal,
    },
    /// Add a preset position (BTC or ETH)
    QuickAdd { asset: String },
}

impl PortfolioArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = PortfolioStore::open(
            &config.portfolio.store_path,
            config.portfolio.initial_cash,
        );
        let mut ledger = store.load();

        let changed = apply_command(&self.command, &mut ledger, config)?;
        if changed {
            store.save(&ledger)?;
        }

        let prices = fetch_prices(&ledger, config).await;
        let summary = ledger.summary(&prices);
        summary.record_gauges();
        print!("{}", render(&ledger.valuate(&prices), &summary));
        Ok(())
    }
}

/// Apply an edit to the ledger, returning whether it changed
fn apply_command(
    command: &PortfolioCommand,
    ledger: &mut PortfolioLedger,
    config: &Config,
) -> anyhow::Result<bool> {
    let changed = match command {
        PortfolioCommand::Show => false,
        PortfolioCommand::Add { asset, avg, qty } => {
            let id = asset.to_uppercase();
            let name = catalog::lookup(&config.catalog, &id)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| id.clone());
            let added = ledger.add_position(id.clone(), name, *avg, *qty);
            if !added {
                println!("{} is already held; use `update` to edit it", id);
            }
            added
        }
        PortfolioCommand::Update { index, avg, qty } => {
            let patch = PositionPatch {
                average_cost: *avg,
                quantity: *qty,
                ..Default::default()
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass --avg and/or --qty");
            }
            ledger.update_position(*index, patch)?;
            true
        }
        PortfolioCommand::Remove { index } => {
            ledger
                .remove_position(*index)
                .ok_or_else(|| anyhow::anyhow!("No position at index {}", index))?;
            true
        }
        PortfolioCommand::Cash { delta } => {
            ledger.adjust_cash(*delta);
            true
        }
        PortfolioCommand::QuickAdd { asset } => {
            let preset = QuickAddPreset::for_asset(asset)
                .ok_or_else(|| anyhow::anyhow!("No preset for {}; available: BTC, ETH", asset))?;
            ledger.quick_add(&preset)
        }
    };
    Ok(changed)
}

/// One snapshot for the held assets; on failure positions are valued at zero
async fn fetch_prices(ledger: &PortfolioLedger, config: &Config) -> HashMap<String, Decimal> {
    if ledger.positions().is_empty() {
        return HashMap::new();
    }

    let markets: Vec<String> = ledger
        .positions()
        .iter()
        .map(|p| market_code(&config.feed.quote_currency, &p.asset_id))
        .collect();

    let result = match UpbitRestClient::with_config(&config.feed.polling) {
        Ok(client) => client.fetch_snapshot(&markets).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(ticks) => ticks
            .into_iter()
            .map(|t| (t.asset_id, round_price(t.price, config.feed.price_decimals)))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Price snapshot failed, valuing positions at zero");
            HashMap::new()
        }
    }
}

fn render(rows: &[PositionValuation], summary: &PortfolioSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total equity  {}\n", format_krw(summary.total_equity)));
    out.push_str(&format!("Cash          {}\n", format_krw(summary.cash)));
    out.push_str(&format!("Holdings      {}\n", format_krw(summary.total_value)));
    out.push_str(&format!(
        "P&L           {} ({} cost)\n",
        format_krw(summary.total_pnl),
        format_krw(summary.total_cost)
    ));

    if rows.is_empty() {
        out.push_str("\nNo positions\n");
        return out;
    }

    out.push('\n');
    for (i, row) in rows.iter().enumerate() {
        out.push_str(&format!(
            "#{:<2} {:<6} qty {:<12} avg {:>16}  now {:>16}  value {:>16}  pnl {:>16} {:>9}\n",
            i,
            row.asset_id,
            row.quantity.normalize(),
            format_krw(row.average_cost),
            format_krw(row.price),
            format_krw(row.market_value),
            format_krw(row.pnl),
            format_pct(row.pnl_rate)
        ));
    }
    out
}
