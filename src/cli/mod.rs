//! CLI interface for marketx
//!
//! Provides subcommands for:
//! - `watch`: Stream live prices into the board
//! - `portfolio`: Show and edit the paper portfolio
//! - `config`: Show the effective configuration

mod portfolio;
mod watch;

pub use portfolio::{PortfolioArgs, PortfolioCommand};
pub use watch::WatchArgs;

use clap::{Parser, Subcommand};
use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Parser, Debug)]
#[command(name = "marketx")]
#[command(about = "Realtime KRW crypto price board with a paper portfolio")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream live prices
    Watch(WatchArgs),
    /// Show or edit the paper portfolio
    Portfolio(PortfolioArgs),
    /// Show effective configuration
    Config,
}

/// Whole-won amount with thousands separators, e.g. `₩ 1,234,567`
pub fn format_krw(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("₩ -{}", grouped)
    } else {
        format!("₩ {}", grouped)
    }
}

/// Signed percentage with two decimals, e.g. `+1.25%`
pub fn format_pct(pct: Decimal) -> String {
    let rounded = pct.round_dp(2);
    if rounded >= Decimal::ZERO {
        format!("+{:.2}%", rounded)
    } else {
        format!("{:.2}%", rounded)
    }
}
