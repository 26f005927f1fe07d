//! Watch command implementation

use super::{format_krw, format_pct};
use crate::config::Config;
use crate::feed::{FeedSettings, PriceFeedCoordinator, UpbitFeed, UpbitRestClient};
use crate::market::{AssetView, BoardSort, MarketBoard};
use crate::portfolio::PortfolioStore;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll the REST endpoint only, without the WebSocket stream
    #[arg(long)]
    pub no_stream: bool,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Filter the final board by name or symbol
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Order of the final board
    #[arg(short, long, value_enum, default_value_t = BoardSort::Popular)]
    pub sort: BoardSort,

    /// Only print the final board
    #[arg(long)]
    pub quiet: bool,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut settings = FeedSettings::from_config(config);
        if self.no_stream {
            settings.streaming_enabled = false;
        }

        let stream = Arc::new(UpbitFeed::from_config(&config.feed.stream));
        let snapshots = Arc::new(UpbitRestClient::with_config(&config.feed.polling)?);
        let store = PortfolioStore::open(
            &config.portfolio.store_path,
            config.portfolio.initial_cash,
        );

        let assets = config.feed.assets.clone();
        let mut coordinator = PriceFeedCoordinator::new(settings, stream, snapshots);
        coordinator.seed_prices(store.last_live_prices(&assets));

        let quiet = self.quiet;
        coordinator.start(&assets, move |_: &str, view: &AssetView| {
            if !quiet {
                println!("{}", render_update(view));
            }
        })?;

        tracing::info!(
            assets = assets.len(),
            duration_secs = ?self.duration,
            "Watching prices, press Ctrl-C to stop"
        );
        wait_for_exit(self.duration).await;
        coordinator.stop().await;

        let board = coordinator.board();
        println!();
        for view in board.list(&self.query, self.sort) {
            println!("{}", render_row(&view));
        }

        persist_last_prices(&board, &store);
        Ok(())
    }
}

async fn wait_for_exit(duration: Option<u64>) {
    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            }
        }
        _ = deadline => {}
    }
}

fn persist_last_prices(board: &MarketBoard, store: &PortfolioStore) {
    for view in board.views() {
        let Some(price) = view.price else {
            continue;
        };
        if let Err(e) = store.save_last_live(&view.id, price) {
            tracing::warn!(asset = %view.id, error = %e, "Failed to save last price");
        }
    }
}

/// One line per accepted tick
fn render_update(view: &AssetView) -> String {
    let arrow = if view.ticked_up() { "▲" } else { "▼" };
    format!(
        "{} {:<6} {:>18} {:>9}",
        arrow,
        view.id,
        view.price.map(format_krw).unwrap_or_else(|| "-".to_string()),
        format_pct(view.change_pct)
    )
}

/// Board row shown after the run
fn render_row(view: &AssetView) -> String {
    let star = if view.starred { "★" } else { " " };
    format!(
        "{} {:<6} {:<8} {:>18} {:>9} {:>3} samples",
        star,
        view.id,
        view.name,
        view.price.map(format_krw).unwrap_or_else(|| "-".to_string()),
        format_pct(view.change_pct),
        view.samples.len()
    )
}
