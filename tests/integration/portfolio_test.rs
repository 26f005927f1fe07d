//! Integration tests for the paper portfolio

use async_trait::async_trait;
use marketx::feed::{FeedSettings, PriceFeed, PriceFeedCoordinator, PriceTick, SnapshotSource};
use marketx::market::{AssetView, PriceLookup};
use marketx::portfolio::{PortfolioStore, PositionPatch, QuickAddPreset};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Stream that stays silent until cancelled
struct SilentFeed;

#[async_trait]
impl PriceFeed for SilentFeed {
    async fn subscribe(
        &self,
        _markets: &[String],
        cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
        });
        Ok(rx)
    }
}

struct NoSnapshots;

#[async_trait]
impl SnapshotSource for NoSnapshots {
    async fn fetch_snapshot(&self, _markets: &[String]) -> anyhow::Result<Vec<PriceTick>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_ledger_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store = PortfolioStore::open(&path, dec!(5000000));
    let mut ledger = store.load();
    assert_eq!(ledger.positions().len(), 1);

    assert!(ledger.quick_add(&QuickAddPreset::ETH));
    assert!(!ledger.quick_add(&QuickAddPreset::ETH));
    ledger
        .update_position(0, PositionPatch::quantity(dec!(0.5)))
        .unwrap();
    ledger.adjust_cash(dec!(500000));
    store.save(&ledger).unwrap();

    let reloaded = PortfolioStore::open(&path, dec!(0)).load();
    assert_eq!(reloaded, ledger);
    assert_eq!(reloaded.cash(), dec!(5500000));
    assert_eq!(reloaded.positions()[0].quantity, dec!(0.5));
}

#[tokio::test]
async fn test_portfolio_valued_from_seeded_board() {
    let dir = tempfile::tempdir().unwrap();
    let store = PortfolioStore::open(dir.path().join("state.json"), dec!(5000000));
    store.save_last_live("BTC", dec!(150000000)).unwrap();

    let ids = vec!["BTC".to_string(), "ETH".to_string()];
    let settings = FeedSettings {
        polling_enabled: false,
        ..Default::default()
    };
    let mut coordinator =
        PriceFeedCoordinator::new(settings, Arc::new(SilentFeed), Arc::new(NoSnapshots));
    coordinator.seed_prices(store.last_live_prices(&ids));
    coordinator
        .start(&ids, |_: &str, _: &AssetView| {})
        .unwrap();

    let board = coordinator.board();
    assert_eq!(board.price_of("BTC"), Some(dec!(150000000)));
    assert_eq!(board.price_of("ETH"), None);

    let mut ledger = store.load();
    ledger.quick_add(&QuickAddPreset::ETH);
    let summary = ledger.summary(&board);

    // BTC 0.3 @ 100M valued at 150M; ETH has no price yet
    assert_eq!(summary.total_cost, dec!(30000000) + dec!(3500000) * dec!(2.8571429));
    assert_eq!(summary.total_value, dec!(45000000));
    assert_eq!(summary.total_equity, dec!(50000000));

    let rows = ledger.valuate(&board);
    assert_eq!(rows[0].pnl_rate, dec!(50));
    assert_eq!(rows[1].price, Decimal::ZERO);

    coordinator.stop().await;
}
