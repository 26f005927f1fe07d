//! Price feed module
//!
//! Streaming ticker subscription, REST polling fallback, feed health, and the
//! coordinator that merges both sources into the market board.

mod coordinator;
mod health;
mod poller;
mod rest;
mod types;
mod upbit;

pub use coordinator::{round_price, FeedSettings, PriceFeedCoordinator, PriceHandler};
pub use health::{FeedHealthMonitor, SharedHealth};
pub use poller::{PollMode, PollingFallback};
pub use rest::{UpbitRestClient, UPBIT_API_URL};
pub use types::{
    asset_id_from_code, market_code, FeedError, PriceTick, TickParseError, TickSource,
};
pub use upbit::{UpbitFeed, UPBIT_WS_URL};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Trait for streaming price feed implementations
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Subscribe to price updates for the given market codes
    ///
    /// The feed keeps itself connected until `cancel` fires.
    async fn subscribe(
        &self,
        markets: &[String],
        cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<PriceTick>>;
}

/// Trait for request/response price snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the latest price for each of the given market codes
    async fn fetch_snapshot(&self, markets: &[String]) -> anyhow::Result<Vec<PriceTick>>;
}
