//! Price feed coordinator
//!
//! Owns the lifecycle of the streaming and polling sources and is the single
//! writer of the market board. Every source generation (the set of tasks
//! started by `start` or `set_enabled`) stamps its ticks with an epoch; the
//! dispatcher drops ticks whose epoch is no longer current, so a connection
//! that has been torn down cannot deliver late updates.

use super::health::{FeedHealthMonitor, SharedHealth};
use super::poller::{PollMode, PollingFallback};
use super::types::{market_code, FeedError, PriceTick, TickSource};
use super::{PriceFeed, SnapshotSource};
use crate::config::Config;
use crate::market::{default_catalog, AssetInfo, AssetView, MarketBoard, DEFAULT_CAPACITY};
use crate::telemetry::{increment_counter, CounterMetric};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INBOUND_CAPACITY: usize = 4096;

/// Consumer callback for accepted price updates
pub trait PriceHandler: Send + Sync + 'static {
    fn on_price(&self, asset_id: &str, view: &AssetView);
}

impl<F> PriceHandler for F
where
    F: Fn(&str, &AssetView) + Send + Sync + 'static,
{
    fn on_price(&self, asset_id: &str, view: &AssetView) {
        self(asset_id, view)
    }
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Market prefix for exchange codes (e.g., "KRW")
    pub quote_currency: String,
    /// Start with the stream enabled
    pub streaming_enabled: bool,
    /// Allow REST polling (fallback when streaming, primary when not)
    pub polling_enabled: bool,
    /// Samples retained per asset
    pub buffer_capacity: usize,
    /// Decimal places prices are rounded to before they enter the board
    pub price_decimals: u32,
    pub poll_interval: Duration,
    pub quiet_threshold: Duration,
    /// Display names and starred defaults
    pub catalog: Vec<AssetInfo>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            quote_currency: "KRW".to_string(),
            streaming_enabled: true,
            polling_enabled: true,
            buffer_capacity: DEFAULT_CAPACITY,
            price_decimals: 0,
            poll_interval: Duration::from_millis(1000),
            quiet_threshold: Duration::from_millis(1500),
            catalog: default_catalog(),
        }
    }
}

impl FeedSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quote_currency: config.feed.quote_currency.clone(),
            streaming_enabled: config.feed.streaming_enabled,
            polling_enabled: config.feed.polling_enabled,
            buffer_capacity: config.feed.buffer_capacity,
            price_decimals: config.feed.price_decimals,
            poll_interval: Duration::from_millis(config.feed.polling.interval_ms),
            quiet_threshold: Duration::from_millis(config.feed.polling.quiet_threshold_ms),
            catalog: config.catalog.clone(),
        }
    }
}

/// A tick tagged with the source generation that produced it
#[derive(Debug)]
struct SourcedTick {
    epoch: u64,
    tick: PriceTick,
}

/// State touched by the dispatcher
struct DispatchState {
    board: MarketBoard,
    health: SharedHealth,
    epoch: AtomicU64,
    alive: AtomicBool,
    price_decimals: u32,
}

impl DispatchState {
    /// Fold one tick into the board and notify the handler
    ///
    /// Returns whether the handler was invoked.
    fn apply(&self, sourced: SourcedTick, handler: &dyn PriceHandler) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        if sourced.epoch != self.epoch.load(Ordering::SeqCst) {
            increment_counter(CounterMetric::StaleTick);
            tracing::debug!(
                asset = %sourced.tick.asset_id,
                epoch = sourced.epoch,
                "Dropping tick from torn-down source"
            );
            return false;
        }

        let tick = sourced.tick;
        let price = round_price(tick.price, self.price_decimals);
        if price <= Decimal::ZERO {
            tracing::debug!(asset = %tick.asset_id, %price, "Dropping non-positive price");
            return false;
        }

        let Some(view) = self
            .board
            .apply(&tick.asset_id, price, tick.volume_24h, tick.timestamp)
        else {
            tracing::trace!(asset = %tick.asset_id, "Ignoring tick for untracked asset");
            return false;
        };

        self.health.lock().record_tick();
        tracing::trace!(asset = %tick.asset_id, %price, source = tick.source.as_str(), "Tick applied");
        increment_counter(match tick.source {
            TickSource::Stream => CounterMetric::StreamTick,
            TickSource::Poll => CounterMetric::PollTick,
        });

        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        handler.on_price(&tick.asset_id, &view);
        true
    }
}

/// Handles owned while the coordinator is running
struct Running {
    cancel: CancellationToken,
    generation: CancellationToken,
    inbound: mpsc::Sender<SourcedTick>,
    markets: Vec<String>,
    dispatcher: JoinHandle<()>,
}

/// Merges streaming and polled ticks into the market board
///
/// Must be started from within a Tokio runtime.
pub struct PriceFeedCoordinator {
    settings: FeedSettings,
    stream: Arc<dyn PriceFeed>,
    snapshots: Arc<dyn SnapshotSource>,
    state: Arc<DispatchState>,
    streaming: bool,
    seeds: HashMap<String, Decimal>,
    running: Option<Running>,
}

impl PriceFeedCoordinator {
    pub fn new(
        settings: FeedSettings,
        stream: Arc<dyn PriceFeed>,
        snapshots: Arc<dyn SnapshotSource>,
    ) -> Self {
        let state = Arc::new(DispatchState {
            board: MarketBoard::new(),
            health: FeedHealthMonitor::shared(),
            epoch: AtomicU64::new(0),
            alive: AtomicBool::new(false),
            price_decimals: settings.price_decimals,
        });

        Self {
            streaming: settings.streaming_enabled,
            settings,
            stream,
            snapshots,
            state,
            seeds: HashMap::new(),
            running: None,
        }
    }

    /// Prices placed in the board at the next `start`, without notifying the handler
    pub fn seed_prices(&mut self, seeds: HashMap<String, Decimal>) {
        self.seeds = seeds;
    }

    /// Create the board for `asset_ids` and start delivering ticks to `handler`
    pub fn start(
        &mut self,
        asset_ids: &[String],
        handler: impl PriceHandler,
    ) -> Result<(), FeedError> {
        if self.running.is_some() {
            return Err(FeedError::AlreadyRunning);
        }
        validate_asset_ids(asset_ids)?;
        if !self.streaming && !self.settings.polling_enabled {
            return Err(FeedError::NoSourceAvailable);
        }

        let state = &self.state;
        state
            .board
            .reset(asset_ids, &self.settings.catalog, self.settings.buffer_capacity);
        let seeded_at = chrono::Utc::now();
        for (id, price) in &self.seeds {
            let price = round_price(*price, state.price_decimals);
            if price > Decimal::ZERO {
                state.board.apply(id, price, None, seeded_at);
            }
        }
        state.health.lock().reset();
        state.alive.store(true, Ordering::SeqCst);

        let (inbound, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        let dispatcher = tokio::spawn(dispatch(
            inbound_rx,
            state.clone(),
            Arc::new(handler),
            cancel.clone(),
        ));

        let markets = asset_ids
            .iter()
            .map(|id| market_code(&self.settings.quote_currency, id))
            .collect();

        self.running = Some(Running {
            generation: cancel.child_token(),
            cancel,
            inbound,
            markets,
            dispatcher,
        });
        self.spawn_sources();

        tracing::info!(
            assets = asset_ids.len(),
            streaming = self.streaming,
            polling = self.settings.polling_enabled,
            "Price feed started"
        );
        Ok(())
    }

    /// Switch between streaming (with polling fallback) and polling only
    ///
    /// The previous source generation is cancelled before the next starts;
    /// any of its ticks still queued are discarded by epoch.
    pub fn set_enabled(&mut self, streaming: bool) -> Result<(), FeedError> {
        if !streaming && !self.settings.polling_enabled {
            return Err(FeedError::NoSourceAvailable);
        }
        if streaming == self.streaming {
            return Ok(());
        }

        self.streaming = streaming;
        if self.running.is_some() {
            tracing::info!(streaming, "Switching price source");
            self.spawn_sources();
        }
        Ok(())
    }

    /// Tear down all sources; no handler call happens after this returns
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        self.state.alive.store(false, Ordering::SeqCst);
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
        running.cancel.cancel();

        if let Err(e) = running.dispatcher.await {
            tracing::warn!(error = %e, "Dispatcher task ended abnormally");
        }
        tracing::info!("Price feed stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn streaming_enabled(&self) -> bool {
        self.streaming
    }

    /// Shared handle to the asset records
    pub fn board(&self) -> MarketBoard {
        self.state.board.clone()
    }

    pub fn health(&self) -> SharedHealth {
        self.state.health.clone()
    }

    /// Start a new source generation, cancelling the current one
    fn spawn_sources(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        running.generation.cancel();
        let generation = running.cancel.child_token();
        running.generation = generation.clone();
        let epoch = self.state.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        if self.streaming {
            let stream = self.stream.clone();
            let markets = running.markets.clone();
            let inbound = running.inbound.clone();
            let token = generation.clone();
            tokio::spawn(async move {
                match stream.subscribe(&markets, token.clone()).await {
                    Ok(rx) => forward(rx, epoch, inbound, token).await,
                    Err(e) => tracing::error!(error = %e, "Stream subscription failed"),
                }
            });
        }

        if self.settings.polling_enabled {
            let mode = if self.streaming {
                PollMode::Fallback
            } else {
                PollMode::Always
            };
            let poller = PollingFallback::new(
                self.snapshots.clone(),
                self.state.health.clone(),
                self.settings.poll_interval,
                self.settings.quiet_threshold,
            );
            let (poll_tx, poll_rx) = mpsc::channel(256);
            tokio::spawn(poller.run(running.markets.clone(), mode, poll_tx, generation.clone()));
            tokio::spawn(forward(poll_rx, epoch, running.inbound.clone(), generation));
        }
    }
}

impl Drop for PriceFeedCoordinator {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            self.state.alive.store(false, Ordering::SeqCst);
            running.cancel.cancel();
        }
    }
}

/// Round half away from zero to the board's precision
pub fn round_price(price: Decimal, decimals: u32) -> Decimal {
    price.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Asset ids must be non-empty, unique, and uppercase alphanumeric
fn validate_asset_ids(asset_ids: &[String]) -> Result<(), FeedError> {
    if asset_ids.is_empty() {
        return Err(FeedError::EmptyAssetList);
    }

    let mut seen = HashSet::new();
    for id in asset_ids {
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(FeedError::InvalidAssetId(id.clone()));
        }
        if !seen.insert(id.as_str()) {
            return Err(FeedError::DuplicateAssetId(id.clone()));
        }
    }
    Ok(())
}

/// Tag a generation's ticks with its epoch and push them to the dispatcher
async fn forward(
    mut rx: mpsc::Receiver<PriceTick>,
    epoch: u64,
    inbound: mpsc::Sender<SourcedTick>,
    cancel: CancellationToken,
) {
    loop {
        let tick = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            tick = rx.recv() => match tick {
                Some(tick) => tick,
                None => break,
            },
        };

        if inbound.send(SourcedTick { epoch, tick }).await.is_err() {
            break;
        }
    }
}

/// Single consumer of the inbound channel
async fn dispatch(
    mut rx: mpsc::Receiver<SourcedTick>,
    state: Arc<DispatchState>,
    handler: Arc<dyn PriceHandler>,
    cancel: CancellationToken,
) {
    loop {
        let sourced = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(sourced) => sourced,
                None => break,
            },
        };

        state.apply(sourced, handler.as_ref());
    }
    tracing::debug!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{sleep, timeout};

    /// Stream whose ticks are pushed by the test
    #[derive(Default)]
    struct ChannelFeed {
        senders: Mutex<Vec<mpsc::Sender<PriceTick>>>,
        tokens: Mutex<Vec<CancellationToken>>,
        markets: Mutex<Vec<String>>,
    }

    impl ChannelFeed {
        fn sender(&self, i: usize) -> mpsc::Sender<PriceTick> {
            self.senders.lock()[i].clone()
        }

        fn subscriptions(&self) -> usize {
            self.senders.lock().len()
        }

        async fn wait_for_subscriptions(&self, n: usize) {
            while self.subscriptions() < n {
                sleep(Duration::from_millis(1)).await;
            }
        }
    }

    #[async_trait]
    impl PriceFeed for ChannelFeed {
        async fn subscribe(
            &self,
            markets: &[String],
            cancel: CancellationToken,
        ) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
            let (tx, rx) = mpsc::channel(64);
            self.senders.lock().push(tx);
            self.tokens.lock().push(cancel);
            *self.markets.lock() = markets.to_vec();
            Ok(rx)
        }
    }

    /// Snapshot source answering with fixed prices
    #[derive(Default)]
    struct FixedSnapshot {
        prices: Mutex<HashMap<String, Decimal>>,
        calls: AtomicUsize,
    }

    impl FixedSnapshot {
        fn with_prices(prices: &[(&str, Decimal)]) -> Self {
            let snapshot = Self::default();
            for (id, price) in prices {
                snapshot.prices.lock().insert(id.to_string(), *price);
            }
            snapshot
        }
    }

    #[async_trait]
    impl SnapshotSource for FixedSnapshot {
        async fn fetch_snapshot(&self, markets: &[String]) -> anyhow::Result<Vec<PriceTick>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prices = self.prices.lock();
            Ok(markets
                .iter()
                .filter_map(|code| {
                    let id = crate::feed::asset_id_from_code(code)?;
                    let price = prices.get(id)?;
                    Some(PriceTick::new(id, *price, TickSource::Poll))
                })
                .collect())
        }
    }

    type Updates = UnboundedReceiver<(String, AssetView)>;

    fn recorder() -> (impl PriceHandler, Updates) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |id: &str, view: &AssetView| {
            let _ = tx.send((id.to_string(), view.clone()));
        };
        (handler, rx)
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn stream_tick(id: &str, price: Decimal) -> PriceTick {
        PriceTick::new(id, price, TickSource::Stream)
    }

    fn coordinator(
        settings: FeedSettings,
        feed: Arc<ChannelFeed>,
        snapshots: Arc<FixedSnapshot>,
    ) -> PriceFeedCoordinator {
        PriceFeedCoordinator::new(settings, feed, snapshots)
    }

    fn stream_only() -> FeedSettings {
        FeedSettings {
            polling_enabled: false,
            ..Default::default()
        }
    }

    async fn next_update(rx: &mut Updates) -> (String, AssetView) {
        timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("handler dropped")
    }

    #[test]
    fn test_validate_asset_ids() {
        assert_eq!(validate_asset_ids(&[]), Err(FeedError::EmptyAssetList));
        assert_eq!(
            validate_asset_ids(&ids(&["BTC", ""])),
            Err(FeedError::InvalidAssetId(String::new()))
        );
        assert_eq!(
            validate_asset_ids(&ids(&["KRW-BTC"])),
            Err(FeedError::InvalidAssetId("KRW-BTC".to_string()))
        );
        assert_eq!(
            validate_asset_ids(&ids(&["BTC", "ETH", "BTC"])),
            Err(FeedError::DuplicateAssetId("BTC".to_string()))
        );
        assert_eq!(
            validate_asset_ids(&ids(&["btc"])),
            Err(FeedError::InvalidAssetId("btc".to_string()))
        );
        assert!(validate_asset_ids(&ids(&["BTC", "ETH", "1INCH"])).is_ok());
    }

    #[test]
    fn test_stale_epoch_is_dropped() {
        let state = DispatchState {
            board: MarketBoard::new(),
            health: FeedHealthMonitor::shared(),
            epoch: AtomicU64::new(2),
            alive: AtomicBool::new(true),
            price_decimals: 0,
        };
        state.board.reset(&ids(&["BTC"]), &default_catalog(), 40);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = move |_: &str, _: &AssetView| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        let late = SourcedTick {
            epoch: 1,
            tick: stream_tick("BTC", dec!(999)),
        };
        assert!(!state.apply(late, &handler));
        assert!(state.board.get("BTC").unwrap().price.is_none());

        let current = SourcedTick {
            epoch: 2,
            tick: stream_tick("BTC", dec!(100)),
        };
        assert!(state.apply(current, &handler));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        state.alive.store(false, Ordering::SeqCst);
        let after_stop = SourcedTick {
            epoch: 2,
            tick: stream_tick("BTC", dec!(101)),
        };
        assert!(!state.apply(after_stop, &handler));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_errors() {
        let feed = Arc::new(ChannelFeed::default());
        let snapshots = Arc::new(FixedSnapshot::default());

        let mut coord = coordinator(FeedSettings::default(), feed.clone(), snapshots.clone());
        let (handler, _rx) = recorder();
        assert_eq!(coord.start(&[], handler), Err(FeedError::EmptyAssetList));

        let mut coord = coordinator(
            FeedSettings {
                streaming_enabled: false,
                polling_enabled: false,
                ..Default::default()
            },
            feed.clone(),
            snapshots.clone(),
        );
        let (handler, _rx) = recorder();
        assert_eq!(
            coord.start(&ids(&["BTC"]), handler),
            Err(FeedError::NoSourceAvailable)
        );

        let mut coord = coordinator(stream_only(), feed, snapshots);
        let (handler, _rx) = recorder();
        coord.start(&ids(&["BTC"]), handler).unwrap();
        let (handler, _rx2) = recorder();
        assert_eq!(
            coord.start(&ids(&["BTC"]), handler),
            Err(FeedError::AlreadyRunning)
        );
        coord.stop().await;
    }

    #[tokio::test]
    async fn test_ticks_update_board_in_order() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(stream_only(), feed.clone(), Arc::default());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC", "ETH"]), handler).unwrap();

        feed.wait_for_subscriptions(1).await;
        assert_eq!(*feed.markets.lock(), ids(&["KRW-BTC", "KRW-ETH"]));

        let tx = feed.sender(0);
        tx.send(stream_tick("BTC", dec!(50000))).await.unwrap();
        tx.send(stream_tick("BTC", dec!(51000))).await.unwrap();

        let (id, view) = next_update(&mut rx).await;
        assert_eq!(id, "BTC");
        assert_eq!(view.price, Some(dec!(50000)));

        let (id, view) = next_update(&mut rx).await;
        assert_eq!(id, "BTC");
        assert_eq!(view.price, Some(dec!(51000)));
        assert_eq!(view.previous_price, Some(dec!(50000)));
        assert_eq!(view.samples.len(), 2);
        assert_eq!(view.change_pct, dec!(2));

        assert_eq!(coord.board().get("BTC").unwrap().price, Some(dec!(51000)));
        assert!(!coord.health().lock().is_quiet(Duration::from_millis(1500)));

        coord.stop().await;
    }

    #[tokio::test]
    async fn test_extreme_price_jump_keeps_dispatching() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(stream_only(), feed.clone(), Arc::default());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC"]), handler).unwrap();
        feed.wait_for_subscriptions(1).await;

        let tx = feed.sender(0);
        let huge = Decimal::try_from(1e27f64).unwrap();
        tx.send(stream_tick("BTC", dec!(1))).await.unwrap();
        tx.send(stream_tick("BTC", huge)).await.unwrap();
        tx.send(stream_tick("BTC", dec!(2))).await.unwrap();

        next_update(&mut rx).await;
        let (_, view) = next_update(&mut rx).await;
        assert_eq!(view.price, Some(huge));
        assert_eq!(view.change_pct, Decimal::MAX);

        let (_, view) = next_update(&mut rx).await;
        assert_eq!(view.price, Some(dec!(2)));
        assert_eq!(view.change_pct, dec!(100));

        coord.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_assets_are_ignored() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(stream_only(), feed.clone(), Arc::default());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC"]), handler).unwrap();
        feed.wait_for_subscriptions(1).await;

        let tx = feed.sender(0);
        tx.send(stream_tick("LTC", dec!(1))).await.unwrap();
        tx.send(stream_tick("BTC", dec!(2))).await.unwrap();

        let (id, _) = next_update(&mut rx).await;
        assert_eq!(id, "BTC");
        assert!(coord.board().get("LTC").is_none());

        coord.stop().await;
    }

    #[tokio::test]
    async fn test_prices_are_rounded() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(stream_only(), feed.clone(), Arc::default());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["XRP"]), handler).unwrap();
        feed.wait_for_subscriptions(1).await;

        let tx = feed.sender(0);
        tx.send(stream_tick("XRP", dec!(0.4))).await.unwrap();
        tx.send(stream_tick("XRP", dec!(812.6))).await.unwrap();

        // 0.4 rounds to zero and is dropped
        let (_, view) = next_update(&mut rx).await;
        assert_eq!(view.price, Some(dec!(813)));
        assert_eq!(view.samples.len(), 1);
        assert_eq!(round_price(dec!(812.5), 0), dec!(813));
        assert_eq!(round_price(dec!(0.125), 2), dec!(0.13));

        coord.stop().await;
    }

    #[tokio::test]
    async fn test_seeded_prices_skip_handler() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(stream_only(), feed.clone(), Arc::default());
        coord.seed_prices(HashMap::from([
            ("BTC".to_string(), dec!(150000000)),
            ("LTC".to_string(), dec!(1)),
        ]));
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC"]), handler).unwrap();

        let board = coord.board();
        assert_eq!(board.get("BTC").unwrap().price, Some(dec!(150000000)));
        assert!(board.get("LTC").is_none());

        coord.stop().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_no_callbacks_after_stop() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(stream_only(), feed.clone(), Arc::default());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC"]), handler).unwrap();
        feed.wait_for_subscriptions(1).await;

        let tx = feed.sender(0);
        coord.stop().await;
        assert!(!coord.is_running());
        assert!(feed.tokens.lock()[0].is_cancelled());

        let _ = tx.send(stream_tick("BTC", dec!(1))).await;
        // Handler was dropped with the dispatcher and never called
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_to_polling_ignores_late_stream_ticks() {
        let feed = Arc::new(ChannelFeed::default());
        let snapshots = Arc::new(FixedSnapshot::with_prices(&[("ETH", dec!(200))]));
        let mut coord = coordinator(FeedSettings::default(), feed.clone(), snapshots.clone());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC", "ETH"]), handler).unwrap();
        feed.wait_for_subscriptions(1).await;

        let old_stream = feed.sender(0);
        old_stream.send(stream_tick("BTC", dec!(100))).await.unwrap();
        let (id, _) = next_update(&mut rx).await;
        assert_eq!(id, "BTC");

        coord.set_enabled(false).unwrap();
        assert!(!coord.streaming_enabled());
        assert!(feed.tokens.lock()[0].is_cancelled());

        // A frame from the torn-down connection arrives late
        let _ = old_stream.send(stream_tick("BTC", dec!(999))).await;

        // Next delivery comes from the polling-only generation
        let (id, view) = next_update(&mut rx).await;
        assert_eq!(id, "ETH");
        assert_eq!(view.price, Some(dec!(200)));
        assert!(snapshots.calls.load(Ordering::SeqCst) >= 1);

        coord.stop().await;
        while let Some((id, view)) = rx.recv().await {
            assert_ne!((id.as_str(), view.price), ("BTC", Some(dec!(999))));
        }
        assert_eq!(coord.board().get("BTC").unwrap().price, Some(dec!(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_back_to_streaming_resubscribes() {
        let feed = Arc::new(ChannelFeed::default());
        let mut coord = coordinator(FeedSettings::default(), feed.clone(), Arc::default());
        let (handler, mut rx) = recorder();
        coord.start(&ids(&["BTC"]), handler).unwrap();
        feed.wait_for_subscriptions(1).await;

        coord.set_enabled(false).unwrap();
        coord.set_enabled(false).unwrap();
        coord.set_enabled(true).unwrap();
        feed.wait_for_subscriptions(2).await;
        assert_eq!(feed.subscriptions(), 2);

        feed.sender(1)
            .send(stream_tick("BTC", dec!(7)))
            .await
            .unwrap();
        let (_, view) = next_update(&mut rx).await;
        assert_eq!(view.price, Some(dec!(7)));

        coord.stop().await;
    }

    #[tokio::test]
    async fn test_set_enabled_requires_a_source() {
        let mut coord = coordinator(stream_only(), Arc::default(), Arc::default());
        assert_eq!(coord.set_enabled(false), Err(FeedError::NoSourceAvailable));
        assert!(coord.streaming_enabled());

        let mut coord = coordinator(FeedSettings::default(), Arc::default(), Arc::default());
        coord.set_enabled(false).unwrap();
        assert!(!coord.streaming_enabled());
        assert!(!coord.is_running());
    }
}
