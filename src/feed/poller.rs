//! Periodic snapshot polling used when the stream is quiet or disabled

use super::health::SharedHealth;
use super::types::PriceTick;
use super::SnapshotSource;
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// When the poller issues requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Only while the feed has been quiet beyond the threshold
    Fallback,
    /// Every interval (streaming disabled)
    Always,
}

/// Interval-driven snapshot poller
///
/// Requests are awaited inside the loop and missed interval ticks are
/// skipped, so at most one request is in flight at a time.
pub struct PollingFallback {
    source: Arc<dyn SnapshotSource>,
    health: SharedHealth,
    interval: Duration,
    quiet_threshold: Duration,
}

impl PollingFallback {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        health: SharedHealth,
        interval: Duration,
        quiet_threshold: Duration,
    ) -> Self {
        Self {
            source,
            health,
            interval,
            quiet_threshold,
        }
    }

    /// Whether the next interval should issue a request
    pub fn should_poll(&self, mode: PollMode) -> bool {
        match mode {
            PollMode::Always => true,
            PollMode::Fallback => self.health.lock().is_quiet(self.quiet_threshold),
        }
    }

    /// Issue one batched request; failures are logged and yield no ticks
    pub async fn poll_once(&self, markets: &[String]) -> Vec<PriceTick> {
        let started = Instant::now();
        let result = self.source.fetch_snapshot(markets).await;
        record_latency(LatencyMetric::PollRequest, started.elapsed());

        match result {
            Ok(ticks) => {
                increment_counter(CounterMetric::PollSuccess);
                tracing::debug!(count = ticks.len(), "Snapshot poll succeeded");
                ticks
            }
            Err(e) => {
                increment_counter(CounterMetric::PollFailure);
                tracing::warn!(error = %e, "Snapshot poll failed, retrying next interval");
                Vec::new()
            }
        }
    }

    /// Run until cancelled or the tick receiver goes away
    pub async fn run(
        self,
        markets: Vec<String>,
        mode: PollMode,
        tick_tx: mpsc::Sender<PriceTick>,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(?mode, interval_ms = self.interval.as_millis() as u64, "Polling started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.should_poll(mode) {
                continue;
            }

            let ticks = tokio::select! {
                _ = cancel.cancelled() => break,
                ticks = self.poll_once(&markets) => ticks,
            };

            for tick in ticks {
                if tick_tx.send(tick).await.is_err() {
                    tracing::debug!("Tick receiver dropped, stopping poller");
                    return;
                }
            }
        }

        tracing::debug!("Polling stopped");
    }
}
