//! Prometheus metrics

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_INSTALLED: OnceLock<()> = OnceLock::new();

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Tick accepted from the stream
    StreamTick,
    /// Tick accepted from a snapshot poll
    PollTick,
    /// Feed frame that failed to parse
    ParseFailure,
    /// Tick dropped because its source generation was torn down
    StaleTick,
    /// WebSocket reconnection attempt
    Reconnects,
    /// Successful snapshot poll
    PollSuccess,
    /// Failed snapshot poll
    PollFailure,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Snapshot request round trip
    PollRequest,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Cash balance
    Cash,
    /// Market value of all holdings
    HoldingsValue,
    /// Unrealized P&L across holdings
    UnrealizedPnl,
    /// Number of open positions
    OpenPositions,
}

/// Install the Prometheus recorder with an HTTP listener on `port`
///
/// Safe to call more than once; only the first call installs.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    if METRICS_INSTALLED.get().is_some() {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    let _ = METRICS_INSTALLED.set(());
    describe_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("marketx_ticks_total", "Ticks accepted by source");
    describe_counter!(
        "marketx_parse_failures_total",
        "Feed frames dropped as malformed"
    );
    describe_counter!(
        "marketx_stale_ticks_total",
        "Ticks dropped after their source was torn down"
    );
    describe_counter!("marketx_reconnects_total", "WebSocket reconnection attempts");
    describe_counter!("marketx_polls_total", "Snapshot polls by outcome");
    describe_histogram!("marketx_poll_latency_ms", "Snapshot request latency");
    describe_gauge!("marketx_cash_krw", "Cash balance");
    describe_gauge!("marketx_holdings_value_krw", "Market value of holdings");
    describe_gauge!("marketx_unrealized_pnl_krw", "Unrealized P&L");
    describe_gauge!("marketx_open_positions", "Open positions");
}

/// Increment a counter by one
pub fn increment_counter(metric: CounterMetric) {
    match metric {
        CounterMetric::StreamTick => counter!("marketx_ticks_total", "source" => "stream").increment(1),
        CounterMetric::PollTick => counter!("marketx_ticks_total", "source" => "poll").increment(1),
        CounterMetric::ParseFailure => counter!("marketx_parse_failures_total").increment(1),
        CounterMetric::StaleTick => counter!("marketx_stale_ticks_total").increment(1),
        CounterMetric::Reconnects => counter!("marketx_reconnects_total").increment(1),
        CounterMetric::PollSuccess => counter!("marketx_polls_total", "outcome" => "ok").increment(1),
        CounterMetric::PollFailure => {
            counter!("marketx_polls_total", "outcome" => "error").increment(1)
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let value_ms = duration.as_secs_f64() * 1000.0;
    match metric {
        LatencyMetric::PollRequest => histogram!("marketx_poll_latency_ms").record(value_ms),
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::Cash => "marketx_cash_krw",
        GaugeMetric::HoldingsValue => "marketx_holdings_value_krw",
        GaugeMetric::UnrealizedPnl => "marketx_unrealized_pnl_krw",
        GaugeMetric::OpenPositions => "marketx_open_positions",
    };

    gauge!(metric_name).set(value);
}
