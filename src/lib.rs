//! marketx: realtime KRW crypto price board with a paper portfolio
//!
//! This library provides the core components for:
//! - Live ticker streaming from the Upbit WebSocket with automatic reconnect
//! - REST snapshot polling when the stream is quiet or disabled
//! - A coordinator that merges both sources into per-asset rolling history
//! - A paper portfolio ledger valued against live prices
//! - Key-value persistence for the ledger and last seen prices
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod feed;
pub mod market;
pub mod portfolio;
pub mod telemetry;
pub mod ws;
