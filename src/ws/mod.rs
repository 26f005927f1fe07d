//! WebSocket transport
//!
//! Subscription-based streaming client that re-sends its subscription frame
//! after every reconnect and stops only on cancellation.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
