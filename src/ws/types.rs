//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Text frame sent right after every successful connect
    pub subscribe_message: Option<String>,
    /// Maximum consecutive failed attempts before giving up (0 = infinite)
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnection attempt
    pub initial_reconnect_delay: Duration,
    /// Cap for the doubling reconnect delay; equal to the initial delay for a fixed interval
    pub max_reconnect_delay: Duration,
    /// Interval for sending ping frames
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            subscribe_message: None,
            max_reconnect_attempts: 0,
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(1),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the frame sent after each connect
    pub fn subscribe_with(mut self, message: impl Into<String>) -> Self {
        self.subscribe_message = Some(message.into());
        self
    }

    /// Set maximum reconnection attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set initial reconnection delay
    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.initial_reconnect_delay = d;
        self
    }

    /// Set maximum reconnection delay
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_reconnect_delay = d;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Delay to wait after `attempt` consecutive failures (1-based)
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let max = self.max_reconnect_delay.max(self.initial_reconnect_delay);
        let mut delay = self.initial_reconnect_delay;
        for _ in 1..attempt {
            delay = delay.saturating_mul(2);
            if delay >= max {
                return max;
            }
        }
        delay.min(max)
    }
}

/// WebSocket message types
#[derive(Debug, Clone)]
pub enum WsMessage {
    /// Text message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
    /// Connection established and subscription sent
    Connected,
    /// Client stopped for good
    Disconnected,
    /// Reconnecting after failure or close
    Reconnecting { attempt: u32 },
}

/// WebSocket errors
#[derive(Debug, Clone, Error)]
pub enum WsError {
    /// Connection failed or dropped
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Server sent a close frame
    #[error("Connection closed by server")]
    ClosedByServer,
    /// Maximum reconnection attempts exceeded
    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}
