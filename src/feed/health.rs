//! Feed staleness tracking

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Health monitor shared between the dispatcher and the poller
pub type SharedHealth = Arc<Mutex<FeedHealthMonitor>>;

/// Tracks when the last tick was accepted
///
/// A feed that has never produced a tick counts as quiet.
#[derive(Debug, Default, Clone)]
pub struct FeedHealthMonitor {
    last_tick: Option<Instant>,
}

impl FeedHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a monitor wrapped for sharing across tasks
    pub fn shared() -> SharedHealth {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Stamp the current time as last seen
    pub fn record_tick(&mut self) {
        self.record_tick_at(Instant::now());
    }

    pub fn record_tick_at(&mut self, at: Instant) {
        self.last_tick = Some(at);
    }

    /// True if no tick has arrived within `threshold`
    pub fn is_quiet(&self, threshold: Duration) -> bool {
        self.is_quiet_at(threshold, Instant::now())
    }

    pub fn is_quiet_at(&self, threshold: Duration, now: Instant) -> bool {
        match self.last_tick {
            Some(last) => now.saturating_duration_since(last) > threshold,
            None => true,
        }
    }

    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }

    /// Forget the last tick; the feed reads as quiet again
    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}
