//! Fixed-capacity rolling price history

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples retained per asset
pub const DEFAULT_CAPACITY: usize = 40;

/// A single retained price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonically increasing sequence index
    pub index: u64,
    /// Observed price
    pub value: Decimal,
}

/// Rolling window of the most recent samples for one asset
///
/// Appending beyond capacity evicts the oldest sample. The percent change is
/// always measured from the oldest retained sample to the newest, so it means
/// "change since the start of the window" rather than a fixed calendar span.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl TimeSeriesBuffer {
    /// Create an empty buffer holding at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting the oldest sample when full
    pub fn push(&mut self, value: Decimal) -> Sample {
        let index = self.samples.back().map_or(0, |s| s.index) + 1;
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }

        let sample = Sample { index, value };
        self.samples.push_back(sample);
        sample
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Oldest retained sample
    pub fn first(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Percent change from the oldest to the newest retained sample
    ///
    /// Returns zero when fewer than two samples are held or the oldest value is zero.
    pub fn change_pct(&self) -> Decimal {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) if self.samples.len() >= 2 => {
                pct_change(first.value, last.value)
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate samples oldest first
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Copy the window out, oldest first
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Percent change from `from` to `to`
///
/// Zero when `from` is zero. Results beyond the `Decimal` range saturate.
pub fn pct_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    let diff = to.saturating_sub(from);
    diff.checked_div(from)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or_else(|| {
            if diff.is_sign_negative() != from.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            }
        })
}

impl Default for TimeSeriesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
