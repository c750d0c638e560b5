//! Synthetic purchase history at one-minute resolution.

use std::collections::VecDeque;

use economy_core::regulator::PurchaseCounts;
use economy_types::MINUTES_PER_DAY;

const WEEK_MINUTES: usize = 7 * 1_440;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const DAY_MINUTES: usize = MINUTES_PER_DAY as usize;

/// Rolling 24h and 7d star purchase totals.
#[derive(Debug, Clone, Default)]
pub struct MinuteHistory {
    buckets: VecDeque<u64>,
    last_24h: u64,
    last_7d: u64,
}

impl MinuteHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close one minute during which `stars` were bought.
    pub fn push_minute(&mut self, stars: u64) {
        self.buckets.push_back(stars);
        self.last_24h = self.last_24h.saturating_add(stars);
        self.last_7d = self.last_7d.saturating_add(stars);

        let len = self.buckets.len();
        if len > DAY_MINUTES {
            let expired = self
                .buckets
                .get(len.saturating_sub(DAY_MINUTES).saturating_sub(1))
                .copied()
                .unwrap_or(0);
            self.last_24h = self.last_24h.saturating_sub(expired);
        }
        if len > WEEK_MINUTES {
            let expired = self.buckets.pop_front().unwrap_or(0);
            self.last_7d = self.last_7d.saturating_sub(expired);
        }
    }

    /// Current trailing totals.
    pub const fn counts(&self) -> PurchaseCounts {
        PurchaseCounts {
            last_24h: self.last_24h,
            last_7d: self.last_7d,
        }
    }
}
