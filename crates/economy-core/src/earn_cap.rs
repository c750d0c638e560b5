//! Per-player daily earn ceiling and its season-day reset.
//!
//! ```text
//! decay = progress^1.1
//! cap   = max(early - (early - late) * decay, late)
//! cap   = max(cap * clamp(1.2 - 0.4 * progress, 0.8, 1.2), late * 0.8)
//! ```
//!
//! The second line floors at `late`, and the third re-floors at
//! `late * 0.8`, not `late`. The multiplier bottoms out at 0.8 on the last
//! day, so the ceiling starts at `1.2 * early` and ends at exactly
//! `0.8 * late`. Consumed totals reset when the season-relative day index
//! changes.

use serde::{Deserialize, Serialize};

use economy_types::CalibrationParams;

/// Exponent of the cap decay curve.
const DECAY_EXPONENT: f64 = 1.1;

/// Cap multiplier at season start.
const START_MULTIPLIER: f64 = 1.2;

/// Cap multiplier lost over the full season.
const MULTIPLIER_DECAY: f64 = 0.4;

/// Lowest cap multiplier.
const MIN_MULTIPLIER: f64 = 0.8;

/// Daily earn ceiling at the given season progress.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn daily_earn_cap(params: &CalibrationParams, progress: f64) -> i64 {
    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    let early = params.daily_cap_early as f64;
    let late = params.daily_cap_late as f64;

    let decay = progress.powf(DECAY_EXPONENT);
    let cap = (early - late).mul_add(-decay, early).max(late);

    let multiplier = MULTIPLIER_DECAY
        .mul_add(-progress, START_MULTIPLIER)
        .clamp(MIN_MULTIPLIER, START_MULTIPLIER);
    let cap = (cap * multiplier).max(late * MIN_MULTIPLIER);

    // Bounded by 1.2 * daily_cap_early.
    cap.round() as i64
}

/// Coins a player earned on one season day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEarnTracker {
    /// Season day the total belongs to.
    pub day_index: i64,
    /// Coins earned on that day.
    pub earned: i64,
}

impl DailyEarnTracker {
    /// Reset the total if `day_index` is a different season day.
    pub const fn roll_to(&mut self, day_index: i64) {
        if self.day_index != day_index {
            self.day_index = day_index;
            self.earned = 0;
        }
    }

    /// Coins still available under `cap` today (never negative).
    pub const fn remaining(&self, cap: i64) -> i64 {
        let left = cap.saturating_sub(self.earned);
        if left < 0 { 0 } else { left }
    }

    /// Add a granted amount to today's total.
    pub const fn record(&mut self, amount: i64) {
        self.earned = self.earned.saturating_add(amount);
    }

    /// Give back an amount recorded on `day_index`. No-op once the day has
    /// rolled over.
    pub const fn release(&mut self, day_index: i64, amount: i64) {
        if self.day_index == day_index {
            let left = self.earned.saturating_sub(amount);
            self.earned = if left < 0 { 0 } else { left };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_endpoints() {
        let params = CalibrationParams::default();
        assert_eq!(daily_earn_cap(&params, 0.0), 120);
        assert_eq!(daily_earn_cap(&params, 1.0), 32);
    }

    #[test]
    fn cap_is_non_increasing() {
        for params in [
            CalibrationParams::default(),
            CalibrationParams {
                daily_cap_early: 500,
                daily_cap_late: 500,
                ..CalibrationParams::default()
            },
            CalibrationParams {
                daily_cap_early: 1_000,
                daily_cap_late: 1,
                ..CalibrationParams::default()
            },
        ] {
            let mut last = i64::MAX;
            for step in 0..=1_000 {
                let progress = f64::from(step) / 1_000.0;
                let cap = daily_earn_cap(&params, progress);
                assert!(cap <= last, "cap rose at progress {progress}");
                assert!(cap >= (params.daily_cap_late * 4 + 4) / 5 - 1);
                last = cap;
            }
        }
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let params = CalibrationParams::default();
        assert_eq!(daily_earn_cap(&params, -3.0), daily_earn_cap(&params, 0.0));
        assert_eq!(daily_earn_cap(&params, 7.0), daily_earn_cap(&params, 1.0));
        assert_eq!(daily_earn_cap(&params, f64::NAN), daily_earn_cap(&params, 0.0));
    }

    #[test]
    fn tracker_resets_on_new_season_day() {
        let mut tracker = DailyEarnTracker::default();
        tracker.record(70);
        assert_eq!(tracker.remaining(100), 30);
        tracker.roll_to(0);
        assert_eq!(tracker.earned, 70);
        tracker.roll_to(1);
        assert_eq!(tracker.earned, 0);
        assert_eq!(tracker.remaining(100), 100);
    }

    #[test]
    fn tracker_remaining_never_negative() {
        let tracker = DailyEarnTracker {
            day_index: 3,
            earned: 250,
        };
        assert_eq!(tracker.remaining(100), 0);
    }

    #[test]
    fn release_only_touches_the_recorded_day() {
        let mut tracker = DailyEarnTracker {
            day_index: 2,
            earned: 40,
        };
        tracker.release(1, 30);
        assert_eq!(tracker.earned, 40);
        tracker.release(2, 30);
        assert_eq!(tracker.earned, 10);
        tracker.release(2, 30);
        assert_eq!(tracker.earned, 0);
    }
}
