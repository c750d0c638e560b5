//! Season clock and wall-clock source.
//!
//! The season clock derives everything temporal -- remaining seconds,
//! progress, and the season-relative day index -- from the season start
//! and the current wall-clock instant. None of it is stored.
//!
//! Day indexes count whole days since the season started, so earn-cap
//! resets line up with season time regardless of timezone or restarts.

use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::{DateTime, Duration, Utc};

use economy_types::{SEASON_LENGTH_SECONDS, season_day_index, season_progress};

/// Source of the current wall-clock time.
pub trait WallClock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add_signed(by).unwrap_or(*now);
    }

    /// Jump the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The fixed 28-day timeline of one season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonClock {
    start: DateTime<Utc>,
}

impl SeasonClock {
    /// Create the clock for a season starting at `start`.
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self { start }
    }

    /// Instant the season started.
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Seconds elapsed since the season started (negative before start).
    pub fn seconds_elapsed(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.start).num_seconds()
    }

    /// Seconds until the season ends (negative once it is over).
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        SEASON_LENGTH_SECONDS.saturating_sub(self.seconds_elapsed(now))
    }

    /// Fraction of the season elapsed, in `[0, 1]`.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        season_progress(self.seconds_remaining(now))
    }

    /// Season-relative day index (day 0 is the first day).
    pub fn day_index(&self, now: DateTime<Utc>) -> i64 {
        season_day_index(self.seconds_elapsed(now))
    }

    /// Whether the season has ended at `now`.
    pub fn is_over(&self, now: DateTime<Utc>) -> bool {
        self.seconds_remaining(now) <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_571_200, 0).unwrap_or_default()
    }

    #[test]
    fn fresh_season_has_full_time_remaining() {
        let clock = SeasonClock::new(start());
        assert_eq!(clock.seconds_remaining(start()), SEASON_LENGTH_SECONDS);
        assert!(clock.progress(start()).abs() < f64::EPSILON);
        assert_eq!(clock.day_index(start()), 0);
        assert!(!clock.is_over(start()));
    }

    #[test]
    fn day_index_follows_season_not_calendar() {
        // Season starting at 18:00 UTC: 7 hours later is still day 0 even
        // though the calendar date changed.
        let offset_start = start() + Duration::hours(18);
        let clock = SeasonClock::new(offset_start);
        assert_eq!(clock.day_index(offset_start + Duration::hours(7)), 0);
        assert_eq!(clock.day_index(offset_start + Duration::hours(24)), 1);
    }

    #[test]
    fn season_end() {
        let clock = SeasonClock::new(start());
        let end = start() + Duration::days(28);
        assert!(clock.is_over(end));
        assert!((clock.progress(end) - 1.0).abs() < f64::EPSILON);
        assert_eq!(clock.day_index(end - Duration::seconds(1)), 27);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(start());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), start() + Duration::minutes(90));
        clock.set(start());
        assert_eq!(clock.now(), start());
    }
}
