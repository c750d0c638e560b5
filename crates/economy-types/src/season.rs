//! Season timeline constants and derived quantities.
//!
//! A season is a fixed 28-day epoch. Progress and day index are always
//! derived from elapsed or remaining seconds -- never stored. Day indexes
//! are season-relative (days since season start), not calendar days.

/// Number of days in one season.
pub const SEASON_LENGTH_DAYS: i64 = 28;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Minutes in one day.
pub const MINUTES_PER_DAY: i64 = 1_440;

/// Seconds in one season.
pub const SEASON_LENGTH_SECONDS: i64 = SEASON_LENGTH_DAYS * SECONDS_PER_DAY;

/// Minutes in one season (the simulator's step count).
pub const SEASON_LENGTH_MINUTES: i64 = SEASON_LENGTH_DAYS * MINUTES_PER_DAY;

/// Lower bound of the market pressure multiplier.
pub const MARKET_PRESSURE_MIN: f64 = 0.6;

/// Upper bound of the market pressure multiplier.
pub const MARKET_PRESSURE_MAX: f64 = 1.8;

/// Fraction of the season elapsed, in `[0, 1]`.
///
/// Computed as `1 - seconds_remaining / season_length`. Negative remaining
/// time (season over) yields 1; more than a full season remaining yields 0.
#[allow(clippy::cast_precision_loss)]
pub fn season_progress(seconds_remaining: i64) -> f64 {
    let remaining = seconds_remaining as f64 / SEASON_LENGTH_SECONDS as f64;
    (1.0 - remaining).clamp(0.0, 1.0)
}

/// Season-relative day index for the given elapsed seconds.
///
/// Time before the season start maps to day 0.
pub const fn season_day_index(seconds_elapsed: i64) -> i64 {
    if seconds_elapsed <= 0 {
        return 0;
    }
    seconds_elapsed / SECONDS_PER_DAY
}

/// Clamp a market pressure value into `[0.6, 1.8]`.
///
/// NaN maps to the neutral value 1.0.
pub fn clamp_market_pressure(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(MARKET_PRESSURE_MIN, MARKET_PRESSURE_MAX)
}
