//! Simulation report.
//!
//! Every collection is ordered (`Vec` in time order or `BTreeMap`) and no
//! wall-clock value is recorded, so the serialized report of a seeded run
//! is byte-identical across runs.

use std::collections::BTreeMap;

use serde::Serialize;

/// Price at the top of one season hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    /// Season hour (0-based).
    pub hour: i64,
    /// Live star price after the floor ratchet.
    pub price: i64,
    /// Market pressure at the sample.
    pub market_pressure: f64,
}

/// Time-to-first-star statistics for players who joined on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FirstStarBucket {
    /// Players who joined that day.
    pub players: u32,
    /// Players who bought at least one star.
    pub with_star: u32,
    /// Median hours from joining to the first star, among `with_star`.
    pub median_hours: Option<f64>,
}

/// Late-joiner fairness signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HopeMetric {
    /// Late joiners in the population.
    pub late_joiners: u32,
    /// Late joiners who bought a star within the window.
    pub acquired_within_window: u32,
    /// Window after joining, in hours.
    pub window_hours: i64,
    /// `acquired_within_window / late_joiners` (0 with no late joiners).
    pub fraction: f64,
    /// Calibration target.
    pub threshold: f64,
}

/// Season-wide coin and star totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationTotals {
    /// Coins minted into the pool.
    pub coins_minted: i64,
    /// Coins granted to players.
    pub coins_distributed: i64,
    /// Coins charged for stars.
    pub coins_charged: i64,
    /// Coins that left wallets (`distributed - held`).
    pub coins_burned: i64,
    /// Coins held at season end.
    pub coins_in_wallets: i64,
    /// Stars sold.
    pub stars_purchased: i64,
    /// Purchase orders placed.
    pub purchase_orders: u64,
    /// Reward claims denied by an empty pool.
    pub grants_denied_pool: u64,
    /// Reward claims denied by the daily cap.
    pub grants_denied_cap: u64,
    /// Price floor at season end.
    pub final_price_floor: i64,
    /// Market pressure at season end.
    pub final_market_pressure: f64,
}

/// Pass/fail checks over the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationAssertions {
    /// The hourly price curve never decreases.
    pub star_price_monotonic: bool,
    /// Coins charged equal coins burned, and grants equal distribution.
    pub coin_burn_exact: bool,
    /// Admin economy routes only accept non-safe methods.
    pub admin_economy_locked: bool,
    /// The hope metric reached the calibration threshold.
    pub hope_met: bool,
}

impl SimulationAssertions {
    /// Whether every check passed.
    pub const fn all_passed(&self) -> bool {
        self.star_price_monotonic
            && self.coin_burn_exact
            && self.admin_economy_locked
            && self.hope_met
    }
}

/// Result of one simulated season.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Calibrated season.
    pub season_id: String,
    /// Calibration version under test.
    pub calibration_version: u32,
    /// RNG seed.
    pub seed: u64,
    /// Head count per archetype.
    pub population: BTreeMap<&'static str, u32>,
    /// Hourly price samples.
    pub price_curve: Vec<PricePoint>,
    /// Time to first star keyed by join day.
    pub first_star_by_join_day: BTreeMap<i64, FirstStarBucket>,
    /// Late-joiner fairness.
    pub hope: HopeMetric,
    /// Players keyed by stars owned at season end.
    pub star_histogram: BTreeMap<i64, u32>,
    /// Coin and star totals.
    pub totals: SimulationTotals,
    /// Pass/fail checks.
    pub assertions: SimulationAssertions,
}

/// Whether `curve` never decreases.
pub fn is_non_decreasing(curve: &[PricePoint]) -> bool {
    curve.windows(2).all(|pair| match pair {
        [a, b] => b.price >= a.price,
        _ => true,
    })
}

/// Median of `values`, averaging the middle pair for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values.get(mid).copied()
    } else {
        let low = values.get(mid.checked_sub(1)?)?;
        let high = values.get(mid)?;
        Some(f64::midpoint(*low, *high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(hour: i64, price: i64) -> PricePoint {
        PricePoint {
            hour,
            price,
            market_pressure: 1.0,
        }
    }

    #[test]
    fn monotonic_check() {
        assert!(is_non_decreasing(&[]));
        assert!(is_non_decreasing(&[point(0, 10), point(1, 10), point(2, 12)]));
        assert!(!is_non_decreasing(&[point(0, 10), point(1, 9)]));
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
