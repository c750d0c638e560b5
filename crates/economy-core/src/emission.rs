//! Emission controller: how many coins drip into the pool each minute.
//!
//! ```text
//! timeMult  = max(0.12, 1 - 0.75 * progress)
//! coinMult  = max(0.2, 1 / (1 + circulation / max(2000, 4 * GScale)))
//! effective = max(round(CBase * timeMult * coinMult), max(round(0.25 * CBase), DailyCapLate))
//! ```
//!
//! Each minute adds `effective / 1440` to the ledger's fractional
//! accumulator and mints its whole part, so the long-run minted rate
//! converges on the target with less than one coin of error at any time.

use std::sync::Arc;

use economy_ledger::EconomyLedger;
use economy_types::{CalibrationParams, season_progress};

use crate::clock::{SeasonClock, WallClock};

/// Floor of the time multiplier late in the season.
const MIN_TIME_MULT: f64 = 0.12;

/// How much of the base emission decays away over the season.
const TIME_DECAY: f64 = 0.75;

/// Floor of the circulation multiplier.
const MIN_COIN_MULT: f64 = 0.2;

/// Lower bound on the circulation damping denominator.
const MIN_COIN_DENOMINATOR: f64 = 2_000.0;

/// Share of the base emission that is always emitted.
const BASE_EMISSION_FLOOR_SHARE: f64 = 0.25;

/// Daily emission target after season-time and circulation damping.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn effective_daily_emission_target(
    params: &CalibrationParams,
    seconds_remaining: i64,
    coins_in_circulation: i64,
) -> i64 {
    let progress = season_progress(seconds_remaining);
    let time_mult = TIME_DECAY.mul_add(-progress, 1.0).max(MIN_TIME_MULT);

    let denominator = (params.g_scale * 4.0).max(MIN_COIN_DENOMINATOR);
    let circulation = coins_in_circulation.max(0) as f64;
    let coin_mult = (1.0 / (1.0 + circulation / denominator)).max(MIN_COIN_MULT);

    let c_base = params.c_base as f64;
    // Both values are bounded by c_base, which fits comfortably in i64.
    let effective = (c_base * time_mult * coin_mult).round() as i64;
    let floor = ((BASE_EMISSION_FLOOR_SHARE * c_base).round() as i64).max(params.daily_cap_late);
    effective.max(floor)
}

/// Result of one emission minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionTick {
    /// Effective daily target used for this minute.
    pub daily_target: i64,
    /// Coins minted into the pool this minute.
    pub minted: i64,
}

/// Drip one minute of emission into the ledger.
///
/// Reads circulation and calibration, computes the effective target, and
/// accrues it through the ledger's locked accumulator.
pub fn drip_emission(ledger: &EconomyLedger, seconds_remaining: i64) -> EmissionTick {
    let params = ledger.calibration();
    let circulation = ledger.circulation().coins_in_wallets;
    let daily_target = effective_daily_emission_target(&params, seconds_remaining, circulation);
    let minted = ledger.accrue_emission(daily_target);
    EmissionTick {
        daily_target,
        minted,
    }
}

/// Per-minute emission driver for the live ledger.
pub struct EmissionController {
    ledger: Arc<EconomyLedger>,
    season: SeasonClock,
    clock: Arc<dyn WallClock>,
}

impl EmissionController {
    /// Create a controller for the given ledger and season.
    pub const fn new(
        ledger: Arc<EconomyLedger>,
        season: SeasonClock,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            ledger,
            season,
            clock,
        }
    }

    /// Drip one minute of emission at the current wall-clock time.
    pub fn tick(&self) -> EmissionTick {
        let remaining = self.season.seconds_remaining(self.clock.now());
        let tick = drip_emission(&self.ledger, remaining);
        tracing::debug!(
            daily_target = tick.daily_target,
            minted = tick.minted,
            seconds_remaining = remaining,
            "emission tick"
        );
        tick
    }
}
