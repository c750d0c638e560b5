//! Star pricing: scarcity, circulation, time, late spike, and market pressure.
//!
//! ```text
//! price = P0 * scarcity * coinMult * timeMult * lateSpike * marketPressure
//! price = min(price, max(P0, 0.9 * coinsPerPlayer))
//! star price = ceil(price)
//! ```
//!
//! Prices always round up so no star is ever under-priced. The live price
//! additionally passes through the ledger's price floor ratchet.

use economy_ledger::{CirculationView, EconomyLedger};
use economy_types::{CalibrationParams, clamp_market_pressure, season_progress};

/// Progress after which the late-season spike applies.
const LATE_SPIKE_START: f64 = 0.75;

/// Width of the late-season window (`1 - LATE_SPIKE_START`).
const LATE_SPIKE_WIDTH: f64 = 0.25;

/// Maximum extra multiplier contributed by the late spike.
const LATE_SPIKE_HEIGHT: f64 = 0.6;

/// Weight of the logarithmic circulation term.
const COIN_PRESSURE_WEIGHT: f64 = 0.55;

/// Share of average holdings a star may cost at most.
const AFFORDABILITY_SHARE: f64 = 0.9;

/// Assumed share of the early daily cap a typical player earns.
const EXPECTED_EARN_SHARE: f64 = 0.6;

/// Lower bound on the estimated player count.
const MIN_EXPECTED_PLAYERS: f64 = 10.0;

/// Inputs to the star price formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceInputs {
    /// Stars purchased this season.
    pub stars_purchased: i64,
    /// Coins held in all wallets.
    pub coins_in_circulation: i64,
    /// Coins held by active players.
    pub active_coins_in_circulation: i64,
    /// Number of active players.
    pub active_players: i64,
    /// Seconds until the season ends.
    pub seconds_remaining: i64,
    /// Market pressure multiplier (clamped to `[0.6, 1.8]` by the formula).
    pub market_pressure: f64,
}

impl PriceInputs {
    /// Build the inputs from a ledger circulation view.
    pub const fn from_view(view: &CirculationView, seconds_remaining: i64) -> Self {
        Self {
            stars_purchased: view.stars_purchased,
            coins_in_circulation: view.coins_in_wallets,
            active_coins_in_circulation: view.active_coins_in_wallets,
            active_players: view.active_players,
            seconds_remaining,
            market_pressure: view.market_pressure,
        }
    }

    /// Same inputs with `extra` more stars already sold.
    const fn with_extra_stars(self, extra: i64) -> Self {
        Self {
            stars_purchased: self.stars_purchased.saturating_add(extra),
            ..self
        }
    }
}

/// Average coins held per player.
///
/// Uses the active-player figures when any player is active, otherwise an
/// estimated population derived from the base emission. The switch between
/// the two regimes is a step, not a blend.
#[allow(clippy::cast_precision_loss)]
pub fn coins_per_player(inputs: &PriceInputs, params: &CalibrationParams) -> f64 {
    let per_player = if inputs.active_players > 0 {
        inputs.active_coins_in_circulation as f64 / inputs.active_players as f64
    } else {
        let expected_players = (params.c_base as f64
            / (params.daily_cap_early as f64 * EXPECTED_EARN_SHARE))
            .max(MIN_EXPECTED_PLAYERS);
        inputs.coins_in_circulation as f64 / expected_players
    };
    per_player.max(0.0)
}

/// Upper bound on the price: `max(P0, 0.9 * coinsPerPlayer)`.
#[allow(clippy::cast_precision_loss)]
pub fn affordability_cap(inputs: &PriceInputs, params: &CalibrationParams) -> f64 {
    (params.p0 as f64).max(AFFORDABILITY_SHARE * coins_per_player(inputs, params))
}

/// Unrounded star price after the affordability cap.
#[allow(clippy::cast_precision_loss)]
pub fn raw_star_price(inputs: &PriceInputs, params: &CalibrationParams) -> f64 {
    let progress = season_progress(inputs.seconds_remaining);
    let scarcity = 1.0 + inputs.stars_purchased.max(0) as f64 / params.s_scale;

    let per_player = coins_per_player(inputs, params);
    let coin_pressure = (per_player / params.daily_cap_early as f64).max(0.0);
    let coin_mult = COIN_PRESSURE_WEIGHT.mul_add(coin_pressure.ln_1p(), 1.0);

    let time_mult = params.alpha.mul_add(progress * progress, 1.0);

    let late_spike = if progress > LATE_SPIKE_START {
        let late = (progress - LATE_SPIKE_START) / LATE_SPIKE_WIDTH;
        LATE_SPIKE_HEIGHT.mul_add(late.powf(params.beta), 1.0)
    } else {
        1.0
    };

    let pressure = clamp_market_pressure(inputs.market_pressure);

    let price = params.p0 as f64 * scarcity * coin_mult * time_mult * late_spike * pressure;
    price.min(affordability_cap(inputs, params))
}

/// Star price in whole coins, rounded up.
pub fn compute_star_price(inputs: &PriceInputs, params: &CalibrationParams) -> i64 {
    ceil_coins(raw_star_price(inputs, params))
}

/// Total cost of buying `quantity` stars in one order.
///
/// Unit `i` (0-based) costs `ceil(price(stars + i) * (1 + gamma * i^2))`,
/// and never less than `price_floor`. Non-positive quantities cost nothing.
/// The walk stops once the total saturates; callers bound `quantity`.
#[allow(clippy::cast_precision_loss)]
pub fn bulk_star_cost(
    inputs: &PriceInputs,
    quantity: i64,
    price_floor: i64,
    params: &CalibrationParams,
) -> i64 {
    let mut total: i64 = 0;
    for i in 0..quantity.max(0) {
        let unit = compute_star_price(&inputs.with_extra_stars(i), params);
        let index = i as f64;
        let markup = params.gamma.mul_add(index * index, 1.0);
        let marked = ceil_coins(unit as f64 * markup).max(price_floor);
        total = total.saturating_add(marked);
        if total == i64::MAX {
            break;
        }
    }
    total
}

/// Current star price for the live ledger, ratcheted through the floor.
///
/// Raising the floor is part of quoting: once a price has been shown it
/// can never be undercut later in the season.
pub fn live_star_price(ledger: &EconomyLedger, seconds_remaining: i64) -> i64 {
    let params = ledger.calibration();
    let inputs = PriceInputs::from_view(&ledger.circulation(), seconds_remaining);
    ledger.apply_price_floor(compute_star_price(&inputs, &params))
}

/// Round a coin amount up to a whole coin; NaN maps to zero.
#[allow(clippy::cast_possible_truncation)]
fn ceil_coins(value: f64) -> i64 {
    if value.is_nan() {
        return 0;
    }
    // Float-to-int casts saturate at the i64 bounds.
    value.ceil() as i64
}
