//! The season ledger: pool, distribution, pressure, and price floor.
//!
//! # Design
//!
//! - **Single lock**: one [`Mutex`] covers every field; each public method
//!   acquires it once for the full check-then-mutate.
//! - **Fail-closed grants**: [`EconomyLedger::try_distribute_coins`]
//!   returns `false` instead of over-distributing.
//! - **Ratchet**: the price floor never decreases within a season.
//! - **Atomic calibration**: the calibration is swapped as one `Arc`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use economy_types::{
    CalibrationParams, InvariantSnapshot, LedgerSnapshot, MARKET_PRESSURE_MAX, MARKET_PRESSURE_MIN,
    MINUTES_PER_DAY, clamp_market_pressure,
};

use crate::LedgerError;
use crate::invariants::{InvariantReport, check_invariants};

/// Read-only view of the circulation figures used for pricing and emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirculationView {
    /// Coins held in all player wallets (aggregator snapshot).
    pub coins_in_wallets: i64,
    /// Coins held by recently active players (aggregator snapshot).
    pub active_coins_in_wallets: i64,
    /// Number of recently active players.
    pub active_players: i64,
    /// Stars purchased this season.
    pub stars_purchased: i64,
    /// Total coins handed to players.
    pub coins_distributed: i64,
    /// Total coins minted into the pool.
    pub global_coin_pool: i64,
    /// Current market pressure multiplier.
    pub market_pressure: f64,
    /// Current price floor.
    pub price_floor: i64,
    /// Last effective daily emission target.
    pub daily_emission_target: i64,
}

#[derive(Debug)]
struct LedgerState {
    season_id: String,
    global_coin_pool: i64,
    coins_distributed: i64,
    coins_in_wallets: i64,
    active_coins_in_wallets: i64,
    active_players: i64,
    global_stars_purchased: i64,
    daily_emission_target: i64,
    emission_remainder: f64,
    market_pressure: f64,
    price_floor: i64,
    calibration: Arc<CalibrationParams>,
}

/// The live economy ledger for one season.
///
/// Construct one per season and share it via `Arc`. At season rollover,
/// build a new instance for the new season rather than resetting this one.
#[derive(Debug)]
pub struct EconomyLedger {
    state: Mutex<LedgerState>,
}

impl EconomyLedger {
    /// Create an empty ledger for the calibration's season.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Calibration`] if the calibration is invalid.
    pub fn new(calibration: CalibrationParams) -> Result<Self, LedgerError> {
        calibration.validate()?;
        Ok(Self {
            state: Mutex::new(LedgerState {
                season_id: calibration.season_id.clone(),
                global_coin_pool: 0,
                coins_distributed: 0,
                coins_in_wallets: 0,
                active_coins_in_wallets: 0,
                active_players: 0,
                global_stars_purchased: 0,
                daily_emission_target: calibration.c_base,
                emission_remainder: 0.0,
                market_pressure: 1.0,
                price_floor: 0,
                calibration: Arc::new(calibration),
            }),
        })
    }

    /// Restore a ledger from a persisted snapshot.
    ///
    /// The snapshot is rejected rather than repaired when it violates an
    /// invariant: a corrupt snapshot indicates an upstream bug.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Calibration`] for an invalid calibration,
    /// [`LedgerError::SeasonMismatch`] when the snapshot belongs to another
    /// season, and [`LedgerError::CorruptSnapshot`] when it breaks an invariant.
    pub fn from_snapshot(
        snapshot: &LedgerSnapshot,
        calibration: CalibrationParams,
    ) -> Result<Self, LedgerError> {
        calibration.validate()?;
        if snapshot.season_id != calibration.season_id {
            return Err(LedgerError::SeasonMismatch {
                expected: calibration.season_id,
                actual: snapshot.season_id.clone(),
            });
        }

        let candidate = InvariantSnapshot {
            season_id: snapshot.season_id.clone(),
            global_coin_pool: snapshot.global_coin_pool,
            coins_distributed: snapshot.coins_distributed,
            emission_remainder: snapshot.emission_remainder,
            market_pressure: snapshot.market_pressure,
            price_floor: snapshot.price_floor,
        };
        if let InvariantReport::Violated(violations) = check_invariants(&candidate) {
            let reason = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(LedgerError::CorruptSnapshot {
                season_id: snapshot.season_id.clone(),
                reason,
            });
        }

        Ok(Self {
            state: Mutex::new(LedgerState {
                season_id: snapshot.season_id.clone(),
                global_coin_pool: snapshot.global_coin_pool,
                coins_distributed: snapshot.coins_distributed,
                coins_in_wallets: 0,
                active_coins_in_wallets: 0,
                active_players: 0,
                global_stars_purchased: snapshot.global_stars_purchased.max(0),
                daily_emission_target: snapshot.daily_emission_target,
                emission_remainder: snapshot.emission_remainder,
                market_pressure: snapshot.market_pressure,
                price_floor: snapshot.price_floor,
                calibration: Arc::new(calibration),
            }),
        })
    }

    /// Acquire the ledger lock, recovering the state if a holder panicked.
    ///
    /// Every critical section is a plain field update, so a poisoned lock
    /// cannot leave a half-applied operation behind.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Season this ledger belongs to.
    pub fn season_id(&self) -> String {
        self.lock().season_id.clone()
    }

    /// Circulation figures and pricing inputs, read under one lock.
    pub fn circulation(&self) -> CirculationView {
        let state = self.lock();
        CirculationView {
            coins_in_wallets: state.coins_in_wallets,
            active_coins_in_wallets: state.active_coins_in_wallets,
            active_players: state.active_players,
            stars_purchased: state.global_stars_purchased,
            coins_distributed: state.coins_distributed,
            global_coin_pool: state.global_coin_pool,
            market_pressure: state.market_pressure,
            price_floor: state.price_floor,
            daily_emission_target: state.daily_emission_target,
        }
    }

    /// Coins minted but not yet distributed.
    pub fn available_coins(&self) -> i64 {
        let state = self.lock();
        state.global_coin_pool.saturating_sub(state.coins_distributed)
    }

    /// Atomically reserve `amount` coins from the pool for a player grant.
    ///
    /// Returns `false` without mutating anything when the pool cannot cover
    /// the amount or the amount is not positive. Running out of pool is a
    /// normal business outcome, not an error.
    pub fn try_distribute_coins(&self, amount: i64) -> bool {
        if amount <= 0 {
            return false;
        }
        let mut state = self.lock();
        let available = state.global_coin_pool.saturating_sub(state.coins_distributed);
        if available < amount {
            tracing::debug!(requested = amount, available, "coin pool exhausted");
            return false;
        }
        state.coins_distributed = state.coins_distributed.saturating_add(amount);
        true
    }

    /// Add one minute of emission at the given daily target.
    ///
    /// Stores the target, adds `target / 1440` to the fractional remainder
    /// and mints its integer part into the pool. Returns the coins minted.
    /// The remainder stays in `[0, 1)` after every call.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn accrue_emission(&self, daily_target: i64) -> i64 {
        let target = daily_target.max(0);
        let mut state = self.lock();
        state.daily_emission_target = target;
        let accumulated = state.emission_remainder + target as f64 / MINUTES_PER_DAY as f64;
        let whole = accumulated.floor();
        if whole < 1.0 {
            state.emission_remainder = accumulated;
            return 0;
        }
        // Bounded by target / 1440 + 1, far inside i64 range.
        let minted = whole as i64;
        state.global_coin_pool = state.global_coin_pool.saturating_add(minted);
        state.emission_remainder = (accumulated - whole).clamp(0.0, 1.0 - f64::EPSILON);
        minted
    }

    /// Record `quantity` stars sold.
    pub fn record_star_purchase(&self, quantity: i64) {
        if quantity <= 0 {
            return;
        }
        let mut state = self.lock();
        state.global_stars_purchased = state.global_stars_purchased.saturating_add(quantity);
    }

    /// Ratchet the price floor to `candidate` and return the effective price.
    ///
    /// Returns `max(price_floor, candidate)` and stores it as the new floor,
    /// so the floor never decreases within a season.
    pub fn apply_price_floor(&self, candidate: i64) -> i64 {
        let mut state = self.lock();
        let effective = state.price_floor.max(candidate);
        state.price_floor = effective;
        effective
    }

    /// Current price floor.
    pub fn price_floor(&self) -> i64 {
        self.lock().price_floor
    }

    /// Move market pressure toward `target` by at most `max_delta`.
    ///
    /// The target is clamped to `[0.6, 1.8]` first, and the result is clamped
    /// again before it is stored. Returns the stored pressure.
    pub fn update_market_pressure(&self, target: f64, max_delta: f64) -> f64 {
        let target = clamp_market_pressure(target);
        let step_limit = if max_delta.is_finite() { max_delta.abs() } else { 0.0 };
        let mut state = self.lock();
        let current = state.market_pressure;
        let step = (target - current).clamp(-step_limit, step_limit);
        let next = (current + step).clamp(MARKET_PRESSURE_MIN, MARKET_PRESSURE_MAX);
        state.market_pressure = next;
        next
    }

    /// Current market pressure multiplier.
    pub fn market_pressure(&self) -> f64 {
        self.lock().market_pressure
    }

    /// Replace the circulation figures published by the wallet aggregator.
    ///
    /// Negative inputs are stored as zero.
    pub fn set_circulation_stats(&self, total: i64, active_total: i64, active_players: i64) {
        let mut state = self.lock();
        state.coins_in_wallets = total.max(0);
        state.active_coins_in_wallets = active_total.max(0);
        state.active_players = active_players.max(0);
    }

    /// The calibration currently in force.
    pub fn calibration(&self) -> Arc<CalibrationParams> {
        Arc::clone(&self.lock().calibration)
    }

    /// Swap in a new calibration as one unit and return the previous one.
    ///
    /// The new calibration is validated before the lock is taken; on any
    /// error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Calibration`] if validation fails, or
    /// [`LedgerError::SeasonMismatch`] if it targets another season.
    pub fn set_calibration(
        &self,
        params: CalibrationParams,
    ) -> Result<Arc<CalibrationParams>, LedgerError> {
        params.validate()?;
        let next = Arc::new(params);
        let mut state = self.lock();
        if next.season_id != state.season_id {
            return Err(LedgerError::SeasonMismatch {
                expected: state.season_id.clone(),
                actual: next.season_id.clone(),
            });
        }
        let previous = std::mem::replace(&mut state.calibration, next);
        tracing::info!(
            season_id = %state.season_id,
            from_version = previous.version,
            to_version = state.calibration.version,
            "calibration replaced"
        );
        Ok(previous)
    }

    /// Copy of the fields the invariant watchdog checks.
    pub fn invariant_snapshot(&self) -> InvariantSnapshot {
        let state = self.lock();
        InvariantSnapshot {
            season_id: state.season_id.clone(),
            global_coin_pool: state.global_coin_pool,
            coins_distributed: state.coins_distributed,
            emission_remainder: state.emission_remainder,
            market_pressure: state.market_pressure,
            price_floor: state.price_floor,
        }
    }

    /// Check the ledger invariants against a fresh snapshot.
    pub fn check_invariants(&self) -> InvariantReport {
        check_invariants(&self.invariant_snapshot())
    }

    /// Point-in-time copy for durable storage.
    ///
    /// Only the copy happens under the lock; callers write it out afterwards.
    /// The ledger does not track individual purchases, so
    /// `recent_purchases` is left empty for the caller to fill.
    pub fn persistence_snapshot(&self, taken_at: DateTime<Utc>) -> LedgerSnapshot {
        let state = self.lock();
        LedgerSnapshot {
            season_id: state.season_id.clone(),
            global_coin_pool: state.global_coin_pool,
            coins_distributed: state.coins_distributed,
            global_stars_purchased: state.global_stars_purchased,
            emission_remainder: state.emission_remainder,
            market_pressure: state.market_pressure,
            price_floor: state.price_floor,
            daily_emission_target: state.daily_emission_target,
            calibration_version: state.calibration.version,
            recent_purchases: Vec::new(),
            taken_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> EconomyLedger {
        EconomyLedger::new(CalibrationParams::default())
            .unwrap_or_else(|e| unreachable!("default calibration is valid: {e}"))
    }

    /// Mint exactly `coins` by dripping at 1440 * coins per day for a minute.
    fn funded(coins: i64) -> EconomyLedger {
        let ledger = ledger();
        let minted = ledger.accrue_emission(coins.saturating_mul(MINUTES_PER_DAY));
        assert_eq!(minted, coins);
        ledger
    }

    #[test]
    fn distribute_fails_closed_on_empty_pool() {
        let ledger = ledger();
        assert!(!ledger.try_distribute_coins(1));
        assert_eq!(ledger.circulation().coins_distributed, 0);
    }

    #[test]
    fn distribute_within_capacity() {
        let ledger = funded(50);
        assert!(ledger.try_distribute_coins(30));
        assert!(ledger.try_distribute_coins(20));
        assert!(!ledger.try_distribute_coins(1));
        let view = ledger.circulation();
        assert_eq!(view.coins_distributed, 50);
        assert_eq!(view.global_coin_pool, 50);
    }

    #[test]
    fn distribute_rejects_non_positive_amounts() {
        let ledger = funded(10);
        assert!(!ledger.try_distribute_coins(0));
        assert!(!ledger.try_distribute_coins(-5));
        assert_eq!(ledger.available_coins(), 10);
    }

    #[test]
    fn emission_remainder_accumulates() {
        let ledger = ledger();
        // 720 per day is half a coin per minute.
        assert_eq!(ledger.accrue_emission(720), 0);
        assert_eq!(ledger.accrue_emission(720), 1);
        assert_eq!(ledger.accrue_emission(720), 0);
        assert_eq!(ledger.accrue_emission(720), 1);
        let snap = ledger.invariant_snapshot();
        assert!(snap.emission_remainder >= 0.0 && snap.emission_remainder < 1.0);
        assert_eq!(ledger.circulation().daily_emission_target, 720);
    }

    #[test]
    fn negative_emission_target_mints_nothing() {
        let ledger = ledger();
        assert_eq!(ledger.accrue_emission(-10_000), 0);
        assert_eq!(ledger.circulation().global_coin_pool, 0);
    }

    #[test]
    fn price_floor_ratchets() {
        let ledger = ledger();
        assert_eq!(ledger.apply_price_floor(12), 12);
        assert_eq!(ledger.apply_price_floor(9), 12);
        assert_eq!(ledger.apply_price_floor(15), 15);
        assert_eq!(ledger.price_floor(), 15);
    }

    #[test]
    fn market_pressure_is_rate_limited() {
        let ledger = ledger();
        let next = ledger.update_market_pressure(1.8, 0.1);
        assert!((next - 1.1).abs() < 1e-12);
        let next = ledger.update_market_pressure(0.0, 0.2);
        assert!((next - 0.9).abs() < 1e-12);
    }

    #[test]
    fn market_pressure_never_leaves_bounds() {
        let ledger = ledger();
        for _ in 0..100 {
            let p = ledger.update_market_pressure(50.0, 10.0);
            assert!((MARKET_PRESSURE_MIN..=MARKET_PRESSURE_MAX).contains(&p));
        }
        for _ in 0..100 {
            let p = ledger.update_market_pressure(f64::NEG_INFINITY, f64::INFINITY);
            assert!((MARKET_PRESSURE_MIN..=MARKET_PRESSURE_MAX).contains(&p));
        }
    }

    #[test]
    fn circulation_stats_clamp_negative() {
        let ledger = ledger();
        ledger.set_circulation_stats(-1, 40, -3);
        let view = ledger.circulation();
        assert_eq!(view.coins_in_wallets, 0);
        assert_eq!(view.active_coins_in_wallets, 40);
        assert_eq!(view.active_players, 0);
    }

    #[test]
    fn calibration_swap_is_all_or_nothing() {
        let ledger = ledger();
        let bad = CalibrationParams {
            daily_cap_late: 500,
            version: 2,
            ..CalibrationParams::default()
        };
        assert!(ledger.set_calibration(bad).is_err());
        assert_eq!(ledger.calibration().version, 1);

        let good = CalibrationParams {
            version: 2,
            p0: 20,
            ..CalibrationParams::default()
        };
        let previous = ledger.set_calibration(good);
        assert!(previous.is_ok());
        assert_eq!(ledger.calibration().version, 2);
        assert_eq!(ledger.calibration().p0, 20);
    }

    #[test]
    fn calibration_for_another_season_is_rejected() {
        let ledger = ledger();
        let other = CalibrationParams {
            season_id: "season-2".to_owned(),
            ..CalibrationParams::default()
        };
        assert!(matches!(
            ledger.set_calibration(other),
            Err(LedgerError::SeasonMismatch { .. })
        ));
    }

    #[test]
    fn snapshot_round_trip_restores_state() {
        let ledger = funded(100);
        assert!(ledger.try_distribute_coins(40));
        ledger.record_star_purchase(3);
        ledger.apply_price_floor(27);
        ledger.update_market_pressure(1.5, 0.2);

        let snap = ledger.persistence_snapshot(Utc::now());
        let restored = EconomyLedger::from_snapshot(&snap, CalibrationParams::default());
        assert!(restored.is_ok());
        if let Ok(restored) = restored {
            let view = restored.circulation();
            assert_eq!(view.global_coin_pool, 100);
            assert_eq!(view.coins_distributed, 40);
            assert_eq!(view.stars_purchased, 3);
            assert_eq!(view.price_floor, 27);
            assert!((view.market_pressure - 1.2).abs() < 1e-12);
        }
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        let snap = LedgerSnapshot {
            season_id: "season-1".to_owned(),
            global_coin_pool: 10,
            coins_distributed: 20,
            global_stars_purchased: 0,
            emission_remainder: 0.0,
            market_pressure: 1.0,
            price_floor: 0,
            daily_emission_target: 0,
            calibration_version: 1,
            recent_purchases: Vec::new(),
            taken_at: Utc::now(),
        };
        assert!(matches!(
            EconomyLedger::from_snapshot(&snap, CalibrationParams::default()),
            Err(LedgerError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn fresh_ledger_is_healthy() {
        assert_eq!(ledger().check_invariants(), InvariantReport::Healthy);
    }
}
