//! Minute-by-minute season replay.
//!
//! Each minute, in order:
//!
//! 1. refresh circulation stats (top of each hour)
//! 2. drip emission into the pool
//! 3. recompute the live price through the floor ratchet
//! 4. let every joined player claim rewards and decide on purchases
//! 5. feed the minute's purchases to the market pressure regulator
//!
//! The run owns a private [`EconomyLedger`] and a seeded `ChaCha8` RNG;
//! players are processed in population order, so a seed fully determines
//! the report.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use economy_core::admin::{ADMIN_ECONOMY_ROUTES, routes_locked};
use economy_core::config::SimulationConfig;
use economy_core::earn_cap::daily_earn_cap;
use economy_core::emission::drip_emission;
use economy_core::pricing::{PriceInputs, bulk_star_cost, live_star_price};
use economy_core::regulator::{MAX_PRESSURE_DELTA_PER_TICK, desired_pressure};
use economy_core::throttle::{
    EnforcementSignal, RewardContext, adjusted_cooldown_seconds, adjusted_reward,
};
use economy_ledger::EconomyLedger;
use economy_types::{
    CalibrationParams, MINUTES_PER_DAY, SEASON_LENGTH_MINUTES, SEASON_LENGTH_SECONDS,
    season_progress,
};

use crate::SimulationError;
use crate::archetype::{Archetype, SimPlayer, spawn_population};
use crate::history::MinuteHistory;
use crate::report::{
    FirstStarBucket, HopeMetric, PricePoint, SimulationAssertions, SimulationReport,
    SimulationTotals, is_non_decreasing, median,
};

const MINUTES_PER_HOUR: i64 = 60;

/// Faucets available to synthetic players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Faucet {
    DailyLogin,
    Activity,
    PassiveDrip,
}

/// Mutable state of one run.
struct SeasonRun {
    params: Arc<CalibrationParams>,
    ledger: EconomyLedger,
    rng: ChaCha8Rng,
    players: Vec<SimPlayer>,
    history: MinuteHistory,
    price_curve: Vec<PricePoint>,
    totals: SimulationTotals,
    granted: i64,
}

impl SeasonRun {
    fn new(
        params: &CalibrationParams,
        config: &SimulationConfig,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        params.validate()?;
        if config.population.total() == 0 {
            return Err(SimulationError::EmptyPopulation);
        }
        let ledger = EconomyLedger::new(params.clone())?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let players = spawn_population(&config.population, &mut rng);
        let hours = usize::try_from(SEASON_LENGTH_MINUTES / MINUTES_PER_HOUR).unwrap_or_default();
        Ok(Self {
            params: ledger.calibration(),
            ledger,
            rng,
            players,
            history: MinuteHistory::new(),
            price_curve: Vec::with_capacity(hours),
            totals: SimulationTotals::default(),
            granted: 0,
        })
    }

    fn run(&mut self) {
        for minute in 0..SEASON_LENGTH_MINUTES {
            self.step(minute);
        }
    }

    fn step(&mut self, minute: i64) {
        let remaining = SEASON_LENGTH_SECONDS.saturating_sub(minute.saturating_mul(60));
        let progress = season_progress(remaining);
        let top_of_hour = minute % MINUTES_PER_HOUR == 0;

        if top_of_hour {
            self.refresh_circulation(minute);
        }
        drip_emission(&self.ledger, remaining);
        let price = live_star_price(&self.ledger, remaining);
        if top_of_hour {
            self.price_curve.push(PricePoint {
                hour: minute / MINUTES_PER_HOUR,
                price,
                market_pressure: self.ledger.market_pressure(),
            });
        }

        let mut stars_this_minute: i64 = 0;
        for index in 0..self.players.len() {
            let Some(player) = self.players.get(index) else {
                continue;
            };
            if !player.is_playing(minute) {
                continue;
            }
            if self.due(index, minute, Faucet::DailyLogin) {
                self.claim(index, Faucet::DailyLogin, minute, progress);
            }
            if self.due(index, minute, Faucet::Activity) {
                self.claim(index, Faucet::Activity, minute, progress);
            }
            if self.due(index, minute, Faucet::PassiveDrip) {
                self.claim(index, Faucet::PassiveDrip, minute, progress);
            }
            stars_this_minute =
                stars_this_minute.saturating_add(self.shop(index, minute, remaining, price));
        }

        self.history.push_minute(stars_this_minute.unsigned_abs());
        let desired = desired_pressure(self.history.counts());
        self.ledger
            .update_market_pressure(desired, MAX_PRESSURE_DELTA_PER_TICK);
    }

    fn due(&self, index: usize, minute: i64, faucet: Faucet) -> bool {
        self.players.get(index).is_some_and(|p| {
            let next = match faucet {
                Faucet::DailyLogin => p.next_daily_minute,
                Faucet::Activity => p.next_activity_minute,
                Faucet::PassiveDrip => p.next_drip_minute,
            };
            minute >= next
        })
    }

    /// Publish hourly wallet totals, as the live aggregator would.
    fn refresh_circulation(&self, minute: i64) {
        let mut total: i64 = 0;
        let mut active_total: i64 = 0;
        let mut active_players: i64 = 0;
        for player in self.players.iter().filter(|p| p.has_joined(minute)) {
            total = total.saturating_add(player.coins);
            if player.is_recently_active(minute) {
                active_total = active_total.saturating_add(player.coins);
                active_players = active_players.saturating_add(1);
            }
        }
        self.ledger
            .set_circulation_stats(total, active_total, active_players);
    }

    /// Run one reward claim through the throttle and cap chain.
    fn claim(&mut self, index: usize, faucet: Faucet, minute: i64, progress: f64) {
        let params = Arc::clone(&self.params);
        let (base, base_cooldown) = match faucet {
            Faucet::DailyLogin => (
                params.daily_login_reward,
                params.daily_login_cooldown_hours.saturating_mul(3_600),
            ),
            Faucet::Activity => (params.activity_reward, params.activity_cooldown_seconds),
            Faucet::PassiveDrip => (
                params.passive_drip_amount,
                params.passive_drip_interval_minutes.saturating_mul(60),
            ),
        };
        let jitter_sample: f64 = self.rng.random();
        let cap = daily_earn_cap(&params, progress);
        let day_index = minute / MINUTES_PER_DAY;

        let Some(player) = self.players.get_mut(index) else {
            return;
        };
        player.daily_earn.roll_to(day_index);
        let remaining_cap = player.daily_earn.remaining(cap);

        let next_minute = if remaining_cap == 0 {
            self.totals.grants_denied_cap = self.totals.grants_denied_cap.saturating_add(1);
            day_index.saturating_add(1).saturating_mul(MINUTES_PER_DAY)
        } else {
            let enforcement = EnforcementSignal {
                earn_multiplier: 1.0,
                cooldown_jitter_factor: player.archetype.cooldown_jitter_factor(),
            };
            let ctx = RewardContext {
                enforcement,
                progress,
                ip_dampening: 1.0,
                account_age: Duration::minutes(minute.saturating_sub(player.join_minute)),
                remaining_cap,
            };
            let amount = adjusted_reward(base, &ctx);
            if amount > 0 {
                if self.ledger.try_distribute_coins(amount) {
                    player.coins = player.coins.saturating_add(amount);
                    player.daily_earn.record(amount);
                    player.last_reward_minute = Some(minute);
                    self.granted = self.granted.saturating_add(amount);
                } else {
                    self.totals.grants_denied_pool =
                        self.totals.grants_denied_pool.saturating_add(1);
                }
            }
            let cooldown = if faucet == Faucet::PassiveDrip {
                base_cooldown
            } else {
                adjusted_cooldown_seconds(base_cooldown, enforcement, jitter_sample, progress)
            };
            let cooldown_minutes = cooldown.saturating_add(59) / 60;
            minute.saturating_add(cooldown_minutes.max(1))
        };

        match faucet {
            Faucet::DailyLogin => player.next_daily_minute = next_minute,
            Faucet::Activity => player.next_activity_minute = next_minute,
            Faucet::PassiveDrip => player.next_drip_minute = next_minute,
        }
    }

    /// Let the player buy stars. Returns the number bought.
    fn shop(&mut self, index: usize, minute: i64, remaining: i64, price: i64) -> i64 {
        let Some(player) = self.players.get(index) else {
            return 0;
        };
        let wanted = player.desired_stars(price, &mut self.rng);
        if wanted <= 0 {
            return 0;
        }

        let inputs = PriceInputs::from_view(&self.ledger.circulation(), remaining);
        let floor = self.ledger.price_floor();
        let coins = player.coins;
        let order = (1..=wanted)
            .rev()
            .map(|quantity| (quantity, bulk_star_cost(&inputs, quantity, floor, &self.params)))
            .find(|(_, cost)| *cost <= coins);
        let Some((quantity, cost)) = order else {
            return 0;
        };

        let Some(player) = self.players.get_mut(index) else {
            return 0;
        };
        player.coins = player.coins.saturating_sub(cost);
        player.stars = player.stars.saturating_add(quantity);
        player.first_star_minute.get_or_insert(minute);
        self.ledger.record_star_purchase(quantity);
        self.totals.coins_charged = self.totals.coins_charged.saturating_add(cost);
        self.totals.purchase_orders = self.totals.purchase_orders.saturating_add(1);
        quantity
    }

    fn into_report(
        mut self,
        config: &SimulationConfig,
        seed: u64,
    ) -> SimulationReport {
        let view = self.ledger.circulation();
        let in_wallets = self
            .players
            .iter()
            .fold(0_i64, |sum, p| sum.saturating_add(p.coins));

        self.totals.coins_minted = view.global_coin_pool;
        self.totals.coins_distributed = view.coins_distributed;
        self.totals.coins_in_wallets = in_wallets;
        self.totals.coins_burned = view.coins_distributed.saturating_sub(in_wallets);
        self.totals.stars_purchased = view.stars_purchased;
        self.totals.final_price_floor = view.price_floor;
        self.totals.final_market_pressure = view.market_pressure;

        let population = Archetype::ALL
            .iter()
            .map(|a| (a.name(), a.count(&config.population)))
            .collect();

        let hope = hope_metric(&self.players, config.hope_window_hours, self.params.hope_threshold);
        let assertions = SimulationAssertions {
            star_price_monotonic: is_non_decreasing(&self.price_curve),
            coin_burn_exact: self.totals.coins_charged == self.totals.coins_burned
                && self.granted == view.coins_distributed,
            admin_economy_locked: routes_locked(ADMIN_ECONOMY_ROUTES),
            hope_met: hope.fraction >= hope.threshold,
        };

        SimulationReport {
            season_id: self.params.season_id.clone(),
            calibration_version: self.params.version,
            seed,
            population,
            first_star_by_join_day: first_star_buckets(&self.players),
            hope,
            star_histogram: star_histogram(&self.players),
            price_curve: self.price_curve,
            totals: self.totals,
            assertions,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn first_star_buckets(players: &[SimPlayer]) -> BTreeMap<i64, FirstStarBucket> {
    let mut waits: BTreeMap<i64, (u32, Vec<f64>)> = BTreeMap::new();
    for player in players {
        let entry = waits
            .entry(player.join_minute / MINUTES_PER_DAY)
            .or_default();
        entry.0 = entry.0.saturating_add(1);
        if let Some(first) = player.first_star_minute {
            let hours = first.saturating_sub(player.join_minute) as f64 / 60.0;
            entry.1.push(hours);
        }
    }
    waits
        .into_iter()
        .map(|(day, (players, mut hours))| {
            let with_star = u32::try_from(hours.len()).unwrap_or(u32::MAX);
            let bucket = FirstStarBucket {
                players,
                with_star,
                median_hours: median(&mut hours),
            };
            (day, bucket)
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn hope_metric(players: &[SimPlayer], window_hours: i64, threshold: f64) -> HopeMetric {
    let window = window_hours.saturating_mul(MINUTES_PER_HOUR);
    let mut late_joiners: u32 = 0;
    let mut acquired: u32 = 0;
    for player in players.iter().filter(|p| p.archetype == Archetype::LateJoiner) {
        late_joiners = late_joiners.saturating_add(1);
        let in_window = player
            .first_star_minute
            .is_some_and(|first| first.saturating_sub(player.join_minute) <= window);
        if in_window {
            acquired = acquired.saturating_add(1);
        }
    }
    let fraction = if late_joiners == 0 {
        0.0
    } else {
        f64::from(acquired) / f64::from(late_joiners)
    };
    HopeMetric {
        late_joiners,
        acquired_within_window: acquired,
        window_hours,
        fraction,
        threshold,
    }
}

fn star_histogram(players: &[SimPlayer]) -> BTreeMap<i64, u32> {
    let mut histogram = BTreeMap::new();
    for player in players {
        let count: &mut u32 = histogram.entry(player.stars).or_default();
        *count = count.saturating_add(1);
    }
    histogram
}

/// Simulate one season with the calibration's own seed.
pub fn run_season_simulation(
    params: &CalibrationParams,
    config: &SimulationConfig,
) -> Result<SimulationReport, SimulationError> {
    run_with_seed(params, config, params.seed)
}

/// Simulate one season with an explicit seed.
pub fn run_with_seed(
    params: &CalibrationParams,
    config: &SimulationConfig,
    seed: u64,
) -> Result<SimulationReport, SimulationError> {
    let mut run = SeasonRun::new(params, config, seed)?;
    tracing::info!(
        season_id = %params.season_id,
        seed,
        players = run.players.len(),
        "season simulation starting"
    );
    run.run();
    let report = run.into_report(config, seed);
    tracing::info!(
        seed,
        stars = report.totals.stars_purchased,
        final_price_floor = report.totals.final_price_floor,
        hope = report.hope.fraction,
        passed = report.assertions.all_passed(),
        "season simulation finished"
    );
    Ok(report)
}

/// Simulate one season per seed, each on its own thread.
///
/// Results are returned in `seeds` order.
pub fn run_many(
    params: &CalibrationParams,
    config: &SimulationConfig,
    seeds: &[u64],
) -> Vec<Result<SimulationReport, SimulationError>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = seeds
            .iter()
            .map(|&seed| (seed, scope.spawn(move || run_with_seed(params, config, seed))))
            .collect();
        handles
            .into_iter()
            .map(|(seed, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(SimulationError::WorkerPanicked { seed }))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use economy_core::config::PopulationConfig;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            population: PopulationConfig {
                early_buyer: 4,
                cautious: 4,
                whale: 1,
                random: 4,
                late_joiner: 4,
            },
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn empty_population_is_rejected() {
        let config = SimulationConfig {
            population: PopulationConfig {
                early_buyer: 0,
                cautious: 0,
                whale: 0,
                random: 0,
                late_joiner: 0,
            },
            ..SimulationConfig::default()
        };
        let result = run_season_simulation(&CalibrationParams::default(), &config);
        assert!(matches!(result, Err(SimulationError::EmptyPopulation)));
    }

    #[test]
    fn invalid_calibration_is_rejected() {
        let params = CalibrationParams {
            daily_cap_late: 500,
            ..CalibrationParams::default()
        };
        let result = run_season_simulation(&params, &small_config());
        assert!(matches!(result, Err(SimulationError::Calibration { .. })));
    }

    #[test]
    fn small_season_accounts_for_every_coin() {
        let report = run_season_simulation(&CalibrationParams::default(), &small_config());
        let Ok(report) = report else {
            unreachable!("valid inputs")
        };
        // One sample per season hour.
        assert_eq!(report.price_curve.len(), 672);
        assert!(report.assertions.star_price_monotonic);
        assert!(report.assertions.coin_burn_exact);
        assert!(report.assertions.admin_economy_locked);
        assert!(report.totals.coins_distributed <= report.totals.coins_minted);
        let players: u32 = report.star_histogram.values().sum();
        assert_eq!(players, 17);
    }

    #[test]
    fn many_seeds_match_single_runs() {
        let params = CalibrationParams::default();
        let config = small_config();
        let results = run_many(&params, &config, &[1, 2]);
        assert_eq!(results.len(), 2);
        let single = run_with_seed(&params, &config, 2);
        match (results.get(1), single) {
            (Some(Ok(parallel)), Ok(single)) => assert_eq!(parallel, &single),
            _ => unreachable!("both runs succeed"),
        }
    }
}
