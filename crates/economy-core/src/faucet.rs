//! Reward claims: daily login, activity, and passive drip.
//!
//! A claim runs the cooldown check, the season-day reset, the throttle
//! chain, and the earn-cap clamp, then commits the new cooldown and the
//! cap consumption to the player record with a compare-and-swap write.
//! Only after that reservation lands are the coins drawn from the ledger
//! pool and credited. A claim that loses the reservation race is evaluated
//! again against the winner's record.
//!
//! If the pool is short the reservation is released. Once the draw succeeds
//! the credit is retried against fresh reads of the player record until it
//! commits or [`MAX_CREDIT_ATTEMPTS`] is reached.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use economy_ledger::EconomyLedger;
use economy_types::{CalibrationParams, PlayerId};

use crate::clock::{SeasonClock, WallClock};
use crate::earn_cap::daily_earn_cap;
use crate::player::{PlayerRecord, PlayerStore, PlayerStoreError};
use crate::throttle::{AbuseSignals, RewardContext, adjusted_cooldown_seconds, adjusted_reward};

/// Compare-and-swap attempts before a credit is abandoned.
pub const MAX_CREDIT_ATTEMPTS: u32 = 3;

/// Which faucet is being claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Once per login cooldown.
    DailyLogin,
    /// Gameplay activity reward.
    Activity,
    /// Small periodic reward for active players.
    PassiveDrip,
}

impl RewardKind {
    fn base_reward(self, params: &CalibrationParams) -> i64 {
        match self {
            Self::DailyLogin => params.daily_login_reward,
            Self::Activity => params.activity_reward,
            Self::PassiveDrip => params.passive_drip_amount,
        }
    }

    fn base_cooldown_seconds(self, params: &CalibrationParams) -> i64 {
        match self {
            Self::DailyLogin => params.daily_login_cooldown_hours.saturating_mul(3_600),
            Self::Activity => params.activity_cooldown_seconds,
            Self::PassiveDrip => params.passive_drip_interval_minutes.saturating_mul(60),
        }
    }

    const fn next_at(self, record: &PlayerRecord) -> Option<DateTime<Utc>> {
        match self {
            Self::DailyLogin => record.next_daily_at,
            Self::Activity => record.next_activity_at,
            Self::PassiveDrip => record.next_drip_at,
        }
    }

    const fn set_next_at(self, record: &mut PlayerRecord, at: Option<DateTime<Utc>>) {
        let slot = match self {
            Self::DailyLogin => &mut record.next_daily_at,
            Self::Activity => &mut record.next_activity_at,
            Self::PassiveDrip => &mut record.next_drip_at,
        };
        *slot = at;
    }
}

/// Result of a claim. Only store failures are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// Coins were credited.
    Granted {
        /// Coins credited.
        amount: i64,
        /// Balance after the credit.
        balance: i64,
        /// When this faucet can be claimed again.
        next_eligible_at: DateTime<Utc>,
    },
    /// The faucet is on cooldown.
    CoolingDown {
        /// When the cooldown ends.
        until: DateTime<Utc>,
    },
    /// Today's earn cap is used up.
    CapReached,
    /// The global pool has too few undistributed coins.
    PoolExhausted,
    /// Enforcement reduced the reward to nothing.
    Suppressed,
}

/// Faucet failures.
#[derive(Debug, thiserror::Error)]
pub enum FaucetError {
    /// The player store failed.
    #[error(transparent)]
    Store(#[from] PlayerStoreError),

    /// A reservation or credit kept losing races.
    #[error("claim of {amount} coins by player {player} lost {attempts} write races")]
    Contention {
        /// Player being credited.
        player: PlayerId,
        /// Coins drawn from the pool, zero if the reservation never landed.
        amount: i64,
        /// Attempts made.
        attempts: u32,
    },
}

/// Coins drawn from the pool and the cooldown that goes with them.
#[derive(Debug, Clone, Copy)]
struct Grant {
    amount: i64,
    day_index: i64,
    next_eligible_at: DateTime<Utc>,
}

/// Result of committing a grant's cooldown and cap use to the record.
enum Reservation {
    Held {
        grant: Grant,
        previous_next: Option<DateTime<Utc>>,
    },
    Refused(ClaimOutcome),
}

/// Faucet service over the shared ledger and the player store.
pub struct Faucet<S> {
    ledger: Arc<EconomyLedger>,
    players: Arc<S>,
    signals: Arc<dyn AbuseSignals>,
    season: SeasonClock,
    clock: Arc<dyn WallClock>,
}

impl<S: PlayerStore> Faucet<S> {
    /// Create a faucet.
    pub const fn new(
        ledger: Arc<EconomyLedger>,
        players: Arc<S>,
        signals: Arc<dyn AbuseSignals>,
        season: SeasonClock,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            ledger,
            players,
            signals,
            season,
            clock,
        }
    }

    /// Claim a reward for `player`.
    pub async fn claim(
        &self,
        player: PlayerId,
        kind: RewardKind,
    ) -> Result<ClaimOutcome, FaucetError> {
        let (grant, previous_next) = match self.reserve(player, kind).await? {
            Reservation::Held {
                grant,
                previous_next,
            } => (grant, previous_next),
            Reservation::Refused(outcome) => return Ok(outcome),
        };

        if !self.ledger.try_distribute_coins(grant.amount) {
            self.release(player, kind, grant, previous_next).await?;
            return Ok(ClaimOutcome::PoolExhausted);
        }

        for _ in 0..MAX_CREDIT_ATTEMPTS {
            let mut record = self.players.get(player).await?;
            let expected_version = record.version;
            record.coins = record.coins.saturating_add(grant.amount);
            let balance = record.coins;

            if self.players.compare_and_swap(expected_version, record).await? {
                tracing::debug!(%player, ?kind, amount = grant.amount, "faucet claim granted");
                return Ok(ClaimOutcome::Granted {
                    amount: grant.amount,
                    balance,
                    next_eligible_at: grant.next_eligible_at,
                });
            }
        }

        tracing::error!(
            %player,
            ?kind,
            amount = grant.amount,
            "faucet credit abandoned after write races"
        );
        Err(FaucetError::Contention {
            player,
            amount: grant.amount,
            attempts: MAX_CREDIT_ATTEMPTS,
        })
    }

    /// Commit the cooldown and cap use of a fresh evaluation, re-evaluating
    /// after every lost race.
    async fn reserve(
        &self,
        player: PlayerId,
        kind: RewardKind,
    ) -> Result<Reservation, FaucetError> {
        for _ in 0..MAX_CREDIT_ATTEMPTS {
            let mut record = self.players.get(player).await?;
            let grant = match self.evaluate(&record, kind) {
                Ok(grant) => grant,
                Err(outcome) => return Ok(Reservation::Refused(outcome)),
            };

            let expected_version = record.version;
            let previous_next = kind.next_at(&record);
            record.daily_earn.roll_to(grant.day_index);
            record.daily_earn.record(grant.amount);
            kind.set_next_at(&mut record, Some(grant.next_eligible_at));

            if self.players.compare_and_swap(expected_version, record).await? {
                return Ok(Reservation::Held {
                    grant,
                    previous_next,
                });
            }
        }

        tracing::warn!(%player, ?kind, "faucet reservation abandoned after write races");
        Err(FaucetError::Contention {
            player,
            amount: 0,
            attempts: MAX_CREDIT_ATTEMPTS,
        })
    }

    /// Undo a reservation whose pool draw failed.
    async fn release(
        &self,
        player: PlayerId,
        kind: RewardKind,
        grant: Grant,
        previous_next: Option<DateTime<Utc>>,
    ) -> Result<(), FaucetError> {
        for _ in 0..MAX_CREDIT_ATTEMPTS {
            let mut record = self.players.get(player).await?;
            let expected_version = record.version;
            record.daily_earn.release(grant.day_index, grant.amount);
            if kind.next_at(&record) == Some(grant.next_eligible_at) {
                kind.set_next_at(&mut record, previous_next);
            }

            if self.players.compare_and_swap(expected_version, record).await? {
                return Ok(());
            }
        }

        // The player keeps a cooldown with no coins; the ledger is untouched.
        tracing::warn!(
            %player,
            ?kind,
            amount = grant.amount,
            "faucet reservation not released after write races"
        );
        Ok(())
    }

    /// Decide whether a claim may proceed and for how much.
    fn evaluate(&self, record: &PlayerRecord, kind: RewardKind) -> Result<Grant, ClaimOutcome> {
        let now = self.clock.now();
        if let Some(until) = kind.next_at(record) {
            if now < until {
                return Err(ClaimOutcome::CoolingDown { until });
            }
        }

        let params = self.ledger.calibration();
        let progress = self.season.progress(now);
        let day_index = self.season.day_index(now);

        let mut tracker = record.daily_earn;
        tracker.roll_to(day_index);
        let remaining_cap = tracker.remaining(daily_earn_cap(&params, progress));
        if remaining_cap == 0 {
            return Err(ClaimOutcome::CapReached);
        }

        let enforcement = self.signals.enforcement(record.id);
        let ctx = RewardContext {
            enforcement,
            progress,
            ip_dampening: self.signals.ip_dampening(record.id),
            account_age: now.signed_duration_since(record.created_at),
            remaining_cap,
        };
        let amount = adjusted_reward(kind.base_reward(&params), &ctx);
        if amount == 0 {
            return Err(ClaimOutcome::Suppressed);
        }

        let base_cooldown = kind.base_cooldown_seconds(&params);
        let cooldown = if kind == RewardKind::PassiveDrip {
            base_cooldown
        } else {
            let jitter_sample: f64 = rand::rng().random();
            adjusted_cooldown_seconds(base_cooldown, enforcement, jitter_sample, progress)
        };
        let next_eligible_at = now
            .checked_add_signed(Duration::seconds(cooldown))
            .unwrap_or(now);

        Ok(Grant {
            amount,
            day_index,
            next_eligible_at,
        })
    }
}
