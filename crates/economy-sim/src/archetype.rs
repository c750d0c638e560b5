//! Synthetic player archetypes and their per-player state.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use economy_core::config::PopulationConfig;
use economy_core::earn_cap::DailyEarnTracker;
use economy_types::MINUTES_PER_DAY;

/// Chance per active minute that a random buyer considers a purchase.
const RANDOM_BUY_CHANCE: f64 = 0.05;

/// Behavioral archetype of a synthetic player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Joins on day one and buys as soon as a star is affordable.
    EarlyBuyer,
    /// Joins in the first week and waits for twice the price.
    Cautious,
    /// Joins early, plays long sessions, buys up to three at once.
    Whale,
    /// Joins any time in the first three weeks and buys at random.
    Random,
    /// Joins in the second half and buys as soon as affordable.
    LateJoiner,
}

impl Archetype {
    /// Every archetype in population order.
    pub const ALL: [Self; 5] = [
        Self::EarlyBuyer,
        Self::Cautious,
        Self::Whale,
        Self::Random,
        Self::LateJoiner,
    ];

    /// Stable name used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::EarlyBuyer => "early_buyer",
            Self::Cautious => "cautious",
            Self::Whale => "whale",
            Self::Random => "random",
            Self::LateJoiner => "late_joiner",
        }
    }

    /// Configured head count of this archetype.
    pub const fn count(self, population: &PopulationConfig) -> u32 {
        match self {
            Self::EarlyBuyer => population.early_buyer,
            Self::Cautious => population.cautious,
            Self::Whale => population.whale,
            Self::Random => population.random,
            Self::LateJoiner => population.late_joiner,
        }
    }

    /// Join window in season days, half-open.
    const fn join_days(self) -> (i64, i64) {
        match self {
            Self::EarlyBuyer => (0, 1),
            Self::Cautious => (0, 7),
            Self::Whale => (0, 2),
            Self::Random => (0, 21),
            Self::LateJoiner => (14, 25),
        }
    }

    /// Daily session length range in hours, inclusive.
    const fn session_hours(self) -> (i64, i64) {
        match self {
            Self::EarlyBuyer => (6, 8),
            Self::Cautious => (3, 5),
            Self::Whale => (10, 14),
            Self::Random => (1, 10),
            Self::LateJoiner => (4, 8),
        }
    }

    /// Enforcement cooldown jitter applied to this archetype's claims.
    pub const fn cooldown_jitter_factor(self) -> f64 {
        match self {
            Self::Whale => 0.3,
            Self::EarlyBuyer | Self::Cautious | Self::Random | Self::LateJoiner => 0.1,
        }
    }
}

/// One synthetic player. Owned by a single simulation run.
#[derive(Debug, Clone)]
pub struct SimPlayer {
    /// Index in the population.
    pub id: u32,
    /// Behavior.
    pub archetype: Archetype,
    /// Season minute the player joins.
    pub join_minute: i64,
    /// Coin balance.
    pub coins: i64,
    /// Stars owned.
    pub stars: i64,
    /// Coins earned on the current season day.
    pub daily_earn: DailyEarnTracker,
    /// Earliest minute for the next daily-login reward.
    pub next_daily_minute: i64,
    /// Earliest minute for the next activity reward.
    pub next_activity_minute: i64,
    /// Earliest minute for the next passive drip.
    pub next_drip_minute: i64,
    /// Minute the first star was bought.
    pub first_star_minute: Option<i64>,
    /// Minute of the day the daily session starts.
    pub session_offset: i64,
    /// Session length in minutes.
    pub session_minutes: i64,
    /// Last minute the player received any reward.
    pub last_reward_minute: Option<i64>,
}

impl SimPlayer {
    /// Draw a new player of `archetype`.
    pub fn spawn(id: u32, archetype: Archetype, rng: &mut ChaCha8Rng) -> Self {
        let (first_day, last_day) = archetype.join_days();
        let join_minute = rng.random_range(
            first_day.saturating_mul(MINUTES_PER_DAY)..last_day.saturating_mul(MINUTES_PER_DAY),
        );
        let (short, long) = archetype.session_hours();
        let session_minutes = rng.random_range(short..=long).saturating_mul(60);
        let session_offset = rng.random_range(0..MINUTES_PER_DAY);
        Self {
            id,
            archetype,
            join_minute,
            coins: 0,
            stars: 0,
            daily_earn: DailyEarnTracker::default(),
            next_daily_minute: join_minute,
            next_activity_minute: join_minute,
            next_drip_minute: join_minute,
            first_star_minute: None,
            session_offset,
            session_minutes,
            last_reward_minute: None,
        }
    }

    /// Whether the player has joined by `minute`.
    pub const fn has_joined(&self, minute: i64) -> bool {
        minute >= self.join_minute
    }

    /// Whether the player is in a play session at `minute`.
    pub const fn is_playing(&self, minute: i64) -> bool {
        if !self.has_joined(minute) {
            return false;
        }
        let since_offset = (minute - self.session_offset).rem_euclid(MINUTES_PER_DAY);
        since_offset < self.session_minutes
    }

    /// Whether the player was rewarded in the trailing day.
    pub const fn is_recently_active(&self, minute: i64) -> bool {
        match self.last_reward_minute {
            Some(last) => minute - last < MINUTES_PER_DAY,
            None => false,
        }
    }

    /// Stars this player wants to buy at `price`, before checking the bulk
    /// cost against the balance.
    pub fn desired_stars(&self, price: i64, rng: &mut ChaCha8Rng) -> i64 {
        if price <= 0 || self.coins < price {
            return 0;
        }
        match self.archetype {
            Archetype::EarlyBuyer | Archetype::LateJoiner => 1,
            Archetype::Cautious => i64::from(self.coins >= price.saturating_mul(2)),
            Archetype::Whale => 3,
            Archetype::Random => i64::from(rng.random_bool(RANDOM_BUY_CHANCE)),
        }
    }
}

/// Spawn the configured population, archetype by archetype.
pub fn spawn_population(population: &PopulationConfig, rng: &mut ChaCha8Rng) -> Vec<SimPlayer> {
    let mut players = Vec::new();
    let mut next_id: u32 = 0;
    for archetype in Archetype::ALL {
        for _ in 0..archetype.count(population) {
            players.push(SimPlayer::spawn(next_id, archetype, rng));
            next_id = next_id.saturating_add(1);
        }
    }
    players
}
