//! Reward and cooldown adjustment chains.
//!
//! Every faucet reward passes through the same fixed order before it is
//! checked against the daily earn cap:
//!
//! 1. base reward
//! 2. enforcement earn multiplier
//! 3. season reward scale, `clamp(1.35 - 0.65 * progress, 0.7, 1.5)`
//! 4. shared-IP dampening
//! 5. account-age ramp
//! 6. clamp to the remaining daily cap
//!
//! Cooldowns follow a parallel chain: base, plus enforcement jitter, times
//! `clamp(0.7 + 0.9 * progress, 0.6, 1.8)`.
//!
//! The account-age ramp only scales rewards down. A positive reward never
//! rounds to zero, so a brand-new account can always earn at least one
//! coin while it still has cap left.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use economy_types::PlayerId;

/// Accounts younger than this earn a reduced share of each reward.
pub const ACCOUNT_AGE_RAMP_WINDOW: Duration = Duration::days(3);

/// Share of a reward a brand-new account receives.
pub const ACCOUNT_AGE_RAMP_MIN: f64 = 0.5;

/// Per-player signal from the abuse-detection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnforcementSignal {
    /// Multiplier applied to every reward (1.0 for a clean account).
    pub earn_multiplier: f64,
    /// Maximum extra cooldown as a fraction of the base cooldown.
    pub cooldown_jitter_factor: f64,
}

impl Default for EnforcementSignal {
    fn default() -> Self {
        Self {
            earn_multiplier: 1.0,
            cooldown_jitter_factor: 0.0,
        }
    }
}

/// Abuse-detection and IP-density collaborators.
pub trait AbuseSignals: Send + Sync {
    /// Enforcement signal for `player`.
    fn enforcement(&self, player: PlayerId) -> EnforcementSignal;

    /// Reward multiplier in `(0, 1]` derived from shared-IP density.
    fn ip_dampening(&self, player: PlayerId) -> f64;
}

/// Signals for a deployment without abuse detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAbuseSignals;

impl AbuseSignals for NoAbuseSignals {
    fn enforcement(&self, _player: PlayerId) -> EnforcementSignal {
        EnforcementSignal::default()
    }

    fn ip_dampening(&self, _player: PlayerId) -> f64 {
        1.0
    }
}

/// Season reward scaling: generous early, tighter late.
pub fn faucet_reward_scale(progress: f64) -> f64 {
    0.65_f64.mul_add(-sanitize_progress(progress), 1.35).clamp(0.7, 1.5)
}

/// Season cooldown scaling: short early, longer late.
pub fn season_cooldown_multiplier(progress: f64) -> f64 {
    0.9_f64.mul_add(sanitize_progress(progress), 0.7).clamp(0.6, 1.8)
}

/// Linear soft ramp on account age, from [`ACCOUNT_AGE_RAMP_MIN`] at
/// creation up to 1.0 after [`ACCOUNT_AGE_RAMP_WINDOW`].
#[allow(clippy::cast_precision_loss)]
pub fn account_age_ramp(age: Duration) -> f64 {
    let window = ACCOUNT_AGE_RAMP_WINDOW.num_seconds() as f64;
    let elapsed = age.num_seconds().max(0) as f64;
    (elapsed / window).clamp(ACCOUNT_AGE_RAMP_MIN, 1.0)
}

fn sanitize_progress(progress: f64) -> f64 {
    if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) }
}

fn sanitize_multiplier(value: f64, max: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, max) } else { 0.0 }
}

/// Everything the reward chain needs besides the base amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardContext {
    /// Enforcement signal for the claiming player.
    pub enforcement: EnforcementSignal,
    /// Season progress in `[0, 1]`.
    pub progress: f64,
    /// Shared-IP dampening in `(0, 1]`.
    pub ip_dampening: f64,
    /// Age of the claiming account.
    pub account_age: Duration,
    /// Coins left under today's earn cap.
    pub remaining_cap: i64,
}

/// Reward after every step of the chain.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn adjusted_reward(base: i64, ctx: &RewardContext) -> i64 {
    if base <= 0 || ctx.remaining_cap <= 0 {
        return 0;
    }
    let scaled = base as f64
        * sanitize_multiplier(ctx.enforcement.earn_multiplier, 1.0)
        * faucet_reward_scale(ctx.progress)
        * sanitize_multiplier(ctx.ip_dampening, 1.0)
        * account_age_ramp(ctx.account_age);

    // A zero enforcement multiplier suppresses the reward outright.
    if scaled <= 0.0 {
        return 0;
    }
    let reward = (scaled.round() as i64).max(1);
    reward.min(ctx.remaining_cap)
}

/// Cooldown in seconds after the jitter and season steps.
///
/// `jitter_sample` is a uniform draw in `[0, 1)` from the caller's RNG.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn adjusted_cooldown_seconds(
    base_seconds: i64,
    enforcement: EnforcementSignal,
    jitter_sample: f64,
    progress: f64,
) -> i64 {
    let base = base_seconds.max(0) as f64;
    let jitter_factor = sanitize_multiplier(enforcement.cooldown_jitter_factor, 10.0);
    let sample = sanitize_multiplier(jitter_sample, 1.0);
    let jittered = (base * jitter_factor).mul_add(sample, base);
    (jittered * season_cooldown_multiplier(progress)).round() as i64
}
