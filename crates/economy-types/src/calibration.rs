//! Versioned calibration constants for pricing, emission, and earn caps.
//!
//! A [`CalibrationParams`] value is immutable once published. Admins replace
//! the whole struct at once (see `EconomyLedger::set_calibration`); no field is
//! ever mutated in place. Every replacement must pass [`CalibrationParams::validate`].

use serde::{Deserialize, Serialize};

/// Errors produced when a calibration set violates its invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// The late-season earn cap exceeds the early-season cap.
    #[error("daily_cap_late ({late}) must not exceed daily_cap_early ({early})")]
    CapBoundsInverted {
        /// Configured early-season cap.
        early: i64,
        /// Configured late-season cap.
        late: i64,
    },

    /// A multiplicative exponent is negative.
    #[error("exponent {name} must be non-negative, got {value}")]
    NegativeExponent {
        /// Name of the offending field.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// A field that must be strictly positive is zero or negative.
    #[error("{name} must be strictly positive")]
    NotPositive {
        /// Name of the offending field.
        name: &'static str,
    },

    /// A floating point field is NaN or infinite.
    #[error("{name} must be a finite number")]
    NotFinite {
        /// Name of the offending field.
        name: &'static str,
    },

    /// The hope threshold is not a fraction.
    #[error("hope_threshold must be within [0, 1], got {0}")]
    HopeThresholdOutOfRange(f64),

    /// The season identifier is empty.
    #[error("season_id must not be empty")]
    EmptySeasonId,
}

/// Tunable constants governing pricing, emission, and earn caps.
///
/// Field names follow the economy design notes: `p0` is the base star
/// price, `c_base` the base daily emission, `alpha`/`s_scale`/`g_scale`
/// shape the scarcity and circulation curves, `beta` the late-season
/// spike, and `gamma` the quadratic bulk-purchase markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Monotonic version number of this calibration set.
    pub version: u32,
    /// Season this calibration applies to.
    pub season_id: String,
    /// Base star price in coins.
    pub p0: i64,
    /// Base daily emission into the global coin pool.
    pub c_base: i64,
    /// Time multiplier strength (`1 + alpha * progress^2`).
    pub alpha: f64,
    /// Stars purchased per unit of scarcity multiplier.
    pub s_scale: f64,
    /// Circulation scale damping emission as coins accumulate.
    pub g_scale: f64,
    /// Exponent of the late-season price spike.
    pub beta: f64,
    /// Quadratic per-unit markup for bulk purchases.
    pub gamma: f64,
    /// Coins granted by the daily login faucet.
    pub daily_login_reward: i64,
    /// Hours between daily login rewards.
    pub daily_login_cooldown_hours: i64,
    /// Coins granted by the activity faucet.
    pub activity_reward: i64,
    /// Seconds between activity rewards.
    pub activity_cooldown_seconds: i64,
    /// Per-player daily earn ceiling at season start.
    pub daily_cap_early: i64,
    /// Per-player daily earn ceiling at season end.
    pub daily_cap_late: i64,
    /// Coins granted per passive drip to an active player.
    pub passive_drip_amount: i64,
    /// Minutes between passive drips.
    pub passive_drip_interval_minutes: i64,
    /// Minimum fraction of late joiners that must reach a first star.
    pub hope_threshold: f64,
    /// Seed for the season simulator.
    pub seed: u64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            version: 1,
            season_id: "season-1".to_owned(),
            p0: 10,
            c_base: 12_000,
            alpha: 1.5,
            s_scale: 400.0,
            g_scale: 25_000.0,
            beta: 2.0,
            gamma: 0.05,
            daily_login_reward: 20,
            daily_login_cooldown_hours: 20,
            activity_reward: 5,
            activity_cooldown_seconds: 300,
            daily_cap_early: 100,
            daily_cap_late: 40,
            passive_drip_amount: 1,
            passive_drip_interval_minutes: 15,
            hope_threshold: 0.6,
            seed: 42,
        }
    }
}

impl CalibrationParams {
    /// Check every invariant of the calibration set.
    ///
    /// # Errors
    ///
    /// Returns the first [`CalibrationError`] encountered.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.season_id.trim().is_empty() {
            return Err(CalibrationError::EmptySeasonId);
        }

        for (name, value) in [
            ("alpha", self.alpha),
            ("s_scale", self.s_scale),
            ("g_scale", self.g_scale),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("hope_threshold", self.hope_threshold),
        ] {
            if !value.is_finite() {
                return Err(CalibrationError::NotFinite { name });
            }
        }

        for (name, value) in [("alpha", self.alpha), ("beta", self.beta), ("gamma", self.gamma)] {
            if value < 0.0 {
                return Err(CalibrationError::NegativeExponent { name, value });
            }
        }

        if self.s_scale <= 0.0 {
            return Err(CalibrationError::NotPositive { name: "s_scale" });
        }
        if self.g_scale <= 0.0 {
            return Err(CalibrationError::NotPositive { name: "g_scale" });
        }

        for (name, value) in [
            ("p0", self.p0),
            ("c_base", self.c_base),
            ("daily_cap_early", self.daily_cap_early),
            ("daily_cap_late", self.daily_cap_late),
            ("daily_login_cooldown_hours", self.daily_login_cooldown_hours),
            ("activity_cooldown_seconds", self.activity_cooldown_seconds),
            ("passive_drip_interval_minutes", self.passive_drip_interval_minutes),
        ] {
            if value <= 0 {
                return Err(CalibrationError::NotPositive { name });
            }
        }

        if self.daily_cap_late > self.daily_cap_early {
            return Err(CalibrationError::CapBoundsInverted {
                early: self.daily_cap_early,
                late: self.daily_cap_late,
            });
        }

        if !(0.0..=1.0).contains(&self.hope_threshold) {
            return Err(CalibrationError::HopeThresholdOutOfRange(self.hope_threshold));
        }

        Ok(())
    }
}
