//! Shared type definitions for the season coin and star economy.
//!
//! This crate is the single source of truth for the data that crosses
//! crate boundaries: the versioned calibration constants, the season
//! timeline, player identifiers, and the point-in-time copies of ledger
//! state used for persistence and invariant checking.
//!
//! # Modules
//!
//! - [`calibration`] -- [`CalibrationParams`] and its validation rules
//! - [`season`] -- Season length constants, progress and day-index helpers
//! - [`ids`] -- Type-safe UUID wrappers for players and purchases
//! - [`snapshot`] -- Persisted [`LedgerSnapshot`], [`PurchaseEntry`], and [`InvariantSnapshot`]

pub mod calibration;
pub mod ids;
pub mod season;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use calibration::{CalibrationError, CalibrationParams};
pub use ids::{PlayerId, PurchaseId};
pub use season::{
    MARKET_PRESSURE_MAX, MARKET_PRESSURE_MIN, MINUTES_PER_DAY, SEASON_LENGTH_DAYS,
    SEASON_LENGTH_MINUTES, SEASON_LENGTH_SECONDS, SECONDS_PER_DAY, clamp_market_pressure,
    season_day_index, season_progress,
};
pub use snapshot::{InvariantSnapshot, LedgerSnapshot, PurchaseEntry};
