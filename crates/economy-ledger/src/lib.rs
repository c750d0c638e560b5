//! Lock-guarded season ledger for the coin and star economy.
//!
//! One [`EconomyLedger`] exists per running season. It is the single source
//! of truth for the coin pool, distributed coins, stars purchased, market
//! pressure, and the price floor ratchet. Request handlers and background
//! jobs share it through an `Arc` and mutate it only through its methods.
//!
//! # Modules
//!
//! - [`ledger`] -- The [`EconomyLedger`] and its [`CirculationView`].
//! - [`invariants`] -- Invariant checks run by the watchdog.
//!
//! # Locking
//!
//! Every operation takes the single internal mutex exactly once for its
//! whole read-modify-write and never performs I/O while holding it.
//! Readers and writers share the same lock because the invariants span
//! several fields at once.
//!
//! ```
//! use economy_ledger::EconomyLedger;
//! use economy_types::CalibrationParams;
//!
//! let ledger = EconomyLedger::new(CalibrationParams::default()).ok();
//! if let Some(ledger) = ledger {
//!     // Nothing has been minted yet, so no grant can succeed.
//!     assert!(!ledger.try_distribute_coins(5));
//!     ledger.accrue_emission(14_400);
//!     assert!(ledger.try_distribute_coins(5));
//! }
//! ```

pub mod invariants;
pub mod ledger;

// Re-export primary types at crate root.
pub use invariants::{InvariantReport, InvariantViolation, check_invariants};
pub use ledger::{CirculationView, EconomyLedger};

use economy_types::CalibrationError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when constructing or reconfiguring a ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The supplied calibration failed validation.
    #[error("invalid calibration: {source}")]
    Calibration {
        /// The underlying validation error.
        #[from]
        source: CalibrationError,
    },

    /// A calibration or snapshot belongs to a different season.
    #[error("season mismatch: ledger is {expected}, got {actual}")]
    SeasonMismatch {
        /// Season of the ledger.
        expected: String,
        /// Season of the rejected input.
        actual: String,
    },

    /// A persisted snapshot violates the ledger invariants.
    #[error("corrupt ledger snapshot for season {season_id}: {reason}")]
    CorruptSnapshot {
        /// Season of the rejected snapshot.
        season_id: String,
        /// Which invariant was violated.
        reason: String,
    },
}
