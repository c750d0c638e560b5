//! Deterministic season-long Monte Carlo simulator.
//!
//! Replays the live pricing, emission, earn-cap, throttle, and regulator
//! models against a synthetic population at one-minute resolution, on a
//! private ledger that never touches the live one. A calibration must pass
//! this harness before it is promoted.
//!
//! Runs are single-threaded and fully determined by the seed;
//! [`run_many`] runs independent seeds in parallel.
//!
//! # Modules
//!
//! - [`archetype`] -- Synthetic player behaviors
//! - [`history`] -- Rolling purchase windows for the regulator
//! - [`report`] -- Report types and summary helpers
//! - [`simulator`] -- The minute loop

pub mod archetype;
pub mod history;
pub mod report;
pub mod simulator;

pub use report::{SimulationAssertions, SimulationReport};
pub use simulator::{run_many, run_season_simulation, run_with_seed};

use economy_ledger::LedgerError;
use economy_types::CalibrationError;

/// Errors that stop a simulation from running.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The calibration under test is invalid.
    #[error("invalid calibration: {source}")]
    Calibration {
        /// The underlying validation error.
        #[from]
        source: CalibrationError,
    },

    /// The private ledger could not be created.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },

    /// The configured population has no players.
    #[error("simulation population is empty")]
    EmptyPopulation,

    /// A parallel run panicked.
    #[error("simulation worker for seed {seed} panicked")]
    WorkerPanicked {
        /// Seed of the failed run.
        seed: u64,
    },
}
