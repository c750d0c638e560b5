//! Ledger invariant verification.
//!
//! The watchdog periodically reads an [`InvariantSnapshot`] and runs
//! [`check_invariants`] over it. Violations are reported, never repaired:
//! they mean a logic bug upstream, and silently self-healing would hide it.
//!
//! # Invariants
//!
//! ```text
//! coins_distributed <= global_coin_pool
//! global_coin_pool - coins_distributed >= 0
//! 0.6 <= market_pressure <= 1.8
//! 0 <= emission_remainder < 1
//! price_floor >= 0
//! ```

use economy_types::{InvariantSnapshot, MARKET_PRESSURE_MAX, MARKET_PRESSURE_MIN};

/// A single broken invariant, with the values observed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// More coins were distributed than were ever minted.
    #[error("coins_distributed ({distributed}) exceeds global_coin_pool ({pool})")]
    DistributedExceedsPool {
        /// Observed pool.
        pool: i64,
        /// Observed distributed total.
        distributed: i64,
    },

    /// The pool total went negative.
    #[error("global_coin_pool is negative ({0})")]
    NegativePool(i64),

    /// The distributed total went negative.
    #[error("coins_distributed is negative ({0})")]
    NegativeDistributed(i64),

    /// Market pressure escaped its bounds.
    #[error("market_pressure {0} outside [0.6, 1.8]")]
    PressureOutOfBounds(f64),

    /// The emission accumulator left `[0, 1)`.
    #[error("emission_remainder {0} outside [0, 1)")]
    RemainderOutOfRange(f64),

    /// The price floor went negative.
    #[error("price_floor is negative ({0})")]
    NegativePriceFloor(i64),
}

/// Outcome of an invariant check.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantReport {
    /// Every invariant holds.
    Healthy,
    /// One or more invariants are broken.
    Violated(Vec<InvariantViolation>),
}

impl InvariantReport {
    /// Whether every invariant holds.
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Check every ledger invariant against the snapshot.
pub fn check_invariants(snapshot: &InvariantSnapshot) -> InvariantReport {
    let mut violations = Vec::new();

    if snapshot.global_coin_pool < 0 {
        violations.push(InvariantViolation::NegativePool(snapshot.global_coin_pool));
    }
    if snapshot.coins_distributed < 0 {
        violations.push(InvariantViolation::NegativeDistributed(
            snapshot.coins_distributed,
        ));
    }
    if snapshot.coins_distributed > snapshot.global_coin_pool {
        violations.push(InvariantViolation::DistributedExceedsPool {
            pool: snapshot.global_coin_pool,
            distributed: snapshot.coins_distributed,
        });
    }
    if !(MARKET_PRESSURE_MIN..=MARKET_PRESSURE_MAX).contains(&snapshot.market_pressure) {
        violations.push(InvariantViolation::PressureOutOfBounds(
            snapshot.market_pressure,
        ));
    }
    if !(0.0..1.0).contains(&snapshot.emission_remainder) {
        violations.push(InvariantViolation::RemainderOutOfRange(
            snapshot.emission_remainder,
        ));
    }
    if snapshot.price_floor < 0 {
        violations.push(InvariantViolation::NegativePriceFloor(snapshot.price_floor));
    }

    if violations.is_empty() {
        InvariantReport::Healthy
    } else {
        InvariantReport::Violated(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> InvariantSnapshot {
        InvariantSnapshot {
            season_id: "season-1".to_owned(),
            global_coin_pool: 1_000,
            coins_distributed: 400,
            emission_remainder: 0.5,
            market_pressure: 1.0,
            price_floor: 10,
        }
    }

    #[test]
    fn healthy_snapshot_passes() {
        assert_eq!(check_invariants(&healthy()), InvariantReport::Healthy);
    }

    #[test]
    fn pool_exactly_exhausted_is_healthy() {
        let snap = InvariantSnapshot {
            coins_distributed: 1_000,
            ..healthy()
        };
        assert!(check_invariants(&snap).is_healthy());
    }

    #[test]
    fn over_distribution_is_reported() {
        let snap = InvariantSnapshot {
            coins_distributed: 1_001,
            ..healthy()
        };
        assert_eq!(
            check_invariants(&snap),
            InvariantReport::Violated(vec![InvariantViolation::DistributedExceedsPool {
                pool: 1_000,
                distributed: 1_001
            }])
        );
    }

    #[test]
    fn multiple_violations_are_collected() {
        let snap = InvariantSnapshot {
            global_coin_pool: -5,
            coins_distributed: 0,
            market_pressure: 2.5,
            emission_remainder: 1.0,
            ..healthy()
        };
        let InvariantReport::Violated(violations) = check_invariants(&snap) else {
            unreachable!("snapshot is corrupt");
        };
        assert!(violations.contains(&InvariantViolation::NegativePool(-5)));
        assert!(violations.contains(&InvariantViolation::PressureOutOfBounds(2.5)));
        assert!(violations.contains(&InvariantViolation::RemainderOutOfRange(1.0)));
        assert!(violations.contains(&InvariantViolation::DistributedExceedsPool {
            pool: -5,
            distributed: 0
        }));
    }

    #[test]
    fn nan_pressure_is_a_violation() {
        let snap = InvariantSnapshot {
            market_pressure: f64::NAN,
            ..healthy()
        };
        assert!(!check_invariants(&snap).is_healthy());
    }

    #[test]
    fn violation_messages_name_the_field() {
        let msg = InvariantViolation::PressureOutOfBounds(0.1).to_string();
        assert!(msg.contains("market_pressure"));
    }
}
