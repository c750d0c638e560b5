//! Pricing, emission, earn caps, regulation, and background jobs for the
//! season economy.
//!
//! The pure models in this crate take a ledger view plus the calibration
//! and return numbers; the services wire those models to the shared
//! [`EconomyLedger`](economy_ledger::EconomyLedger) and to the external
//! collaborators (player store, abuse signals, notification sink, snapshot
//! store, wall clock).
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `economy-config.yaml`.
//! - [`clock`] -- Season clock and the [`WallClock`](clock::WallClock) trait.
//! - [`pricing`] -- Star price and bulk purchase cost.
//! - [`emission`] -- Effective daily emission target and the per-minute drip.
//! - [`earn_cap`] -- Per-player daily earn ceiling and season-day resets.
//! - [`regulator`] -- Market pressure feedback from purchase velocity.
//! - [`throttle`] -- Reward and cooldown adjustment chains.
//! - [`player`] -- Player record store with compare-and-swap updates.
//! - [`faucet`] -- Reward claims (daily login, activity, passive drip).
//! - [`shop`] -- Star quotes and purchases.
//! - [`services`] -- Faucet, shop, and ledger jobs wired to one purchase log.
//! - [`notify`] -- Bounded, deduplicating notification queue.
//! - [`watchdog`] -- Periodic ledger invariant checks.
//! - [`store`] -- Durable ledger snapshot store trait.
//! - [`jobs`] -- Background timers for emission, regulation, watchdog, and persistence.
//! - [`admin`] -- Admin economy-mutation route table.

pub mod admin;
pub mod clock;
pub mod config;
pub mod earn_cap;
pub mod emission;
pub mod faucet;
pub mod jobs;
pub mod notify;
pub mod player;
pub mod pricing;
pub mod regulator;
pub mod services;
pub mod shop;
pub mod store;
pub mod throttle;
pub mod watchdog;
