//! Durable ledger snapshots on `Dragonfly` (Redis-compatible).
//!
//! The live ledger is copied under its lock and written here outside it on
//! every persistence cycle and once more at shutdown. On startup the engine
//! loads the latest snapshot for the configured season and rebuilds the
//! ledger from it.
//!
//! # Modules
//!
//! - [`dragonfly`] -- [`SnapshotStore`](economy_core::store::SnapshotStore) on `Dragonfly`
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;

pub use dragonfly::{DragonflySnapshotStore, snapshot_key};
pub use error::DbError;
