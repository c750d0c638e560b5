//! Durable ledger snapshot store.
//!
//! The ledger is copied under its lock and written outside it, so store
//! latency never blocks gameplay. The shop's purchase log rides along in
//! the same snapshot. A failed save is logged by the caller and
//! retried on the next persistence cycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use economy_ledger::EconomyLedger;
use economy_types::LedgerSnapshot;

use crate::shop::PurchaseLog;

/// Snapshot store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("snapshot store backend error: {0}")]
    Backend(String),

    /// A stored snapshot could not be decoded.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key/value store for ledger snapshots, keyed by season id.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Load the latest snapshot for `season_id`, if any.
    fn load(
        &self,
        season_id: &str,
    ) -> impl Future<Output = Result<Option<LedgerSnapshot>, StoreError>> + Send;

    /// Replace the stored snapshot for `snapshot.season_id`.
    fn save(
        &self,
        snapshot: &LedgerSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory snapshot store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, LedgerSnapshot>>,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, season_id: &str) -> Result<Option<LedgerSnapshot>, StoreError> {
        Ok(self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(season_id)
            .cloned())
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.season_id.clone(), snapshot.clone());
        Ok(())
    }
}

/// Copy the ledger and the purchase log and write the copy to `store`.
pub async fn persist_ledger<S: SnapshotStore>(
    ledger: &EconomyLedger,
    purchases: &PurchaseLog,
    store: &S,
    now: DateTime<Utc>,
) -> Result<LedgerSnapshot, StoreError> {
    let mut snapshot = ledger.persistence_snapshot(now);
    snapshot.recent_purchases = purchases.entries();
    store.save(&snapshot).await?;
    tracing::debug!(
        season_id = %snapshot.season_id,
        global_coin_pool = snapshot.global_coin_pool,
        coins_distributed = snapshot.coins_distributed,
        recent_purchases = snapshot.recent_purchases.len(),
        "ledger snapshot saved"
    );
    Ok(snapshot)
}
