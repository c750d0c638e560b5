//! Player record store with version-checked updates.
//!
//! Balances, daily-earn counters, and faucet cooldowns live in an external
//! store. Writers read a record, compute the new one, and commit it with
//! [`PlayerStore::compare_and_swap`], which only succeeds if nobody else
//! committed in between.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use economy_types::PlayerId;

use crate::earn_cap::DailyEarnTracker;

/// Errors from the player record store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerStoreError {
    /// No record exists for the player.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// A record already exists for the player.
    #[error("player {0} already exists")]
    AlreadyExists(PlayerId),

    /// The backing store failed.
    #[error("player store backend error: {0}")]
    Backend(String),
}

/// One player's economy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Player identifier.
    pub id: PlayerId,
    /// Coin balance.
    pub coins: i64,
    /// Stars owned.
    pub stars: i64,
    /// Coins earned on the current season day.
    pub daily_earn: DailyEarnTracker,
    /// Earliest next daily-login claim.
    pub next_daily_at: Option<DateTime<Utc>>,
    /// Earliest next activity claim.
    pub next_activity_at: Option<DateTime<Utc>>,
    /// Earliest next passive drip.
    pub next_drip_at: Option<DateTime<Utc>>,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Incremented by every committed update.
    pub version: u64,
}

impl PlayerRecord {
    /// A fresh account with no coins, stars, or cooldowns.
    pub const fn new(id: PlayerId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            coins: 0,
            stars: 0,
            daily_earn: DailyEarnTracker {
                day_index: 0,
                earned: 0,
            },
            next_daily_at: None,
            next_activity_at: None,
            next_drip_at: None,
            created_at,
            version: 0,
        }
    }
}

/// External player record store.
pub trait PlayerStore: Send + Sync + 'static {
    /// Fetch a player's record.
    fn get(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<PlayerRecord, PlayerStoreError>> + Send;

    /// Create a record. Fails if one exists.
    fn insert(
        &self,
        record: PlayerRecord,
    ) -> impl Future<Output = Result<(), PlayerStoreError>> + Send;

    /// Replace the record if its stored version still equals
    /// `expected_version`. The stored version becomes `expected_version + 1`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    fn compare_and_swap(
        &self,
        expected_version: u64,
        record: PlayerRecord,
    ) -> impl Future<Output = Result<bool, PlayerStoreError>> + Send;
}

/// In-memory player store.
#[derive(Debug, Default)]
pub struct MemoryPlayerStore {
    records: Mutex<HashMap<PlayerId, PlayerRecord>>,
}

impl MemoryPlayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored players.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no players.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlayerStore for MemoryPlayerStore {
    async fn get(&self, player: PlayerId) -> Result<PlayerRecord, PlayerStoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player)
            .cloned()
            .ok_or(PlayerStoreError::NotFound(player))
    }

    async fn insert(&self, record: PlayerRecord) -> Result<(), PlayerStoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.id) {
            return Err(PlayerStoreError::AlreadyExists(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        mut record: PlayerRecord,
    ) -> Result<bool, PlayerStoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = records.get_mut(&record.id) else {
            return Err(PlayerStoreError::NotFound(record.id));
        };
        if current.version != expected_version {
            return Ok(false);
        }
        record.version = expected_version.saturating_add(1);
        *current = record;
        Ok(true)
    }
}
