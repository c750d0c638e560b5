//! `Dragonfly` (Redis-compatible) ledger snapshot store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `economy:ledger:{season_id}` | JSON | Latest [`LedgerSnapshot`] for the season |

use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use economy_core::store::{SnapshotStore, StoreError};
use economy_types::LedgerSnapshot;

use crate::error::DbError;

/// Key holding the snapshot of `season_id`.
pub fn snapshot_key(season_id: &str) -> String {
    format!("economy:ledger:{season_id}")
}

/// Ledger snapshot store backed by a `Dragonfly` connection.
#[derive(Clone)]
pub struct DragonflySnapshotStore {
    client: Client,
}

impl DragonflySnapshotStore {
    /// Connect to the snapshot store at `url` (`redis://host:port[/db]`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an unparseable URL and
    /// [`DbError::Dragonfly`] when the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("bad snapshot store URL {url}: {e}")))?;
        let client = Builder::from_config(config).build()?;
        client.init().await?;
        tracing::info!(url, "snapshot store connected");
        Ok(Self { client })
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DbError::from)
    }

    /// Read the stored snapshot of `season_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read or deserialization fails.
    pub async fn load_snapshot(&self, season_id: &str) -> Result<Option<LedgerSnapshot>, DbError> {
        self.get_json(&snapshot_key(season_id)).await
    }

    /// Overwrite the stored snapshot of `snapshot.season_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the write fails.
    pub async fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), DbError> {
        self.set_json(&snapshot_key(&snapshot.season_id), snapshot)
            .await
    }

    /// Remove the stored snapshot of `season_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete_snapshot(&self, season_id: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(snapshot_key(season_id)).await?;
        Ok(())
    }
}

impl SnapshotStore for DragonflySnapshotStore {
    async fn load(&self, season_id: &str) -> Result<Option<LedgerSnapshot>, StoreError> {
        Ok(self.load_snapshot(season_id).await?)
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        Ok(self.save_snapshot(snapshot).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_season() {
        assert_eq!(snapshot_key("season-7"), "economy:ledger:season-7");
    }

    #[test]
    fn serialization_errors_keep_their_kind() {
        let Err(e) = serde_json::from_str::<LedgerSnapshot>("{") else {
            unreachable!("truncated JSON")
        };
        let store_err = StoreError::from(DbError::from(e));
        assert!(matches!(store_err, StoreError::Serialization(_)));
        let store_err = StoreError::from(DbError::Config("bad url".to_owned()));
        assert!(matches!(store_err, StoreError::Backend(ref m) if m.contains("bad url")));
    }
}
