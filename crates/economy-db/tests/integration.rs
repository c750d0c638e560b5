//! Integration tests for the `Dragonfly` snapshot store.
//!
//! These tests require a live Dragonfly instance. Run with:
//!
//! ```bash
//! docker compose up -d
//! cargo test -p economy-db -- --ignored
//! docker compose down
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::Utc;
use economy_core::shop::PurchaseLog;
use economy_core::store::{SnapshotStore, persist_ledger};
use economy_db::DragonflySnapshotStore;
use economy_ledger::EconomyLedger;
use economy_types::CalibrationParams;

/// Dragonfly connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

async fn connect() -> DragonflySnapshotStore {
    DragonflySnapshotStore::connect(DRAGONFLY_URL)
        .await
        .expect("Failed to connect to Dragonfly -- is Docker running?")
}

fn params(season_id: &str) -> CalibrationParams {
    CalibrationParams {
        season_id: season_id.to_owned(),
        ..CalibrationParams::default()
    }
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn snapshot_round_trip_restores_ledger() {
    let store = connect().await;
    let season = "it-round-trip";
    store.delete_snapshot(season).await.unwrap();

    let ledger = EconomyLedger::new(params(season)).unwrap();
    ledger.accrue_emission(1_440 * 1_000);
    assert!(ledger.try_distribute_coins(400));
    ledger.record_star_purchase(3);
    ledger.apply_price_floor(17);
    ledger.update_market_pressure(1.8, 0.1);

    let purchases = PurchaseLog::new();
    purchases.record(Utc::now(), 3);

    persist_ledger(&ledger, &purchases, &store, Utc::now()).await.unwrap();
    let snapshot = store.load(season).await.unwrap().expect("snapshot saved");
    let restored = EconomyLedger::from_snapshot(&snapshot, params(season)).unwrap();
    assert_eq!(restored.invariant_snapshot(), ledger.invariant_snapshot());
    assert_eq!(restored.circulation().stars_purchased, 3);
    assert_eq!(
        PurchaseLog::from_entries(&snapshot.recent_purchases).entries(),
        purchases.entries()
    );

    store.delete_snapshot(season).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn missing_season_loads_none() {
    let store = connect().await;
    store.delete_snapshot("it-missing").await.unwrap();
    assert!(store.load("it-missing").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn later_save_replaces_earlier() {
    let store = connect().await;
    let season = "it-replace";
    let ledger = EconomyLedger::new(params(season)).unwrap();

    persist_ledger(&ledger, &PurchaseLog::new(), &store, Utc::now()).await.unwrap();
    ledger.accrue_emission(1_440 * 50);
    persist_ledger(&ledger, &PurchaseLog::new(), &store, Utc::now()).await.unwrap();

    let snapshot = store.load(season).await.unwrap().unwrap();
    assert_eq!(snapshot.global_coin_pool, 50);
    store.delete_snapshot(season).await.unwrap();
}
