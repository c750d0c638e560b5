//! Season economy engine binary.
//!
//! Owns the live [`EconomyLedger`] for one season and runs its background
//! jobs until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `economy-config.yaml`
//! 3. Connect to Dragonfly
//! 4. Restore the ledger and its purchase log from the season snapshot, or
//!    start a new one
//! 5. Wire the faucet, shop, and regulator to the shared purchase log
//! 6. Start the notification worker
//! 7. Start emission, regulator, watchdog, and persistence jobs
//! 8. Wait for Ctrl-C, then stop the jobs (final save) and drain notifications

mod error;

use std::path::Path;
use std::sync::Arc;

use economy_core::clock::{SeasonClock, SystemClock, WallClock};
use economy_core::config::EconomyConfig;
use economy_core::jobs::spawn_background_jobs;
use economy_core::notify::{LogSink, spawn_notification_worker};
use economy_core::player::MemoryPlayerStore;
use economy_core::regulator::PurchaseHistory;
use economy_core::services::EconomyServices;
use economy_core::shop::PurchaseLog;
use economy_core::throttle::NoAbuseSignals;
use economy_db::DragonflySnapshotStore;
use economy_ledger::EconomyLedger;
use economy_types::CalibrationParams;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_PATH: &str = "economy-config.yaml";

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // Configuration comes first so the log level can follow it.
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        season_id = %config.calibration.season_id,
        calibration_version = config.calibration.version,
        season_start = %config.season.start,
        "economy-engine starting"
    );

    let wall: Arc<dyn WallClock> = Arc::new(SystemClock);
    let season = SeasonClock::new(config.season.start);
    if season.is_over(wall.now()) {
        tracing::warn!(
            season_start = %config.season.start,
            "season already ended, emission will stay at zero"
        );
    }

    info!(dragonfly_url = %config.infrastructure.dragonfly_url, "Connecting to Dragonfly");
    let store = Arc::new(DragonflySnapshotStore::connect(&config.infrastructure.dragonfly_url).await?);

    let (ledger, purchases) = restore_ledger(&store, config.calibration.clone()).await?;
    let ledger = Arc::new(ledger);
    let view = ledger.circulation();
    let counts = purchases.purchase_counts(wall.now());
    info!(
        global_coin_pool = view.global_coin_pool,
        coins_distributed = view.coins_distributed,
        stars_purchased = view.stars_purchased,
        price_floor = view.price_floor,
        market_pressure = view.market_pressure,
        purchases_24h = counts.last_24h,
        purchases_7d = counts.last_7d,
        "Ledger ready"
    );

    // Player records and abuse signals belong to the game backend; until one
    // is mounted the engine serves from memory with no enforcement.
    let services = EconomyServices::new(
        Arc::clone(&ledger),
        Arc::new(MemoryPlayerStore::new()),
        Arc::new(purchases),
        Arc::new(NoAbuseSignals),
        season,
        Arc::clone(&wall),
    );

    let (alerts, notifier) =
        spawn_notification_worker(config.notifications.queue_capacity, LogSink);

    let jobs = services.job_set(store, Some(&alerts), &config.notifications);
    let background = spawn_background_jobs(jobs, &config.jobs);
    info!(jobs = background.len(), "economy-engine running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    background.shutdown().await;

    // The worker exits once every queue handle is gone.
    let stats = alerts.stats();
    drop(alerts);
    if let Err(e) = notifier.await {
        tracing::warn!(error = %e, "notification worker ended abnormally");
    }

    info!(
        notifications_queued = stats.queued,
        notifications_dropped = stats.dropped,
        "economy-engine shutdown complete"
    );
    Ok(())
}

/// Load the economy configuration from `economy-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<EconomyConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(EconomyConfig::from_file(config_path)?)
    } else {
        Ok(EconomyConfig::default())
    }
}

/// Rebuild the season ledger and purchase log from the latest snapshot, or
/// create new ones.
///
/// A snapshot that fails the invariant checks aborts startup.
async fn restore_ledger(
    store: &DragonflySnapshotStore,
    calibration: CalibrationParams,
) -> Result<(EconomyLedger, PurchaseLog), EngineError> {
    match store.load_snapshot(&calibration.season_id).await? {
        Some(snapshot) => {
            info!(
                season_id = %snapshot.season_id,
                taken_at = %snapshot.taken_at,
                recent_purchases = snapshot.recent_purchases.len(),
                "Restoring ledger from snapshot"
            );
            let ledger = EconomyLedger::from_snapshot(&snapshot, calibration)?;
            Ok((ledger, PurchaseLog::from_entries(&snapshot.recent_purchases)))
        }
        None => {
            info!(season_id = %calibration.season_id, "No snapshot found, starting a new ledger");
            Ok((EconomyLedger::new(calibration)?, PurchaseLog::new()))
        }
    }
}
