//! Background timers for emission, regulation, watchdog, and persistence.
//!
//! Each job runs in its own tokio task on a `tokio::time::interval` and
//! mutates the ledger only through its locked operations. All tasks watch
//! one shutdown channel; on shutdown the persistence job writes a final
//! snapshot before exiting.
//!
//! Emission and regulation always tick once a minute because their
//! formulas are per-minute rates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use economy_ledger::EconomyLedger;

use crate::clock::WallClock;
use crate::config::JobsConfig;
use crate::emission::EmissionController;
use crate::regulator::MarketPressureRegulator;
use crate::shop::PurchaseLog;
use crate::store::{SnapshotStore, persist_ledger};
use crate::watchdog::InvariantWatchdog;

/// Cadence of the per-minute jobs.
pub const MINUTE: Duration = Duration::from_secs(60);

/// A unit of periodic background work.
pub trait PeriodicJob: Send + 'static {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Run one iteration.
    fn run(&mut self) -> impl Future<Output = ()> + Send;

    /// Run once after the shutdown signal.
    fn on_shutdown(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl PeriodicJob for EmissionController {
    fn name(&self) -> &'static str {
        "emission"
    }

    async fn run(&mut self) {
        self.tick();
    }
}

impl PeriodicJob for MarketPressureRegulator {
    fn name(&self) -> &'static str {
        "regulator"
    }

    async fn run(&mut self) {
        self.tick();
    }
}

impl PeriodicJob for InvariantWatchdog {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    async fn run(&mut self) {
        let _ = self.check();
    }
}

/// Periodically writes ledger snapshots to a [`SnapshotStore`].
pub struct PersistenceJob<S> {
    ledger: Arc<EconomyLedger>,
    purchases: Arc<PurchaseLog>,
    store: Arc<S>,
    clock: Arc<dyn WallClock>,
    consecutive_failures: u32,
}

impl<S: SnapshotStore> PersistenceJob<S> {
    /// Create the job.
    pub const fn new(
        ledger: Arc<EconomyLedger>,
        purchases: Arc<PurchaseLog>,
        store: Arc<S>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            ledger,
            purchases,
            store,
            clock,
            consecutive_failures: 0,
        }
    }

    /// Save one snapshot. Failures are logged and left for the next cycle.
    pub async fn save_once(&mut self) -> bool {
        let saved = persist_ledger(
            &self.ledger,
            &self.purchases,
            self.store.as_ref(),
            self.clock.now(),
        )
        .await;
        match saved {
            Ok(_) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        failures = self.consecutive_failures,
                        "ledger persistence recovered"
                    );
                }
                self.consecutive_failures = 0;
                true
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                tracing::warn!(
                    error = %e,
                    failures = self.consecutive_failures,
                    "ledger snapshot save failed, retrying next cycle"
                );
                false
            }
        }
    }
}

impl<S: SnapshotStore> PeriodicJob for PersistenceJob<S> {
    fn name(&self) -> &'static str {
        "persistence"
    }

    async fn run(&mut self) {
        self.save_once().await;
    }

    async fn on_shutdown(&mut self) {
        if self.save_once().await {
            tracing::info!("final ledger snapshot saved");
        }
    }
}

/// Spawn `job` on a fixed period until `shutdown` flips to `true`.
///
/// The first iteration runs one full period after spawning.
pub fn spawn_periodic<J: PeriodicJob>(
    mut job: J,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let now = tokio::time::Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(start, period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(job = job.name(), period_secs = period.as_secs(), "job started");

        loop {
            tokio::select! {
                _ = ticker.tick() => job.run().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        job.on_shutdown().await;
        tracing::debug!(job = job.name(), "job stopped");
    })
}

/// Handles to the running background jobs.
pub struct BackgroundJobs {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundJobs {
    /// Signal every job to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "background job panicked");
            }
        }
    }

    /// Number of running jobs.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no jobs are running.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// The ledger jobs of a running season.
pub struct EconomyJobSet<S> {
    /// Per-minute emission drip.
    pub emission: EmissionController,
    /// Per-minute market pressure regulation.
    pub regulator: MarketPressureRegulator,
    /// Invariant watchdog.
    pub watchdog: InvariantWatchdog,
    /// Snapshot persistence.
    pub persistence: PersistenceJob<S>,
}

/// Spawn every ledger job with the configured intervals.
pub fn spawn_background_jobs<S: SnapshotStore>(
    jobs: EconomyJobSet<S>,
    config: &JobsConfig,
) -> BackgroundJobs {
    let (shutdown, receiver) = watch::channel(false);
    let handles = vec![
        spawn_periodic(jobs.emission, MINUTE, receiver.clone()),
        spawn_periodic(jobs.regulator, MINUTE, receiver.clone()),
        spawn_periodic(
            jobs.watchdog,
            Duration::from_secs(config.watchdog_interval_seconds),
            receiver.clone(),
        ),
        spawn_periodic(
            jobs.persistence,
            Duration::from_secs(config.persistence_interval_seconds),
            receiver,
        ),
    ];
    tracing::info!(
        watchdog_interval_seconds = config.watchdog_interval_seconds,
        persistence_interval_seconds = config.persistence_interval_seconds,
        "background jobs started"
    );
    BackgroundJobs { shutdown, handles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SeasonClock};
    use crate::store::{MemorySnapshotStore, StoreError};
    use economy_types::{CalibrationParams, LedgerSnapshot};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ledger() -> Arc<EconomyLedger> {
        let Ok(ledger) = EconomyLedger::new(CalibrationParams::default()) else {
            unreachable!("default calibration is valid")
        };
        Arc::new(ledger)
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_767_571_200, 0).unwrap_or_default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn emission_job_drips_every_minute() {
        let ledger = ledger();
        let clock = clock();
        let controller = EmissionController::new(
            Arc::clone(&ledger),
            SeasonClock::new(clock.now()),
            clock,
        );
        let (shutdown, receiver) = watch::channel(false);
        let handle = spawn_periodic(controller, MINUTE, receiver);

        tokio::time::sleep(Duration::from_secs(5 * 60 + 30)).await;
        // 12000 per day is 8.33 coins per minute.
        assert_eq!(ledger.circulation().global_coin_pool, 41);

        let _ = shutdown.send(true);
        assert!(handle.await.is_ok());
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ledger.circulation().global_coin_pool, 41);
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_saves_on_shutdown() {
        let ledger = ledger();
        let store = Arc::new(MemorySnapshotStore::new());
        let purchases = Arc::new(PurchaseLog::new());
        purchases.record(clock().now(), 3);
        let job = PersistenceJob::new(
            Arc::clone(&ledger),
            Arc::clone(&purchases),
            Arc::clone(&store),
            clock(),
        );
        let (shutdown, receiver) = watch::channel(false);
        let handle = spawn_periodic(job, Duration::from_secs(3_600), receiver);

        ledger.accrue_emission(1_440 * 77);
        let _ = shutdown.send(true);
        assert!(handle.await.is_ok());

        let saved = store.load("season-1").await;
        assert!(matches!(saved, Ok(Some(ref s)) if s.global_coin_pool == 77));
        assert!(matches!(saved, Ok(Some(ref s)) if s.recent_purchases.len() == 1));
    }

    struct FlakyStore {
        attempts: AtomicU32,
        inner: MemorySnapshotStore,
    }

    impl SnapshotStore for FlakyStore {
        async fn load(&self, season_id: &str) -> Result<Option<LedgerSnapshot>, StoreError> {
            self.inner.load(season_id).await
        }

        async fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Backend("connection reset".to_owned()));
            }
            self.inner.save(snapshot).await
        }
    }

    #[tokio::test]
    async fn failed_save_is_retried_next_cycle() {
        let store = Arc::new(FlakyStore {
            attempts: AtomicU32::new(0),
            inner: MemorySnapshotStore::new(),
        });
        let mut job = PersistenceJob::new(
            ledger(),
            Arc::new(PurchaseLog::new()),
            Arc::clone(&store),
            clock(),
        );
        assert!(!job.save_once().await);
        assert_eq!(job.consecutive_failures, 1);
        assert!(job.save_once().await);
        assert_eq!(job.consecutive_failures, 0);
        assert!(matches!(store.load("season-1").await, Ok(Some(_))));
    }
}
