//! Live services of one season, wired to shared state.
//!
//! The shop records purchases into the same [`PurchaseLog`] the market
//! pressure regulator reads and the persistence job saves. Building both
//! from [`EconomyServices`] keeps them on one log.

use std::sync::Arc;
use std::time::Duration;

use economy_ledger::EconomyLedger;

use crate::clock::{SeasonClock, WallClock};
use crate::config::NotificationConfig;
use crate::emission::EmissionController;
use crate::faucet::Faucet;
use crate::jobs::{EconomyJobSet, PersistenceJob};
use crate::notify::NotificationQueue;
use crate::player::PlayerStore;
use crate::regulator::{MarketPressureRegulator, PurchaseHistory};
use crate::shop::{PurchaseLog, StarShop};
use crate::store::SnapshotStore;
use crate::throttle::AbuseSignals;
use crate::watchdog::InvariantWatchdog;

/// Player-facing services plus the state their background jobs share.
pub struct EconomyServices<P> {
    /// Reward claims.
    pub faucet: Faucet<P>,
    /// Star quotes and purchases.
    pub shop: StarShop<P>,
    ledger: Arc<EconomyLedger>,
    purchases: Arc<PurchaseLog>,
    season: SeasonClock,
    clock: Arc<dyn WallClock>,
}

impl<P: PlayerStore> EconomyServices<P> {
    /// Wire the faucet and shop to the ledger, the player store, and
    /// `purchases` (restored from the last snapshot, or empty).
    pub fn new(
        ledger: Arc<EconomyLedger>,
        players: Arc<P>,
        purchases: Arc<PurchaseLog>,
        signals: Arc<dyn AbuseSignals>,
        season: SeasonClock,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let faucet = Faucet::new(
            Arc::clone(&ledger),
            Arc::clone(&players),
            signals,
            season,
            Arc::clone(&clock),
        );
        let shop = StarShop::new(
            Arc::clone(&ledger),
            players,
            Arc::clone(&purchases),
            season,
            Arc::clone(&clock),
        );
        Self {
            faucet,
            shop,
            ledger,
            purchases,
            season,
            clock,
        }
    }

    /// The purchase log shared by the shop, the regulator, and persistence.
    pub const fn purchases(&self) -> &Arc<PurchaseLog> {
        &self.purchases
    }

    /// Regulator reading the shop's purchase log.
    pub fn regulator(
        &self,
        alerts: Option<NotificationQueue>,
        alert_dedup: Duration,
    ) -> MarketPressureRegulator {
        let history: Arc<dyn PurchaseHistory> = Arc::<PurchaseLog>::clone(&self.purchases);
        MarketPressureRegulator::new(
            Arc::clone(&self.ledger),
            history,
            Arc::clone(&self.clock),
            alerts,
            alert_dedup,
        )
    }

    /// The four ledger jobs, all over this season's shared state.
    pub fn job_set<S: SnapshotStore>(
        &self,
        store: Arc<S>,
        alerts: Option<&NotificationQueue>,
        config: &NotificationConfig,
    ) -> EconomyJobSet<S> {
        EconomyJobSet {
            emission: EmissionController::new(
                Arc::clone(&self.ledger),
                self.season,
                Arc::clone(&self.clock),
            ),
            regulator: self.regulator(
                alerts.cloned(),
                Duration::from_secs(config.pressure_alert_dedup_seconds),
            ),
            watchdog: InvariantWatchdog::new(
                Arc::clone(&self.ledger),
                alerts.cloned(),
                Duration::from_secs(config.invariant_alert_dedup_seconds),
            ),
            persistence: PersistenceJob::new(
                Arc::clone(&self.ledger),
                Arc::clone(&self.purchases),
                store,
                Arc::clone(&self.clock),
            ),
        }
    }
}
