//! Periodic ledger invariant checks.
//!
//! The watchdog never corrects the ledger. A violation is logged at error
//! level and raised as a critical `economy/ledger_invariant` notification,
//! deduplicated so a persistent fault does not flood the sink.

use std::sync::Arc;
use std::time::Duration;

use economy_ledger::{EconomyLedger, InvariantReport, check_invariants};
use economy_types::InvariantSnapshot;

use crate::notify::{Notification, NotificationQueue, Priority};

/// Notification type raised on a violation.
pub const LEDGER_INVARIANT_ALERT: &str = "ledger_invariant";

/// Invariant watchdog for one ledger.
pub struct InvariantWatchdog {
    ledger: Arc<EconomyLedger>,
    alerts: Option<NotificationQueue>,
    alert_dedup: Duration,
}

impl InvariantWatchdog {
    /// Create a watchdog. Alerts are only raised when `alerts` is set.
    pub const fn new(
        ledger: Arc<EconomyLedger>,
        alerts: Option<NotificationQueue>,
        alert_dedup: Duration,
    ) -> Self {
        Self {
            ledger,
            alerts,
            alert_dedup,
        }
    }

    /// Check the live ledger.
    pub fn check(&self) -> InvariantReport {
        self.inspect(&self.ledger.invariant_snapshot())
    }

    /// Check a snapshot and report any violation.
    pub fn inspect(&self, snapshot: &InvariantSnapshot) -> InvariantReport {
        let report = check_invariants(snapshot);
        let InvariantReport::Violated(violations) = &report else {
            return report;
        };

        let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
        tracing::error!(
            season_id = %snapshot.season_id,
            violations = ?messages,
            global_coin_pool = snapshot.global_coin_pool,
            coins_distributed = snapshot.coins_distributed,
            market_pressure = snapshot.market_pressure,
            "ledger invariant violated"
        );

        if let Some(alerts) = &self.alerts {
            let notification = Notification::new(
                "economy",
                LEDGER_INVARIANT_ALERT,
                Priority::Critical,
                serde_json::json!({
                    "season_id": snapshot.season_id,
                    "violations": messages,
                    "snapshot": snapshot,
                }),
            )
            .with_dedup(
                format!("economy/{LEDGER_INVARIANT_ALERT}/{}", snapshot.season_id),
                self.alert_dedup,
            );
            if let Err(e) = alerts.enqueue(notification) {
                tracing::warn!(error = %e, "failed to queue invariant alert");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{MemorySink, spawn_notification_worker};
    use economy_types::CalibrationParams;

    fn ledger() -> Arc<EconomyLedger> {
        let Ok(ledger) = EconomyLedger::new(CalibrationParams::default()) else {
            unreachable!("default calibration is valid")
        };
        Arc::new(ledger)
    }

    fn corrupt(season_id: &str) -> InvariantSnapshot {
        InvariantSnapshot {
            season_id: season_id.to_owned(),
            global_coin_pool: 10,
            coins_distributed: 25,
            emission_remainder: 0.0,
            market_pressure: 2.5,
            price_floor: 10,
        }
    }

    #[test]
    fn healthy_ledger_passes() {
        let watchdog = InvariantWatchdog::new(ledger(), None, Duration::from_secs(60));
        assert!(watchdog.check().is_healthy());
    }

    #[tokio::test]
    async fn violation_raises_one_critical_alert() {
        let sink = MemorySink::new();
        let (queue, handle) = spawn_notification_worker(8, sink.clone());
        let watchdog =
            InvariantWatchdog::new(ledger(), Some(queue.clone()), Duration::from_secs(3_600));

        let report = watchdog.inspect(&corrupt("season-1"));
        let InvariantReport::Violated(violations) = report else {
            unreachable!("snapshot is corrupt")
        };
        assert_eq!(violations.len(), 2);

        // Repeated checks of the same fault are deduplicated.
        assert!(!watchdog.inspect(&corrupt("season-1")).is_healthy());
        assert_eq!(queue.stats().deduplicated, 1);

        drop(watchdog);
        drop(queue);
        assert!(handle.await.is_ok());
        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        let alert = delivered.first();
        assert_eq!(alert.map(|n| n.priority), Some(Priority::Critical));
        assert_eq!(alert.map(|n| n.kind.as_str()), Some(LEDGER_INVARIANT_ALERT));
    }

    #[test]
    fn watchdog_does_not_repair() {
        let ledger = ledger();
        let watchdog = InvariantWatchdog::new(Arc::clone(&ledger), None, Duration::from_secs(60));
        let before = ledger.invariant_snapshot();
        let _ = watchdog.inspect(&corrupt("season-1"));
        assert_eq!(ledger.invariant_snapshot(), before);
    }
}
