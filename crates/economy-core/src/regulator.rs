//! Market pressure feedback from purchase velocity.
//!
//! Once a minute the regulator compares the trailing 24h purchase count
//! with the trailing 7d daily average and nudges the ledger's market
//! pressure toward a desired value:
//!
//! ```text
//! longTerm = max(last7d / 7, 1)
//! ratio    = last24h / longTerm
//! desired  = 1 + min(0.8, 0.25 * (ratio - 1))   if ratio >= 1
//!          = 1 - min(0.3, 0.15 * (1 - ratio))   otherwise
//! ```
//!
//! The ledger moves at most [`MAX_PRESSURE_DELTA_PER_TICK`] per tick, which
//! caps drift at 0.02 per hour.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use economy_ledger::EconomyLedger;

use crate::clock::WallClock;
use crate::notify::{Notification, NotificationQueue, Priority};

/// Largest pressure change per one-minute tick.
pub const MAX_PRESSURE_DELTA_PER_TICK: f64 = 0.02 / 60.0;

/// Crossing this pressure upward raises an alert.
pub const HIGH_PRESSURE_ALERT: f64 = 1.5;

/// Crossing this pressure downward raises an alert.
pub const LOW_PRESSURE_ALERT: f64 = 0.8;

const MAX_RAISE: f64 = 0.8;
const RAISE_SLOPE: f64 = 0.25;
const MAX_DROP: f64 = 0.3;
const DROP_SLOPE: f64 = 0.15;

/// Star purchases in the trailing windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCounts {
    /// Stars bought in the last 24 hours.
    pub last_24h: u64,
    /// Stars bought in the last 7 days.
    pub last_7d: u64,
}

/// Source of recent purchase counts for the current season.
pub trait PurchaseHistory: Send + Sync {
    /// Purchases in the trailing 24h and 7d windows ending at `now`.
    fn purchase_counts(&self, now: DateTime<Utc>) -> PurchaseCounts;
}

/// Pressure the regulator steers toward for the given purchase velocity.
#[allow(clippy::cast_precision_loss)]
pub fn desired_pressure(counts: PurchaseCounts) -> f64 {
    let long_term_daily = (counts.last_7d as f64 / 7.0).max(1.0);
    let ratio = counts.last_24h as f64 / long_term_daily;
    if ratio >= 1.0 {
        1.0 + (RAISE_SLOPE * (ratio - 1.0)).min(MAX_RAISE)
    } else {
        1.0 - (DROP_SLOPE * (1.0 - ratio)).min(MAX_DROP)
    }
}

/// Threshold crossed by a pressure update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureCrossing {
    /// Rose to or above [`HIGH_PRESSURE_ALERT`].
    High,
    /// Fell to or below [`LOW_PRESSURE_ALERT`].
    Low,
}

impl PressureCrossing {
    /// Notification type for this crossing.
    pub const fn kind(self) -> &'static str {
        match self {
            Self::High => "market_pressure_high",
            Self::Low => "market_pressure_low",
        }
    }
}

/// Detect an alert threshold crossing between two pressure readings.
pub fn detect_crossing(previous: f64, current: f64) -> Option<PressureCrossing> {
    if previous < HIGH_PRESSURE_ALERT && current >= HIGH_PRESSURE_ALERT {
        Some(PressureCrossing::High)
    } else if previous > LOW_PRESSURE_ALERT && current <= LOW_PRESSURE_ALERT {
        Some(PressureCrossing::Low)
    } else {
        None
    }
}

/// Result of one regulator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegulatorTick {
    /// Purchase counts the tick was based on.
    pub counts: PurchaseCounts,
    /// Pressure the regulator steered toward.
    pub desired: f64,
    /// Pressure before the tick.
    pub previous: f64,
    /// Pressure after the tick.
    pub pressure: f64,
    /// Threshold crossed by this tick, if any.
    pub crossing: Option<PressureCrossing>,
}

/// Periodic job adjusting the ledger's market pressure.
pub struct MarketPressureRegulator {
    ledger: Arc<EconomyLedger>,
    history: Arc<dyn PurchaseHistory>,
    clock: Arc<dyn WallClock>,
    alerts: Option<NotificationQueue>,
    alert_dedup: Duration,
}

impl MarketPressureRegulator {
    /// Create a regulator. Alerts are only raised when `alerts` is set.
    pub const fn new(
        ledger: Arc<EconomyLedger>,
        history: Arc<dyn PurchaseHistory>,
        clock: Arc<dyn WallClock>,
        alerts: Option<NotificationQueue>,
        alert_dedup: Duration,
    ) -> Self {
        Self {
            ledger,
            history,
            clock,
            alerts,
            alert_dedup,
        }
    }

    /// Run one regulation step.
    pub fn tick(&self) -> RegulatorTick {
        let counts = self.history.purchase_counts(self.clock.now());
        let desired = desired_pressure(counts);
        let previous = self.ledger.market_pressure();
        let pressure = self
            .ledger
            .update_market_pressure(desired, MAX_PRESSURE_DELTA_PER_TICK);
        let crossing = detect_crossing(previous, pressure);

        tracing::debug!(
            last_24h = counts.last_24h,
            last_7d = counts.last_7d,
            desired,
            pressure,
            "market pressure tick"
        );

        if let Some(crossing) = crossing {
            self.raise_alert(crossing, pressure, counts);
        }

        RegulatorTick {
            counts,
            desired,
            previous,
            pressure,
            crossing,
        }
    }

    fn raise_alert(&self, crossing: PressureCrossing, pressure: f64, counts: PurchaseCounts) {
        tracing::warn!(kind = crossing.kind(), pressure, "market pressure threshold crossed");
        let Some(alerts) = &self.alerts else {
            return;
        };
        let season_id = self.ledger.season_id();
        let notification = Notification::new(
            "economy",
            crossing.kind(),
            Priority::High,
            serde_json::json!({
                "season_id": season_id,
                "pressure": pressure,
                "last_24h": counts.last_24h,
                "last_7d": counts.last_7d,
            }),
        )
        .with_dedup(
            format!("economy/{}/{season_id}", crossing.kind()),
            self.alert_dedup,
        );
        if let Err(e) = alerts.enqueue(notification) {
            tracing::warn!(error = %e, "failed to queue market pressure alert");
        }
    }
}
