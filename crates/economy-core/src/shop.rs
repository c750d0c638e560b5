//! Star quotes and purchases.
//!
//! The unit price shown to players is ratcheted through the ledger's price
//! floor, and multi-star orders pay the bulk markup. Coins spent on stars
//! are burned: they leave the player's wallet and never return to the
//! pool.
//!
//! Every purchase is appended to the shop's [`PurchaseLog`], the same log
//! the market pressure regulator reads. The log travels with the ledger
//! snapshot so a restart keeps the trailing week.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use economy_ledger::EconomyLedger;
use economy_types::{PlayerId, PurchaseEntry, PurchaseId};

use crate::clock::{SeasonClock, WallClock};
use crate::player::{PlayerStore, PlayerStoreError};
use crate::pricing::{PriceInputs, bulk_star_cost, live_star_price};
use crate::regulator::{PurchaseCounts, PurchaseHistory};

/// Compare-and-swap attempts before a purchase gives up.
pub const MAX_PURCHASE_ATTEMPTS: u32 = 3;

/// Largest number of stars in one order. Bulk pricing walks every star.
pub const MAX_ORDER_QUANTITY: i64 = 1_000;

/// Purchase failures.
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    /// Orders must be for 1 to [`MAX_ORDER_QUANTITY`] stars.
    #[error("invalid star quantity {0}")]
    InvalidQuantity(i64),

    /// The season has ended; the shop is closed.
    #[error("season is over")]
    SeasonOver,

    /// The player cannot afford the order.
    #[error("insufficient coins: need {needed}, have {balance}")]
    InsufficientFunds {
        /// Order cost.
        needed: i64,
        /// Player balance.
        balance: i64,
    },

    /// The price rose above the caller's limit.
    #[error("price moved: order costs {actual}, limit was {limit}")]
    PriceMoved {
        /// Caller's maximum total.
        limit: i64,
        /// Actual total.
        actual: i64,
    },

    /// The player store failed.
    #[error(transparent)]
    Store(#[from] PlayerStoreError),

    /// The debit kept losing write races.
    #[error("purchase for player {player} lost {attempts} write races")]
    Contention {
        /// Buying player.
        player: PlayerId,
        /// Attempts made.
        attempts: u32,
    },
}

/// Price of an order at quote time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Stars in the order.
    pub quantity: i64,
    /// Current single-star price.
    pub unit_price: i64,
    /// Total for the whole order including the bulk markup.
    pub total_cost: i64,
}

/// A completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Receipt identifier.
    pub id: PurchaseId,
    /// Buying player.
    pub player: PlayerId,
    /// Stars bought.
    pub quantity: i64,
    /// Coins burned.
    pub cost: i64,
    /// Coin balance after the purchase.
    pub balance: i64,
    /// Stars owned after the purchase.
    pub stars: i64,
    /// Purchase time.
    pub purchased_at: DateTime<Utc>,
}

/// Trailing window of purchases feeding the market pressure regulator.
#[derive(Debug, Default)]
pub struct PurchaseLog {
    entries: Mutex<VecDeque<PurchaseEntry>>,
}

impl PurchaseLog {
    /// Window kept in memory.
    pub const RETENTION: Duration = Duration::days(7);

    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted entries.
    pub fn from_entries(entries: &[PurchaseEntry]) -> Self {
        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|entry| entry.at);
        let log = Self::new();
        for entry in sorted {
            log.record(entry.at, entry.quantity);
        }
        log
    }

    /// Record `quantity` stars bought at `at`.
    pub fn record(&self, at: DateTime<Utc>, quantity: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(PurchaseEntry { at, quantity });
        let cutoff = at.checked_sub_signed(Self::RETENTION).unwrap_or(DateTime::<Utc>::MIN_UTC);
        while entries.front().is_some_and(|entry| entry.at <= cutoff) {
            entries.pop_front();
        }
    }

    /// Copy of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<PurchaseEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

impl PurchaseHistory for PurchaseLog {
    fn purchase_counts(&self, now: DateTime<Utc>) -> PurchaseCounts {
        let day_ago = now
            .checked_sub_signed(Duration::days(1))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let week_ago = now
            .checked_sub_signed(Self::RETENTION)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|entry| entry.at > week_ago && entry.at <= now)
            .fold(PurchaseCounts::default(), |mut counts, entry| {
                counts.last_7d = counts.last_7d.saturating_add(entry.quantity);
                if entry.at > day_ago {
                    counts.last_24h = counts.last_24h.saturating_add(entry.quantity);
                }
                counts
            })
    }
}

/// Star shop over the shared ledger and the player store.
pub struct StarShop<S> {
    ledger: Arc<EconomyLedger>,
    players: Arc<S>,
    purchases: Arc<PurchaseLog>,
    season: SeasonClock,
    clock: Arc<dyn WallClock>,
}

impl<S: PlayerStore> StarShop<S> {
    /// Create a shop.
    pub const fn new(
        ledger: Arc<EconomyLedger>,
        players: Arc<S>,
        purchases: Arc<PurchaseLog>,
        season: SeasonClock,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            ledger,
            players,
            purchases,
            season,
            clock,
        }
    }

    /// Price an order of `quantity` stars at the current time.
    ///
    /// Quoting ratchets the season price floor.
    pub fn quote(&self, quantity: i64) -> Result<Quote, ShopError> {
        if !(1..=MAX_ORDER_QUANTITY).contains(&quantity) {
            return Err(ShopError::InvalidQuantity(quantity));
        }
        let remaining = self.season.seconds_remaining(self.clock.now());
        if remaining <= 0 {
            return Err(ShopError::SeasonOver);
        }
        let unit_price = live_star_price(&self.ledger, remaining);
        let params = self.ledger.calibration();
        let inputs = PriceInputs::from_view(&self.ledger.circulation(), remaining);
        let total_cost = bulk_star_cost(&inputs, quantity, self.ledger.price_floor(), &params);
        Ok(Quote {
            quantity,
            unit_price,
            total_cost,
        })
    }

    /// Buy `quantity` stars for `player`, failing if the total exceeds
    /// `max_total` when one is given.
    pub async fn purchase(
        &self,
        player: PlayerId,
        quantity: i64,
        max_total: Option<i64>,
    ) -> Result<PurchaseReceipt, ShopError> {
        let quote = self.quote(quantity)?;
        if let Some(limit) = max_total {
            if quote.total_cost > limit {
                return Err(ShopError::PriceMoved {
                    limit,
                    actual: quote.total_cost,
                });
            }
        }

        for _ in 0..MAX_PURCHASE_ATTEMPTS {
            let mut record = self.players.get(player).await?;
            if record.coins < quote.total_cost {
                return Err(ShopError::InsufficientFunds {
                    needed: quote.total_cost,
                    balance: record.coins,
                });
            }
            let expected_version = record.version;
            record.coins = record.coins.saturating_sub(quote.total_cost);
            record.stars = record.stars.saturating_add(quantity);
            let (balance, stars) = (record.coins, record.stars);

            if self.players.compare_and_swap(expected_version, record).await? {
                let now = self.clock.now();
                self.ledger.record_star_purchase(quantity);
                self.purchases.record(now, quantity.unsigned_abs());
                tracing::info!(
                    %player,
                    quantity,
                    cost = quote.total_cost,
                    unit_price = quote.unit_price,
                    "stars purchased"
                );
                return Ok(PurchaseReceipt {
                    id: PurchaseId::new(),
                    player,
                    quantity,
                    cost: quote.total_cost,
                    balance,
                    stars,
                    purchased_at: now,
                });
            }
        }

        Err(ShopError::Contention {
            player,
            attempts: MAX_PURCHASE_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::player::{MemoryPlayerStore, PlayerRecord};
    use economy_types::CalibrationParams;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_571_200, 0).unwrap_or_default()
    }

    async fn shop_with_player(coins: i64) -> (StarShop<MemoryPlayerStore>, Arc<EconomyLedger>, PlayerId) {
        let Ok(ledger) = EconomyLedger::new(CalibrationParams::default()) else {
            unreachable!("default calibration is valid")
        };
        let ledger = Arc::new(ledger);
        let players = Arc::new(MemoryPlayerStore::new());
        let player = PlayerId::new();
        let mut record = PlayerRecord::new(player, start());
        record.coins = coins;
        assert!(players.insert(record).await.is_ok());
        let shop = StarShop::new(
            Arc::clone(&ledger),
            players,
            Arc::new(PurchaseLog::new()),
            SeasonClock::new(start()),
            Arc::new(ManualClock::new(start())),
        );
        (shop, ledger, player)
    }

    #[tokio::test]
    async fn fresh_season_quote_is_base_price() {
        let (shop, ledger, _) = shop_with_player(0).await;
        let quote = shop.quote(1);
        assert!(matches!(
            quote,
            Ok(Quote {
                quantity: 1,
                unit_price: 10,
                total_cost: 10
            })
        ));
        assert_eq!(ledger.price_floor(), 10);
    }

    #[tokio::test]
    async fn bulk_orders_pay_markup() {
        let (shop, _, _) = shop_with_player(0).await;
        let Ok(quote) = shop.quote(3) else {
            unreachable!("valid quantity")
        };
        // 10 + ceil(10 * 1.05) + ceil(10 * 1.2) with flat unit prices.
        assert!(quote.total_cost >= 10 + 11 + 12);
    }

    #[tokio::test]
    async fn purchase_burns_coins_and_records_stars() {
        let (shop, ledger, player) = shop_with_player(100).await;
        let receipt = shop.purchase(player, 1, None).await;
        let Ok(receipt) = receipt else {
            unreachable!("affordable purchase: {receipt:?}")
        };
        assert_eq!(receipt.cost, 10);
        assert_eq!(receipt.balance, 90);
        assert_eq!(receipt.stars, 1);
        assert_eq!(ledger.circulation().stars_purchased, 1);
        assert_eq!(shop.purchases.purchase_counts(start()).last_24h, 1);
    }

    #[tokio::test]
    async fn insufficient_funds() {
        let (shop, ledger, player) = shop_with_player(5).await;
        let outcome = shop.purchase(player, 1, None).await;
        assert!(matches!(
            outcome,
            Err(ShopError::InsufficientFunds {
                needed: 10,
                balance: 5
            })
        ));
        assert_eq!(ledger.circulation().stars_purchased, 0);
    }

    #[tokio::test]
    async fn price_limit_is_enforced() {
        let (shop, _, player) = shop_with_player(100).await;
        let outcome = shop.purchase(player, 1, Some(9)).await;
        assert!(matches!(
            outcome,
            Err(ShopError::PriceMoved {
                limit: 9,
                actual: 10
            })
        ));
    }

    #[tokio::test]
    async fn rejects_non_positive_quantity() {
        let (shop, _, player) = shop_with_player(100).await;
        assert!(matches!(shop.quote(0), Err(ShopError::InvalidQuantity(0))));
        assert!(matches!(
            shop.purchase(player, -2, None).await,
            Err(ShopError::InvalidQuantity(-2))
        ));
    }

    #[tokio::test]
    async fn oversized_orders_are_rejected_before_pricing() {
        let (shop, ledger, player) = shop_with_player(i64::MAX).await;
        assert!(matches!(
            shop.quote(i64::MAX),
            Err(ShopError::InvalidQuantity(i64::MAX))
        ));
        assert!(matches!(
            shop.purchase(player, 1_000_000_000_000, None).await,
            Err(ShopError::InvalidQuantity(1_000_000_000_000))
        ));
        assert!(matches!(
            shop.quote(1_001),
            Err(ShopError::InvalidQuantity(_))
        ));
        assert!(shop.quote(MAX_ORDER_QUANTITY).is_ok());
        assert_eq!(ledger.circulation().stars_purchased, 0);
    }

    #[test]
    fn purchase_log_survives_export() {
        let now = start() + Duration::days(10);
        let log = PurchaseLog::new();
        log.record(now - Duration::days(3), 7);
        log.record(now - Duration::hours(2), 2);

        let mut persisted = log.entries();
        persisted.reverse();
        let restored = PurchaseLog::from_entries(&persisted);
        assert_eq!(restored.entries(), log.entries());
        assert_eq!(restored.purchase_counts(now), log.purchase_counts(now));
    }

    #[test]
    fn purchase_log_windows() {
        let log = PurchaseLog::new();
        let now = start() + Duration::days(10);
        log.record(now - Duration::days(8), 100);
        log.record(now - Duration::days(3), 7);
        log.record(now - Duration::hours(2), 2);
        assert_eq!(
            log.purchase_counts(now),
            PurchaseCounts {
                last_24h: 2,
                last_7d: 9
            }
        );
    }
}
