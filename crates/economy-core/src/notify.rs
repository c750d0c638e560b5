//! Bounded, deduplicating notification queue.
//!
//! Alerts raised by the regulator and the watchdog go through a bounded
//! `tokio::mpsc` channel drained by a single worker task that hands each
//! notification to a [`NotificationSink`]. Producers never block: when the
//! queue is full they get [`NotifyError::QueueFull`] back and the drop is
//! counted. Delivery failures are logged and counted by the worker.
//!
//! # Deduplication
//!
//! A notification carrying a dedup key is suppressed when another
//! notification with the same key was queued less than `dedup_window` ago.
//! Keys whose window has passed are pruned whenever a new key is recorded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Informational.
    Low,
    /// Worth a look.
    Normal,
    /// Needs attention soon.
    High,
    /// Immediate attention required.
    Critical,
}

/// A notification handed to the external notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// Broad category, e.g. `economy`.
    pub category: String,
    /// Specific notification type, e.g. `market_pressure_high`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Urgency.
    pub priority: Priority,
    /// Structured details.
    pub payload: serde_json::Value,
    /// Key used to suppress repeats, if any.
    pub dedup_key: Option<String>,
    /// Suppression window for `dedup_key`.
    #[serde(with = "duration_secs")]
    pub dedup_window: Duration,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create a notification without deduplication.
    pub fn new(
        category: &str,
        kind: &str,
        priority: Priority,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            category: category.to_owned(),
            kind: kind.to_owned(),
            priority,
            payload,
            dedup_key: None,
            dedup_window: Duration::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Suppress repeats of `key` for `window`.
    #[must_use]
    pub fn with_dedup(mut self, key: String, window: Duration) -> Self {
        self.dedup_key = Some(key);
        self.dedup_window = window;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Errors surfaced to notification producers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// The queue is at capacity; the notification was dropped.
    #[error("notification queue full, dropped {kind}")]
    QueueFull {
        /// Type of the dropped notification.
        kind: String,
    },

    /// The worker has shut down.
    #[error("notification queue closed")]
    Closed,
}

/// Error returned by a sink that failed to deliver.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Result of a successful enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The notification is waiting for delivery.
    Queued,
    /// Suppressed by an earlier notification with the same dedup key.
    Deduplicated,
}

/// External collaborator that actually delivers notifications.
pub trait NotificationSink: Send + Sync + 'static {
    /// Deliver one notification.
    fn deliver(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        match notification.priority {
            Priority::Critical | Priority::High => tracing::error!(
                category = %notification.category,
                kind = %notification.kind,
                priority = ?notification.priority,
                payload = %notification.payload,
                "notification"
            ),
            Priority::Normal | Priority::Low => tracing::info!(
                category = %notification.category,
                kind = %notification.kind,
                priority = ?notification.priority,
                payload = %notification.payload,
                "notification"
            ),
        }
        Ok(())
    }
}

/// Sink that keeps every delivered notification in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every notification delivered so far.
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for MemorySink {
    async fn deliver(&self, notification: &Notification) -> Result<(), SinkError> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationStats {
    /// Notifications accepted into the queue.
    pub queued: u64,
    /// Notifications suppressed by deduplication.
    pub deduplicated: u64,
    /// Notifications dropped because the queue was full.
    pub dropped: u64,
    /// Notifications the sink accepted.
    pub delivered: u64,
    /// Notifications the sink rejected.
    pub failed: u64,
}

/// Last time a dedup key was queued and how long it suppresses repeats.
#[derive(Debug, Clone, Copy)]
struct DedupEntry {
    queued_at: Instant,
    window: Duration,
}

impl DedupEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.queued_at) < self.window
    }
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    deduplicated: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Producer handle for the notification queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
    recent: Arc<Mutex<HashMap<String, DedupEntry>>>,
    counters: Arc<Counters>,
}

impl NotificationQueue {
    /// Queue a notification without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::QueueFull`] when the queue is at capacity and
    /// [`NotifyError::Closed`] when the worker has stopped.
    pub fn enqueue(&self, notification: Notification) -> Result<Enqueued, NotifyError> {
        let now = Instant::now();
        if let Some(key) = &notification.dedup_key {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.get(key).is_some_and(|entry| entry.is_live(now)) {
                self.counters.deduplicated.fetch_add(1, Ordering::Relaxed);
                return Ok(Enqueued::Deduplicated);
            }
            recent.retain(|_, entry| entry.is_live(now));
            recent.insert(
                key.clone(),
                DedupEntry {
                    queued_at: now,
                    window: notification.dedup_window,
                },
            );
        }

        match self.sender.try_send(notification) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                Ok(Enqueued::Queued)
            }
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                self.forget(&dropped);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind = %dropped.kind, "notification queue full, dropping");
                Err(NotifyError::QueueFull { kind: dropped.kind })
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                self.forget(&dropped);
                Err(NotifyError::Closed)
            }
        }
    }

    /// Clear the dedup entry of a notification that never made it in, so a
    /// retry is not suppressed.
    fn forget(&self, notification: &Notification) {
        if let Some(key) = &notification.dedup_key {
            self.recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
        }
    }

    /// Current delivery counters.
    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            deduplicated: self.counters.deduplicated.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// Start the delivery worker and return the producer handle.
///
/// The worker exits once every [`NotificationQueue`] clone is dropped and
/// the queue has drained.
pub fn spawn_notification_worker<S: NotificationSink>(
    capacity: usize,
    sink: S,
) -> (NotificationQueue, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<Notification>(capacity.max(1));
    let counters = Arc::new(Counters::default());
    let queue = NotificationQueue {
        sender,
        recent: Arc::new(Mutex::new(HashMap::new())),
        counters: Arc::clone(&counters),
    };

    let handle = tokio::spawn(async move {
        while let Some(notification) = receiver.recv().await {
            match sink.deliver(&notification).await {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        error = %e,
                        kind = %notification.kind,
                        "notification delivery failed"
                    );
                }
            }
        }
        tracing::debug!("notification worker stopped");
    });

    (queue, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(key: &str) -> Notification {
        Notification::new("economy", "test_alert", Priority::High, serde_json::json!({}))
            .with_dedup(key.to_owned(), Duration::from_secs(60))
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        async fn deliver(&self, _notification: &Notification) -> Result<(), SinkError> {
            Err(SinkError("downstream unavailable".to_owned()))
        }
    }

    #[tokio::test]
    async fn delivers_to_sink() {
        let sink = MemorySink::new();
        let (queue, handle) = spawn_notification_worker(8, sink.clone());
        assert_eq!(queue.enqueue(alert("a")), Ok(Enqueued::Queued));
        drop(queue);
        assert!(handle.await.is_ok());
        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered.first().map(|n| n.kind.as_str()), Some("test_alert"));
    }

    #[tokio::test(start_paused = true)]
    async fn dedup_window_suppresses_repeats() {
        let (queue, _handle) = spawn_notification_worker(8, MemorySink::new());
        assert_eq!(queue.enqueue(alert("k")), Ok(Enqueued::Queued));
        assert_eq!(queue.enqueue(alert("k")), Ok(Enqueued::Deduplicated));
        assert_eq!(queue.enqueue(alert("other")), Ok(Enqueued::Queued));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(queue.enqueue(alert("k")), Ok(Enqueued::Queued));
        assert_eq!(queue.stats().deduplicated, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_dedup_keys_are_pruned() {
        let (queue, _handle) = spawn_notification_worker(8, MemorySink::new());
        for key in ["a", "b", "c"] {
            assert_eq!(queue.enqueue(alert(key)), Ok(Enqueued::Queued));
        }
        let long = Notification::new("economy", "slow_alert", Priority::Low, serde_json::json!({}))
            .with_dedup("slow".to_owned(), Duration::from_secs(3_600));
        assert_eq!(queue.enqueue(long), Ok(Enqueued::Queued));
        let tracked = queue.recent.lock().unwrap_or_else(PoisonError::into_inner).len();
        assert_eq!(tracked, 4);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(queue.enqueue(alert("d")), Ok(Enqueued::Queued));
        let recent = queue.recent.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&str> = recent.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["d", "slow"]);
    }

    #[tokio::test]
    async fn full_queue_is_surfaced() {
        // Build the queue by hand so no worker drains it.
        let (sender, _receiver) = mpsc::channel(1);
        let queue = NotificationQueue {
            sender,
            recent: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        };
        assert_eq!(queue.enqueue(alert("one")), Ok(Enqueued::Queued));
        assert!(matches!(
            queue.enqueue(alert("two")),
            Err(NotifyError::QueueFull { .. })
        ));
        assert_eq!(queue.stats().dropped, 1);
        // The dropped key was forgotten, so it is not treated as a repeat.
        assert!(matches!(
            queue.enqueue(alert("two")),
            Err(NotifyError::QueueFull { .. })
        ));
    }

    #[tokio::test]
    async fn delivery_failures_are_counted() {
        let (queue, handle) = spawn_notification_worker(4, FailingSink);
        assert!(queue.enqueue(alert("x")).is_ok());
        let counters = Arc::clone(&queue.counters);
        // Dropping the last producer lets the worker drain and exit.
        drop(queue);
        assert!(handle.await.is_ok());
        assert_eq!(counters.failed.load(Ordering::Relaxed), 1);
        assert_eq!(counters.delivered.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn notification_serializes_type_field() {
        let json = serde_json::to_value(alert("k"));
        assert!(json.is_ok());
        let json = json.unwrap_or_default();
        assert_eq!(json["type"], "test_alert");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["dedup_window"], 60);
    }
}
