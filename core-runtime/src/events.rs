//! # Event Bus System
//!
//! In-process publish/subscribe for the lottery results core.
//!
//! ## Overview
//!
//! Two independent channels are published:
//! - **sync status** ([`SyncStatus`]): every state transition of a sync run
//! - **data changed** ([`LottoData`]): the merged cache after a successful sync
//!
//! Each channel has two kinds of consumers:
//! - **Callbacks** registered on a [`StatusBus`]. They run synchronously, in
//!   registration order, inside the publishing call. A panicking callback is
//!   caught and logged; the remaining callbacks still run.
//! - **Async streams** from the broadcast [`EventBus`]. Every publish is
//!   mirrored there as a [`CoreEvent`]; slow receivers get
//!   `RecvError::Lagged` instead of blocking the publisher.
//!
//! ```text
//!                      publish_status / publish_data
//! ┌─────────────┐ ─────────────────────────────────> ┌───────────┐  callbacks  ┌──────────┐
//! │ Sync Engine │                                    │ StatusBus ├────────────>│ UI pane  │
//! └─────────────┘                                    │           │             └──────────┘
//!                                                    │           │  broadcast  ┌──────────┐
//!                                                    │ EventBus  ├────────────>│ EventStream
//!                                                    └───────────┘             └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{StatusBus, SyncStatus};
//!
//! let bus = StatusBus::new(100);
//! let id = bus.subscribe_status(|status: &SyncStatus| {
//!     println!("syncing: {}", status.is_syncing);
//! });
//!
//! bus.publish_status(SyncStatus::default());
//! assert!(bus.unsubscribe_status(id));
//! ```

use bridge_traits::LottoResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, warn};

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Payloads
// ============================================================================

/// Merged, cached view of all known draws.
///
/// `results` is sorted newest first and holds at most one record per
/// `(draw_num, date)` identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LottoData {
    /// Time of the sync that produced this snapshot
    pub last_updated: DateTime<Utc>,
    pub results: Vec<LottoResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_draws: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_version: Option<String>,
}

impl LottoData {
    pub fn new(last_updated: DateTime<Utc>, results: Vec<LottoResult>) -> Self {
        Self {
            last_updated,
            results,
            total_draws: None,
            cache_version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Snapshot of the sync state, as shown to UI surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_cache: bool,
    pub is_online: bool,
    pub sync_attempts: u32,
    /// 0-100 while a bootstrap fetch is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl SyncStatus {
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ============================================================================
// Core Event Types
// ============================================================================

/// Event mirrored on the broadcast bus for async consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    SyncStatusChanged(SyncStatus),
    /// The merged cache was replaced. Shared so every receiver does not
    /// clone the full result set.
    DataChanged(Arc<LottoData>),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::SyncStatusChanged(status) if status.is_error() => "Sync failed",
            CoreEvent::SyncStatusChanged(status) if status.is_syncing => "Sync in progress",
            CoreEvent::SyncStatusChanged(_) => "Sync idle",
            CoreEvent::DataChanged(_) => "Results updated",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::SyncStatusChanged(status) if status.is_error() => EventSeverity::Warning,
            CoreEvent::DataChanged(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel of [`CoreEvent`]s.
///
/// Cloning shares the underlying channel. Each `subscribe()` creates an
/// independent receiver that sees events published after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus; receivers falling more than `capacity`
    /// events behind get `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all receivers.
    ///
    /// Returns the number of receivers, or an error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let data_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::DataChanged(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if this receiver fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Callback Registry
// ============================================================================

/// Handle returned by `subscribe_*`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObserverList<T> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Callback<T>)>,
}

/// Ordered list of callbacks for one channel.
pub struct Observers<T> {
    channel: &'static str,
    inner: Mutex<ObserverList<T>>,
}

impl<T> Observers<T> {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            inner: Mutex::new(ObserverList {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    // A callback panic never happens while the lock is held, so a poisoned
    // lock still guards a consistent list.
    fn lock(&self) -> MutexGuard<'_, ObserverList<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut list = self.lock();
        let id = SubscriptionId(list.next_id);
        list.next_id += 1;
        list.entries.push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not registered (or already removed).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = self.lock();
        let before = list.entries.len();
        list.entries.retain(|(entry_id, _)| *entry_id != id);
        list.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every callback in registration order and returns how many
    /// completed without panicking.
    ///
    /// The list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe without deadlocking; such changes apply from the next
    /// notification.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<(SubscriptionId, Callback<T>)> = self.lock().entries.clone();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!(
                        channel = self.channel,
                        subscription = id.0,
                        reason = %reason,
                        "Subscriber callback panicked"
                    );
                }
            }
        }
        delivered
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("channel", &self.channel)
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Status Bus
// ============================================================================

/// The sync-status and data-changed channels plus their broadcast mirror.
#[derive(Debug)]
pub struct StatusBus {
    status: Observers<SyncStatus>,
    data: Observers<LottoData>,
    events: EventBus,
}

impl StatusBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            status: Observers::new("sync_status"),
            data: Observers::new("data_changed"),
            events: EventBus::new(buffer_size),
        }
    }

    pub fn subscribe_status<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status.subscribe(callback)
    }

    pub fn unsubscribe_status(&self, id: SubscriptionId) -> bool {
        self.status.unsubscribe(id)
    }

    pub fn subscribe_data<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LottoData) + Send + Sync + 'static,
    {
        self.data.subscribe(callback)
    }

    pub fn unsubscribe_data(&self, id: SubscriptionId) -> bool {
        self.data.unsubscribe(id)
    }

    /// Async stream over both channels.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn publish_status(&self, status: SyncStatus) {
        let delivered = self.status.notify(&status);
        debug!(
            is_syncing = status.is_syncing,
            has_cache = status.has_cache,
            error = status.error.as_deref().unwrap_or(""),
            delivered,
            "Published sync status"
        );
        // No async receivers is fine
        let _ = self.events.emit(CoreEvent::SyncStatusChanged(status));
    }

    pub fn publish_data(&self, data: LottoData) {
        let delivered = self.data.notify(&data);
        debug!(records = data.results.len(), delivered, "Published data change");
        let _ = self.events.emit(CoreEvent::DataChanged(Arc::new(data)));
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::DrawNumbers;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_data() -> LottoData {
        let result = LottoResult {
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            draw_num: 3,
            numbers: DrawNumbers::parse("01|02|03"),
            power_ball: 4,
            multiplier: 2,
            jackpot: 10,
            wins: 0,
        };
        LottoData::new(Utc::now(), vec![result])
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let bus = StatusBus::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            bus.subscribe_status(move |_| order.lock().unwrap().push(n));
        }
        bus.publish_status(SyncStatus::default());

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let observers: Observers<SyncStatus> = Observers::new("sync_status");
        let calls = Arc::new(AtomicUsize::new(0));

        let first = calls.clone();
        observers.subscribe(move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        observers.subscribe(|_| panic!("ui surface crashed"));
        let last = calls.clone();
        observers.subscribe(move |_| {
            last.fetch_add(1, Ordering::SeqCst);
        });

        let delivered = observers.notify(&SyncStatus::default());

        assert_eq!(delivered, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Registry still usable after the panic
        assert_eq!(observers.notify(&SyncStatus::default()), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = StatusBus::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = bus.subscribe_data(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_data(sample_data());
        assert!(bus.unsubscribe_data(id));
        assert!(!bus.unsubscribe_data(id));
        bus.publish_data(sample_data());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let bus = Arc::new(StatusBus::default());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let bus_ref = Arc::downgrade(&bus);
        let slot_ref = slot.clone();
        let id = bus.subscribe_status(move |_| {
            if let (Some(bus), Some(id)) = (bus_ref.upgrade(), *slot_ref.lock().unwrap()) {
                bus.unsubscribe_status(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        bus.publish_status(SyncStatus::default());
        assert!(!bus.unsubscribe_status(id));
    }

    #[tokio::test]
    async fn test_publish_is_mirrored_on_event_bus() {
        let bus = StatusBus::default();
        let mut stream = bus.stream();

        let status = SyncStatus {
            is_syncing: true,
            ..SyncStatus::default()
        };
        bus.publish_status(status.clone());
        bus.publish_data(sample_data());

        assert_eq!(
            stream.recv().await.unwrap(),
            CoreEvent::SyncStatusChanged(status)
        );
        assert!(matches!(stream.recv().await.unwrap(), CoreEvent::DataChanged(d) if d.results.len() == 1));
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = StatusBus::default();
        let mut data_only =
            bus.stream().filter(|event| matches!(event, CoreEvent::DataChanged(_)));

        bus.publish_status(SyncStatus::default());
        bus.publish_data(sample_data());

        assert!(matches!(data_only.recv().await.unwrap(), CoreEvent::DataChanged(_)));
        assert!(data_only.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();

        for _ in 0..5 {
            bus.emit(CoreEvent::SyncStatusChanged(SyncStatus::default())).ok();
        }

        assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_emit_without_receivers_errors() {
        let bus = EventBus::default();
        assert!(bus
            .emit(CoreEvent::SyncStatusChanged(SyncStatus::default()))
            .is_err());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = SyncStatus {
            is_syncing: false,
            has_cache: true,
            is_online: true,
            sync_attempts: 1,
            ..SyncStatus::default()
        }
        .with_error("No internet connection");

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["isSyncing"], false);
        assert_eq!(value["hasCache"], true);
        assert_eq!(value["syncAttempts"], 1);
        assert_eq!(value["error"], "No internet connection");
        assert!(value.get("progress").is_none());
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::SyncStatusChanged(SyncStatus::default().with_error("boom"));
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(failed.description(), "Sync failed");

        let data = CoreEvent::DataChanged(Arc::new(sample_data()));
        assert_eq!(data.severity(), EventSeverity::Info);
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = CoreEvent::DataChanged(Arc::new(sample_data()));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"DataChanged""#));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
