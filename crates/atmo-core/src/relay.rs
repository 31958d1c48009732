//! Bridge from store change notifications to the real-time fanout.
//!
//! The store's triggers derive alerts and disaster events and `NOTIFY`
//! with nothing but a row id. The relay turns each of those into a full
//! row and hands it to the [`Fanout`]:
//!
//! ```text
//! new_alert_channel    (reading_id) --> latest alert for reading --> new_alert
//! new_disaster_channel (event_id)   --> disaster event + names   --> new_disaster
//! ```
//!
//! The row goes out exactly as the store rendered it. Delivery is
//! best-effort. A notification whose lookup fails, times out,
//! or finds nothing is logged and dropped; nothing is retried. Each
//! notification is resolved on its own task, so broadcasts may complete
//! in a different order than the notifications arrived.

use std::sync::Arc;
use std::time::Duration;

use atmo_db::{DbError, PostgresConfig, StoreListener};
use atmo_types::{Notification, RealtimeEvent, StoreChannel};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::fanout::Fanout;
use crate::source::{NotificationSource, RecordLookup};

/// Pause after a failed receive before asking the listener again.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Errors that can occur while relaying notifications.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The listening connection could not be established.
    #[error("failed to subscribe to store notifications: {0}")]
    Subscribe(#[source] DbError),

    /// The lookup query failed.
    #[error("lookup on {channel} for id {id} failed: {source}")]
    Lookup {
        /// Channel the notification arrived on.
        channel: StoreChannel,
        /// Row id being resolved.
        id: i32,
        /// The underlying store error.
        source: DbError,
    },

    /// The lookup did not finish in time.
    #[error("lookup on {channel} for id {id} timed out after {timeout_ms}ms")]
    Timeout {
        /// Channel the notification arrived on.
        channel: StoreChannel,
        /// Row id being resolved.
        id: i32,
        /// The configured deadline.
        timeout_ms: u128,
    },
}

/// What happened to a single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The row was found and broadcast.
    Delivered {
        /// Event name used.
        event: RealtimeEvent,
        /// Connections whose queue accepted it.
        receivers: usize,
    },
    /// The payload parsed but no row matched.
    NotFound,
    /// The payload was not a row id.
    BadPayload,
    /// The channel is not one the relay handles.
    Ignored,
}

/// Counters for a finished [`Relay::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Notifications received from the source.
    pub received: u64,
    /// Notifications that produced a broadcast.
    pub delivered: u64,
    /// Notifications dropped because nothing matched or the payload was
    /// malformed.
    pub unmatched: u64,
    /// Notifications on channels the relay does not handle.
    pub ignored: u64,
    /// Notifications dropped because the lookup failed.
    pub failed: u64,
}

impl RelayStats {
    fn record(&mut self, joined: Result<Result<RelayOutcome, RelayError>, JoinError>) {
        match joined {
            Ok(Ok(RelayOutcome::Delivered { .. })) => {
                self.delivered = self.delivered.saturating_add(1);
            }
            Ok(Ok(RelayOutcome::NotFound | RelayOutcome::BadPayload)) => {
                self.unmatched = self.unmatched.saturating_add(1);
            }
            Ok(Ok(RelayOutcome::Ignored)) => self.ignored = self.ignored.saturating_add(1),
            Ok(Err(_)) => self.failed = self.failed.saturating_add(1),
            Err(e) => {
                error!(error = %e, "Relay task aborted");
                self.failed = self.failed.saturating_add(1);
            }
        }
    }
}

/// Open the dedicated listening connection for the given channels.
///
/// Failing here is fatal for the caller: without it no derived record
/// will ever reach a client.
///
/// # Errors
///
/// Returns [`RelayError::Subscribe`] if connecting or `LISTEN` fails.
pub async fn subscribe(
    config: &PostgresConfig,
    channels: &[StoreChannel],
) -> Result<StoreListener, RelayError> {
    let names: Vec<&str> = channels.iter().map(|c| c.as_str()).collect();
    StoreListener::connect(config, &names).await.map_err(|e| {
        error!(error = %e, channels = ?names, "Error setting up store listener");
        RelayError::Subscribe(e)
    })
}

/// Resolves notifications and broadcasts the resulting rows.
pub struct Relay<L> {
    lookup: L,
    fanout: Arc<Fanout>,
    query_timeout: Duration,
}

impl<L: RecordLookup + 'static> Relay<L> {
    /// Create a relay over a lookup handle and the shared fanout.
    pub const fn new(lookup: L, fanout: Arc<Fanout>, query_timeout: Duration) -> Self {
        Self {
            lookup,
            fanout,
            query_timeout,
        }
    }

    /// Resolve one notification and broadcast the row if found.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] or [`RelayError::Timeout`] if the
    /// row could not be fetched. Nothing is broadcast in that case.
    pub async fn handle(&self, notification: &Notification) -> Result<RelayOutcome, RelayError> {
        let Some(channel) = StoreChannel::from_name(&notification.channel) else {
            debug!(channel = %notification.channel, "Ignoring notification on unknown channel");
            return Ok(RelayOutcome::Ignored);
        };

        let Some(id) = notification.row_id() else {
            warn!(%channel, payload = %notification.payload, "Notification payload is not a row id");
            return Ok(RelayOutcome::BadPayload);
        };

        let row = match channel {
            StoreChannel::NewAlert => {
                self.within_deadline(channel, id, self.lookup.latest_alert_for_reading(id))
                    .await?
            }
            StoreChannel::NewDisaster => {
                self.within_deadline(channel, id, self.lookup.disaster_event(id))
                    .await?
            }
        };

        let Some(row) = row else {
            debug!(%channel, id, "No row found for notification");
            return Ok(RelayOutcome::NotFound);
        };

        let event = channel.event();
        let receivers = self.fanout.broadcast(event, row.into_value());
        info!(%event, id, receivers, "Real-time event emitted from store trigger");

        Ok(RelayOutcome::Delivered { event, receivers })
    }

    /// Consume notifications until the source closes.
    ///
    /// Each notification is handled on its own task. Lookup failures are
    /// logged and counted; they never stop the loop. Returns once the
    /// source is closed and every in-flight notification has finished.
    pub async fn run<S: NotificationSource>(self: Arc<Self>, source: &mut S) -> RelayStats {
        let mut stats = RelayStats::default();
        let mut in_flight = JoinSet::new();

        info!("Relay listening for store notifications");

        loop {
            match source.next_notification().await {
                Ok(Some(notification)) => {
                    stats.received = stats.received.saturating_add(1);
                    let relay = Arc::clone(&self);
                    in_flight.spawn(async move {
                        let result = relay.handle(&notification).await;
                        if let Err(e) = &result {
                            error!(error = %e, "Error processing store notification");
                        }
                        result
                    });
                }
                Ok(None) => {
                    info!("Notification source closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Store listener error, waiting to receive again");
                    tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                stats.record(joined);
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            stats.record(joined);
        }

        info!(
            received = stats.received,
            delivered = stats.delivered,
            unmatched = stats.unmatched,
            ignored = stats.ignored,
            failed = stats.failed,
            "Relay stopped"
        );
        stats
    }

    async fn within_deadline<T, F>(
        &self,
        channel: StoreChannel,
        id: i32,
        lookup: F,
    ) -> Result<T, RelayError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        match tokio::time::timeout(self.query_timeout, lookup).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(RelayError::Lookup {
                channel,
                id,
                source,
            }),
            Err(_) => Err(RelayError::Timeout {
                channel,
                id,
                timeout_ms: self.query_timeout.as_millis(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use atmo_types::{Alert, DisasterEvent};
    use serde_json::json;

    use super::*;

    // -----------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------

    #[derive(Default)]
    struct FakeStore {
        alerts: HashMap<i32, Alert>,
        disasters: HashMap<i32, DisasterEvent>,
        /// Row id whose lookup always fails.
        broken: Option<i32>,
        /// Number of upcoming lookups that hang.
        stalls: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeStore {
        async fn gate(&self, id: i32) -> Result<(), DbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if take_one(&self.stalls) {
                std::future::pending::<()>().await;
            }
            if self.broken == Some(id) {
                return Err(DbError::Postgres(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    impl RecordLookup for FakeStore {
        async fn latest_alert_for_reading(
            &self,
            reading_id: i32,
        ) -> Result<Option<Alert>, DbError> {
            self.gate(reading_id).await?;
            Ok(self.alerts.get(&reading_id).cloned())
        }

        async fn disaster_event(&self, event_id: i32) -> Result<Option<DisasterEvent>, DbError> {
            self.gate(event_id).await?;
            Ok(self.disasters.get(&event_id).cloned())
        }
    }

    struct QueueSource {
        queue: Mutex<VecDeque<Result<Option<Notification>, DbError>>>,
    }

    impl QueueSource {
        fn new(items: Vec<Result<Option<Notification>, DbError>>) -> Self {
            Self {
                queue: Mutex::new(items.into()),
            }
        }
    }

    impl NotificationSource for QueueSource {
        async fn next_notification(&mut self) -> Result<Option<Notification>, DbError> {
            self.queue.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn row(value: serde_json::Value) -> atmo_types::StoredRow {
        serde_json::from_value(value).unwrap()
    }

    fn alert(alert_id: i32, reading_id: i32, severity: &str) -> Alert {
        row(json!({
            "alert_id": alert_id,
            "reading_id": reading_id,
            "alert_type_id": 1,
            "timestamp": "2026-03-01T10:00:00+00:00",
            "message": "Threshold exceeded",
            "severity": severity
        }))
    }

    fn disaster(event_id: i32) -> DisasterEvent {
        row(json!({
            "event_id": event_id,
            "disaster_type_id": 4,
            "location_id": 2,
            "severity": "HIGH",
            "description": "River overflow",
            "start_timestamp": "2026-03-01T10:00:00+00:00",
            "type_name": "Flood",
            "subgroup_name": "Hydrological"
        }))
    }

    fn relay_with(store: FakeStore) -> (Arc<Relay<FakeStore>>, Arc<Fanout>) {
        let fanout = Arc::new(Fanout::new(16));
        let relay = Arc::new(Relay::new(
            store,
            Arc::clone(&fanout),
            Duration::from_millis(200),
        ));
        (relay, fanout)
    }

    // -----------------------------------------------------------------
    // handle
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn critical_reading_alert_is_broadcast() {
        let mut store = FakeStore::default();
        store.alerts.insert(17, alert(3, 17, "CRITICAL"));
        let (relay, fanout) = relay_with(store);
        let mut a = fanout.connect();
        let mut b = fanout.connect();

        let outcome = relay
            .handle(&Notification::new("new_alert_channel", "17"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Delivered {
                event: RealtimeEvent::NewAlert,
                receivers: 2
            }
        );

        for sub in [&mut a, &mut b] {
            let msg = sub.rx.try_recv().unwrap();
            assert_eq!(msg.event, RealtimeEvent::NewAlert);
            assert_eq!(msg.data["alert_id"], 3);
            assert_eq!(msg.data["severity"], "CRITICAL");
            assert!(sub.rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn disaster_is_broadcast_with_names() {
        let mut store = FakeStore::default();
        store.disasters.insert(9, disaster(9));
        let (relay, fanout) = relay_with(store);
        let mut sub = fanout.connect();

        let outcome = relay
            .handle(&Notification::new("new_disaster_channel", "9"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RelayOutcome::Delivered {
                event: RealtimeEvent::NewDisaster,
                ..
            }
        ));

        let msg = sub.rx.try_recv().unwrap();
        assert_eq!(msg.data["type_name"], "Flood");
        assert_eq!(msg.data["subgroup_name"], "Hydrological");
    }

    #[tokio::test]
    async fn rows_are_forwarded_exactly_as_stored() {
        // No message column, an unexpected column, and an integer severity.
        let stored_alert = json!({
            "alert_id": 3,
            "reading_id": 17,
            "severity": "CRITICAL",
            "acknowledged_by": null
        });
        let stored_disaster = json!({
            "event_id": 9,
            "severity": 4,
            "magnitude": 6.5,
            "type_name": "Earthquake"
        });

        let mut store = FakeStore::default();
        store.alerts.insert(17, row(stored_alert.clone()));
        store.disasters.insert(9, row(stored_disaster.clone()));
        let (relay, fanout) = relay_with(store);
        let mut sub = fanout.connect();

        relay
            .handle(&Notification::new("new_alert_channel", "17"))
            .await
            .unwrap();
        relay
            .handle(&Notification::new("new_disaster_channel", "9"))
            .await
            .unwrap();

        let alert = sub.rx.try_recv().unwrap();
        assert_eq!(alert.event, RealtimeEvent::NewAlert);
        assert_eq!(alert.data, stored_alert);

        let disaster = sub.rx.try_recv().unwrap();
        assert_eq!(disaster.event, RealtimeEvent::NewDisaster);
        assert_eq!(disaster.data, stored_disaster);
    }

    #[tokio::test]
    async fn missing_row_broadcasts_nothing() {
        let (relay, fanout) = relay_with(FakeStore::default());
        let mut sub = fanout.connect();

        let outcome = relay
            .handle(&Notification::new("new_alert_channel", "404"))
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::NotFound);
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_channel_is_ignored_without_lookup() {
        let (relay, fanout) = relay_with(FakeStore::default());
        let mut sub = fanout.connect();

        let outcome = relay
            .handle(&Notification::new("new_reading_channel", "1"))
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Ignored);
        assert_eq!(relay.lookup.calls.load(Ordering::SeqCst), 0);
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_numeric_payload_is_dropped() {
        let (relay, _fanout) = relay_with(FakeStore::default());
        let outcome = relay
            .handle(&Notification::new("new_alert_channel", "seventeen"))
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::BadPayload);
        assert_eq!(relay.lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_error_broadcasts_nothing() {
        let mut store = FakeStore::default();
        store.alerts.insert(1, alert(1, 1, "WARNING"));
        store.broken = Some(1);
        let (relay, fanout) = relay_with(store);
        let mut sub = fanout.connect();

        let result = relay
            .handle(&Notification::new("new_alert_channel", "1"))
            .await;
        assert!(matches!(result, Err(RelayError::Lookup { id: 1, .. })));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out() {
        let store = FakeStore::default();
        store.stalls.store(1, Ordering::SeqCst);
        let (relay, _fanout) = relay_with(store);

        let result = relay
            .handle(&Notification::new("new_disaster_channel", "5"))
            .await;
        assert!(matches!(
            result,
            Err(RelayError::Timeout {
                timeout_ms: 200,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn redelivered_notification_is_broadcast_twice() {
        let mut store = FakeStore::default();
        store.alerts.insert(17, alert(3, 17, "CRITICAL"));
        let (relay, fanout) = relay_with(store);
        let mut sub = fanout.connect();

        let notification = Notification::new("new_alert_channel", "17");
        relay.handle(&notification).await.unwrap();
        relay.handle(&notification).await.unwrap();

        let first = sub.rx.try_recv().unwrap();
        let second = sub.rx.try_recv().unwrap();
        assert_eq!(first.data, second.data);
    }

    // -----------------------------------------------------------------
    // run
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn run_keeps_going_after_a_failed_lookup() {
        let mut store = FakeStore::default();
        store.alerts.insert(1, alert(10, 1, "WARNING"));
        store.alerts.insert(13, alert(11, 13, "CRITICAL"));
        store.disasters.insert(2, disaster(2));
        store.broken = Some(13);
        let (relay, fanout) = relay_with(store);
        let mut sub = fanout.connect();

        let mut source = QueueSource::new(vec![
            Ok(Some(Notification::new("new_alert_channel", "13"))),
            Ok(Some(Notification::new("new_disaster_channel", "2"))),
            Ok(Some(Notification::new("new_alert_channel", "1"))),
            Ok(Some(Notification::new("somewhere_else", "1"))),
            Ok(Some(Notification::new("new_alert_channel", "99"))),
        ]);

        let stats = relay.run(&mut source).await;
        assert_eq!(stats.received, 5);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.unmatched, 1);

        let mut events = Vec::new();
        while let Ok(msg) = sub.rx.try_recv() {
            events.push(msg.event);
        }
        events.sort_by_key(|e| e.as_str());
        assert_eq!(
            events,
            vec![RealtimeEvent::NewAlert, RealtimeEvent::NewDisaster]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_survives_source_errors() {
        let mut store = FakeStore::default();
        store.alerts.insert(1, alert(10, 1, "WARNING"));
        let (relay, fanout) = relay_with(store);
        let mut sub = fanout.connect();

        let mut source = QueueSource::new(vec![
            Err(DbError::Postgres(sqlx::Error::PoolTimedOut)),
            Ok(Some(Notification::new("new_alert_channel", "1"))),
        ]);

        let stats = relay.run(&mut source).await;
        assert_eq!(stats.received, 1);
        assert_eq!(stats.delivered, 1);
        assert!(sub.rx.try_recv().is_ok());
    }
}
