//! Store-facing traits used by the relay and the ingestion timer.
//!
//! The relay needs two things from `PostgreSQL`: a stream of notifications
//! from a dedicated listening connection, and point lookups through the
//! shared pool. The ingestion timer and the create endpoints need single
//! inserts. Each is a small trait here, implemented for the real `atmo-db`
//! handles below, so the control flow can be exercised against in-memory
//! fakes.

use std::future::Future;

use atmo_db::{AlertStore, DbError, DisasterStore, PostgresPool, ReadingStore, StoreListener};
use atmo_types::{Alert, DisasterEvent, NewAlert, NewReading, Notification, Reading};

/// A source of store change notifications.
pub trait NotificationSource: Send {
    /// Wait for the next notification.
    ///
    /// Returns `Ok(None)` once the source is permanently closed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on a transient failure; the caller may call
    /// again.
    fn next_notification(
        &mut self,
    ) -> impl Future<Output = Result<Option<Notification>, DbError>> + Send;
}

/// Point lookups that resolve a notification payload to a full row.
pub trait RecordLookup: Send + Sync {
    /// The newest alert raised for `reading_id`, if any.
    fn latest_alert_for_reading(
        &self,
        reading_id: i32,
    ) -> impl Future<Output = Result<Option<Alert>, DbError>> + Send;

    /// The disaster event `event_id` with its type and subgroup names.
    fn disaster_event(
        &self,
        event_id: i32,
    ) -> impl Future<Output = Result<Option<DisasterEvent>, DbError>> + Send;
}

/// Somewhere to put a new reading.
pub trait ReadingSink: Send + Sync {
    /// Insert the reading and return the stored row.
    fn insert_reading(
        &self,
        reading: &NewReading,
    ) -> impl Future<Output = Result<Reading, DbError>> + Send;
}

/// Somewhere to put a hand-written alert.
pub trait AlertSink: Send + Sync {
    /// Insert the alert and return the stored row.
    fn insert_alert(
        &self,
        alert: &NewAlert,
    ) -> impl Future<Output = Result<Alert, DbError>> + Send;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementations
// ---------------------------------------------------------------------------

impl NotificationSource for StoreListener {
    async fn next_notification(&mut self) -> Result<Option<Notification>, DbError> {
        match self.recv().await {
            Ok(notification) => Ok(Some(notification)),
            Err(e) if e.is_closed() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl RecordLookup for PostgresPool {
    async fn latest_alert_for_reading(&self, reading_id: i32) -> Result<Option<Alert>, DbError> {
        AlertStore::new(self.pool())
            .latest_for_reading(reading_id)
            .await
    }

    async fn disaster_event(&self, event_id: i32) -> Result<Option<DisasterEvent>, DbError> {
        DisasterStore::new(self.pool()).get(event_id).await
    }
}

impl ReadingSink for PostgresPool {
    async fn insert_reading(&self, reading: &NewReading) -> Result<Reading, DbError> {
        ReadingStore::new(self.pool()).insert(reading).await
    }
}

impl AlertSink for PostgresPool {
    async fn insert_alert(&self, alert: &NewAlert) -> Result<Alert, DbError> {
        AlertStore::new(self.pool()).insert(alert).await
    }
}
