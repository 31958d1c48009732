//! Periodic synthetic reading generator.
//!
//! Stands in for a real sensor feed: every interval one reading with a
//! uniformly random value is inserted for the configured sensor. The insert
//! goes through the normal store path, so the store's threshold trigger may
//! derive an alert from it and the relay will pick that up.
//!
//! The first reading is written one full interval after start. A failed
//! tick is logged and skipped; the next tick is attempted on schedule.

use std::time::Duration;

use atmo_db::DbError;
use atmo_types::{NewReading, Reading};
use rand::Rng;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::source::ReadingSink;

/// Exclusive upper bound of synthetic values.
const MAX_VALUE: f64 = 100.0;

/// Errors from a single ingestion tick.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The insert failed.
    #[error("failed to insert synthetic reading: {0}")]
    Store(#[from] DbError),

    /// The insert did not finish in time.
    #[error("synthetic reading insert timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured deadline.
        timeout_ms: u128,
    },
}

/// Inserts one synthetic reading per interval.
pub struct IngestionTimer<S> {
    sink: S,
    config: IngestConfig,
}

impl<S: ReadingSink> IngestionTimer<S> {
    /// Create a timer writing through `sink`.
    pub fn new(sink: S, config: &IngestConfig) -> Self {
        Self {
            sink,
            config: config.clone(),
        }
    }

    /// Build the next synthetic reading.
    ///
    /// The value is drawn from `[0, 100)` and rounded to two decimals.
    pub fn synthesize_with<R: Rng>(&self, rng: &mut R) -> NewReading {
        let raw: f64 = rng.random_range(0.0..MAX_VALUE);
        NewReading {
            source_id: self.config.source_id,
            sensor_id: self.config.sensor_id,
            timestamp: None,
            value: round_to_cents(raw),
            measurement_type_id: self.config.measurement_type_id,
            unit_id: self.config.unit_id,
        }
    }

    /// Insert one synthetic reading.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the insert fails or exceeds the
    /// configured timeout.
    pub async fn tick(&self) -> Result<Reading, IngestError> {
        let reading = self.synthesize_with(&mut rand::rng());
        let timeout = self.config.query_timeout();

        match tokio::time::timeout(timeout, self.sink.insert_reading(&reading)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(IngestError::Timeout {
                timeout_ms: timeout.as_millis(),
            }),
        }
    }

    /// Tick forever at the configured interval.
    pub async fn run(self) {
        let period = self.config.interval().max(Duration::from_millis(1));
        let start = Instant::now()
            .checked_add(period)
            .unwrap_or_else(Instant::now);
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            sensor_id = self.config.sensor_id,
            "Synthetic ingestion started"
        );

        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(reading) => info!(
                    reading_id = ?reading.int("reading_id"),
                    value = ?reading.float("value"),
                    "Inserted synthetic reading"
                ),
                Err(e) => error!(error = %e, "Error inserting synthetic reading"),
            }
        }
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct MemorySink {
        rows: Arc<Mutex<Vec<NewReading>>>,
        fail: Arc<AtomicBool>,
        hang: Arc<AtomicBool>,
    }

    impl ReadingSink for MemorySink {
        async fn insert_reading(&self, reading: &NewReading) -> Result<Reading, DbError> {
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(DbError::Config("store offline".to_owned()));
            }
            let mut rows = self.rows.lock().unwrap();
            rows.push(reading.clone());
            Ok(serde_json::from_value(json!({
                "reading_id": rows.len(),
                "source_id": reading.source_id,
                "sensor_id": reading.sensor_id,
                "timestamp": "2026-03-01T10:00:00+00:00",
                "value": reading.value,
                "measurement_type_id": reading.measurement_type_id,
                "unit_id": reading.unit_id
            }))
            .unwrap())
        }
    }

    fn timer(sink: MemorySink) -> IngestionTimer<MemorySink> {
        IngestionTimer::new(sink, &IngestConfig::default())
    }

    #[test]
    fn values_are_in_range_with_two_decimals() {
        let timer = timer(MemorySink::default());
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1_000 {
            let reading = timer.synthesize_with(&mut rng);
            assert!((0.0..=100.0).contains(&reading.value));
            let cents = reading.value * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6);
            assert_eq!(reading.sensor_id, 1);
            assert_eq!(reading.source_id, 1);
            assert!(reading.timestamp.is_none());
        }
    }

    #[test]
    fn rounding_is_to_cents() {
        assert_eq!(round_to_cents(12.345_6), 12.35);
        assert_eq!(round_to_cents(0.004), 0.0);
        assert_eq!(round_to_cents(99.994), 99.99);
    }

    #[test]
    fn configured_ids_are_used() {
        let config = IngestConfig {
            sensor_id: 4,
            unit_id: 2,
            ..IngestConfig::default()
        };
        let timer = IngestionTimer::new(MemorySink::default(), &config);
        let reading = timer.synthesize_with(&mut StdRng::seed_from_u64(1));
        assert_eq!(reading.sensor_id, 4);
        assert_eq!(reading.unit_id, 2);
    }

    #[tokio::test]
    async fn tick_inserts_one_reading() {
        let sink = MemorySink::default();
        let timer = timer(sink.clone());

        let stored = timer.tick().await.unwrap();
        assert_eq!(stored.int("reading_id"), Some(1));
        assert_eq!(sink.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tick_reports_store_failure() {
        let sink = MemorySink::default();
        sink.fail.store(true, Ordering::SeqCst);
        let result = timer(sink).tick().await;
        assert!(matches!(result, Err(IngestError::Store(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_times_out() {
        let sink = MemorySink::default();
        sink.hang.store(true, Ordering::SeqCst);
        let result = timer(sink).tick().await;
        assert!(matches!(
            result,
            Err(IngestError::Timeout { timeout_ms: 5000 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn run_waits_one_interval_and_survives_failures() {
        let sink = MemorySink::default();
        let handle = tokio::spawn(timer(sink.clone()).run());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(sink.rows.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.rows.lock().unwrap().len(), 1);

        sink.fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(sink.rows.lock().unwrap().len(), 1);

        sink.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(sink.rows.lock().unwrap().len(), 2);
        assert!(!handle.is_finished());

        handle.abort();
    }
}
