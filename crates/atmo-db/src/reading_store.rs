//! Operations on the `reading` table.
//!
//! Readings arrive from the ingestion timer and from admins via the REST
//! API. Inserting one may fire the store's alert trigger; this module has
//! no knowledge of that.

use atmo_types::{NewReading, Reading};
use sqlx::PgPool;

use crate::error::DbError;
use crate::rows;

/// Operations on the `reading` table.
pub struct ReadingStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ReadingStore<'a> {
    /// Create a new reading store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the most recent readings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Reading>, DbError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(r) FROM (
                  SELECT * FROM reading ORDER BY timestamp DESC LIMIT $1
              ) r
              ORDER BY r.timestamp DESC",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows::decode_all(rows)
    }

    /// Insert a reading and return the stored row.
    ///
    /// A missing timestamp is filled with `NOW()` by the store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, reading: &NewReading) -> Result<Reading, DbError> {
        let row: serde_json::Value = sqlx::query_scalar(
            r"WITH inserted AS (
                  INSERT INTO reading (source_id, sensor_id, timestamp, value, measurement_type_id, unit_id)
                  VALUES ($1, $2, COALESCE($3::timestamptz, NOW()), $4, $5, $6)
                  RETURNING *
              )
              SELECT to_jsonb(inserted) FROM inserted",
        )
        .bind(reading.source_id)
        .bind(reading.sensor_id)
        .bind(reading.timestamp.as_deref())
        .bind(reading.value)
        .bind(reading.measurement_type_id)
        .bind(reading.unit_id)
        .fetch_one(self.pool)
        .await?;

        let reading: Reading = rows::decode(row)?;
        tracing::debug!(reading_id = ?reading.int("reading_id"), "Inserted reading");
        Ok(reading)
    }
}
