//! Operations on the `alert` table.
//!
//! Alerts are normally written by the store's trigger; this module reads
//! them back for the relay and the REST API, and supports the admin-only
//! manual insert.

use atmo_types::{Alert, NewAlert};
use sqlx::PgPool;

use crate::error::DbError;
use crate::rows;

/// Operations on the `alert` table.
pub struct AlertStore<'a> {
    pool: &'a PgPool,
}

impl<'a> AlertStore<'a> {
    /// Create a new alert store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the most recent alert raised for a reading.
    ///
    /// A reading may have produced more than one alert; the newest by
    /// `timestamp` wins.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest_for_reading(&self, reading_id: i32) -> Result<Option<Alert>, DbError> {
        let row: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(a) FROM (
                  SELECT * FROM alert WHERE reading_id = $1 ORDER BY timestamp DESC LIMIT 1
              ) a",
        )
        .bind(reading_id)
        .fetch_optional(self.pool)
        .await?;

        rows::decode_opt(row)
    }

    /// List the most recent alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Alert>, DbError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(a) FROM (
                  SELECT * FROM alert ORDER BY timestamp DESC LIMIT $1
              ) a
              ORDER BY a.timestamp DESC",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows::decode_all(rows)
    }

    /// Insert an alert and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, alert: &NewAlert) -> Result<Alert, DbError> {
        let row: serde_json::Value = sqlx::query_scalar(
            r"WITH inserted AS (
                  INSERT INTO alert (reading_id, alert_type_id, timestamp, message, severity)
                  VALUES ($1, $2, COALESCE($3::timestamptz, NOW()), $4, $5)
                  RETURNING *
              )
              SELECT to_jsonb(inserted) FROM inserted",
        )
        .bind(alert.reading_id)
        .bind(alert.alert_type_id)
        .bind(alert.timestamp.as_deref())
        .bind(&alert.message)
        .bind(&alert.severity)
        .fetch_one(self.pool)
        .await?;

        rows::decode(row)
    }
}
