//! Read-only analytics and map queries.

use atmo_types::{DailyAverage, SensorLocation};
use sqlx::PgPool;

use crate::error::DbError;
use crate::rows;

/// Queries backing the analytics chart and the sensor map.
pub struct AnalyticsStore<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsStore<'a> {
    /// Create a new analytics store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Refresh `daily_sensor_averages`, then list it oldest day first.
    ///
    /// When `sensor_id` is `None` every sensor is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the refresh or the query fails.
    pub async fn daily_averages(
        &self,
        sensor_id: Option<i32>,
        limit: i64,
    ) -> Result<Vec<DailyAverage>, DbError> {
        sqlx::query(r"SELECT refresh_daily_sensor_averages()")
            .execute(self.pool)
            .await?;

        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(v) FROM (
                  SELECT * FROM daily_sensor_averages
                  WHERE $1::INT IS NULL OR sensor_id = $1
                  ORDER BY reading_date ASC
                  LIMIT $2
              ) v
              ORDER BY v.reading_date ASC",
        )
        .bind(sensor_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows::decode_all(rows)
    }

    /// Every sensor with coordinates, plus its latest reading value.
    ///
    /// Coordinates come from the `PostGIS` `location.coordinates` column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn sensor_locations(&self) -> Result<Vec<SensorLocation>, DbError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(m) FROM (
                  SELECT
                      s.sensor_id,
                      s.name AS sensor_name,
                      l.name AS location_name,
                      ST_Y(l.coordinates::geometry)::FLOAT8 AS lat,
                      ST_X(l.coordinates::geometry)::FLOAT8 AS lng,
                      (
                          SELECT r.value::FLOAT8
                          FROM reading r
                          WHERE r.sensor_id = s.sensor_id
                          ORDER BY r.timestamp DESC
                          LIMIT 1
                      ) AS latest_value
                  FROM sensor s
                  JOIN location l ON s.location_id = l.location_id
                  WHERE l.coordinates IS NOT NULL
              ) m",
        )
        .fetch_all(self.pool)
        .await?;

        rows::decode_all(rows)
    }
}
