//! Read operations on `disasterevent`, joined with its reference tables.

use atmo_types::DisasterEvent;
use sqlx::PgPool;

use crate::error::DbError;
use crate::rows;

/// Operations on the `disasterevent` table.
pub struct DisasterStore<'a> {
    pool: &'a PgPool,
}

impl<'a> DisasterStore<'a> {
    /// Create a new disaster store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one disaster event with its type and subgroup names.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, event_id: i32) -> Result<Option<DisasterEvent>, DbError> {
        let row: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(x) FROM (
                  SELECT d.*, dt.type_name, ds.subgroup_name
                  FROM disasterevent d
                  LEFT JOIN disastertype dt ON d.disaster_type_id = dt.type_id
                  LEFT JOIN disastersubgroup ds ON dt.subgroup_id = ds.subgroup_id
                  WHERE d.event_id = $1
              ) x",
        )
        .bind(event_id)
        .fetch_optional(self.pool)
        .await?;

        rows::decode_opt(row)
    }

    /// List the most recent disaster events, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<DisasterEvent>, DbError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(x) FROM (
                  SELECT d.*, dt.type_name, ds.subgroup_name
                  FROM disasterevent d
                  LEFT JOIN disastertype dt ON d.disaster_type_id = dt.type_id
                  LEFT JOIN disastersubgroup ds ON dt.subgroup_id = ds.subgroup_id
                  ORDER BY d.start_timestamp DESC
                  LIMIT $1
              ) x
              ORDER BY x.start_timestamp DESC",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows::decode_all(rows)
    }
}
