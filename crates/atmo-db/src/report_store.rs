//! Operations on `userreport` (citizen reports).

use atmo_types::{NewReport, ReportStatus, UserReport};
use sqlx::PgPool;

use crate::error::DbError;
use crate::rows;

/// Location used when a citizen submits a report without one.
pub const DEFAULT_REPORT_LOCATION: i32 = 1;

/// How many reports a listing returns.
pub const REPORT_LIST_LIMIT: i64 = 50;

/// Operations on the `userreport` table.
pub struct ReportStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportStore<'a> {
    /// Create a new report store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Submit a report on behalf of `user_id`. New reports start as
    /// [`ReportStatus::Pending`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, user_id: i32, report: &NewReport) -> Result<UserReport, DbError> {
        let row: serde_json::Value = sqlx::query_scalar(
            r"WITH inserted AS (
                  INSERT INTO userreport (user_id, location_id, timestamp, description, status_id)
                  VALUES ($1, $2, NOW(), $3, $4)
                  RETURNING *
              )
              SELECT to_jsonb(inserted) FROM inserted",
        )
        .bind(user_id)
        .bind(report.location_id.unwrap_or(DEFAULT_REPORT_LOCATION))
        .bind(&report.description)
        .bind(ReportStatus::Pending.id())
        .fetch_one(self.pool)
        .await?;

        rows::decode(row)
    }

    /// List the latest reports with the author's username.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_recent(&self) -> Result<Vec<UserReport>, DbError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(x) FROM (
                  SELECT ur.*, u.username
                  FROM userreport ur
                  LEFT JOIN users u ON ur.user_id = u.user_id
                  ORDER BY ur.timestamp DESC
                  LIMIT $1
              ) x
              ORDER BY x.timestamp DESC",
        )
        .bind(REPORT_LIST_LIMIT)
        .fetch_all(self.pool)
        .await?;

        rows::decode_all(rows)
    }

    /// Change a report's status. Returns `None` if no such report exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update_status(
        &self,
        report_id: i32,
        status_id: i32,
    ) -> Result<Option<UserReport>, DbError> {
        let row: Option<serde_json::Value> = sqlx::query_scalar(
            r"WITH updated AS (
                  UPDATE userreport SET status_id = $1 WHERE report_id = $2
                  RETURNING *
              )
              SELECT to_jsonb(updated) FROM updated",
        )
        .bind(status_id)
        .bind(report_id)
        .fetch_optional(self.pool)
        .await?;

        rows::decode_opt(row)
    }
}
