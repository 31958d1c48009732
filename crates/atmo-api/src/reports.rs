//! Citizen report endpoints.
//!
//! | Method | Path | Guard | Description |
//! |--------|------|-------|-------------|
//! | `GET` | `/api/reports` | token | Latest 50 reports with author |
//! | `POST` | `/api/reports` | token | Submit a report as the caller |
//! | `PUT` | `/api/reports/{id}` | admin | Change a report's status |

use std::sync::Arc;

use atmo_db::ReportStore;
use atmo_types::{NewReport, ReportStatus};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use crate::auth::{AdminUser, AuthUser, INVALID_TOKEN};
use crate::error::ApiError;
use crate::state::AppState;

/// Body of `PUT /api/reports/{id}`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    /// New status id; see [`ReportStatus`].
    pub status_id: i32,
}

/// `GET /api/reports`
pub async fn list_reports(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = ReportStore::new(state.db.pool()).list_recent().await?;
    Ok(Json(rows))
}

/// `POST /api/reports` -- the author is taken from the token, never the
/// body.
pub async fn create_report(
    AuthUser(claims): AuthUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewReport>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_owned()))?;
    if body.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description is required".to_owned()));
    }

    let report = ReportStore::new(state.db.pool())
        .insert(user_id, &body)
        .await?;
    info!(report_id = report.report_id, user_id, "Report submitted");
    Ok((StatusCode::CREATED, Json(report)))
}

/// `PUT /api/reports/{id}`
pub async fn update_report_status(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<i32>,
    Json(body): Json<StatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let status = ReportStatus::from_id(body.status_id)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status_id {}", body.status_id)))?;

    let report = ReportStore::new(state.db.pool())
        .update_status(report_id, status.id())
        .await?
        .ok_or_else(|| ApiError::NotFound("Report not found".to_owned()))?;

    info!(report_id, status = ?status, "Report status updated");
    Ok(Json(report))
}
