//! Error types for the HTTP API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that is
//! converted into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"error": <message>, "status": <code>}`.

use atmo_db::DbError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Errors that can occur while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested row does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request was well-formed but cannot be honoured.
    #[error("{0}")]
    BadRequest(String),

    /// The request body failed validation.
    #[error("invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The bearer token was present but not valid.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    /// A store operation failed.
    #[error("{0}")]
    Database(#[from] DbError),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(
            ApiError::NotFound("Report not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unauthorized("Invalid Token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Database(DbError::Config("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn message_is_rendered_verbatim() {
        let err = ApiError::Forbidden("Requires admin privileges".into());
        assert_eq!(err.to_string(), "Requires admin privileges");
    }
}
