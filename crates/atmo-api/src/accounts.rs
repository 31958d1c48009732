//! Registration and login.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/auth/register` | Create an account |
//! | `POST` | `/api/auth/login` | Exchange credentials for a token |

use std::sync::Arc;

use atmo_db::UserStore;
use atmo_types::Role;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::auth::{hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    /// Login email; must be unique.
    #[validate(email)]
    pub email: String,
    /// Plain-text password.
    #[validate(length(min = 1))]
    pub password: String,
    /// `Admin` or `Scientist`; anything else registers a citizen.
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Login email.
    #[validate(length(min = 1))]
    pub email: String,
    /// Plain-text password.
    #[validate(length(min = 1))]
    pub password: String,
}

/// `POST /api/auth/register` -- returns the new account with `201`.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let users = UserStore::new(state.db.pool());
    if users.email_exists(&body.email).await? {
        return Err(ApiError::BadRequest("User already exists".to_owned()));
    }

    let password = body.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))??;

    let role = Role::from_label(body.role.as_deref());
    let user = users
        .insert(&body.username, &body.email, &password_hash, role)
        .await?;

    info!(user_id = user.user_id, role_id = user.role_id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/auth/login` -- returns `{message, token, user}`.
///
/// Unknown email and wrong password give the same answer.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let invalid = || ApiError::BadRequest("Invalid credentials".to_owned());

    let credentials = UserStore::new(state.db.pool())
        .find_by_email(&body.email)
        .await?
        .ok_or_else(invalid)?;

    let password = body.password;
    let hash = credentials.password_hash;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))?;
    if !valid {
        return Err(invalid());
    }

    let user = credentials.user;
    let token = state.jwt.issue(&user)?;
    info!(user_id = user.user_id, "User logged in");

    Ok(Json(serde_json::json!({
        "message": "Login successful",
        "token": token,
        "user": {
            "id": user.user_id,
            "username": user.username,
            "role_id": user.role_id,
        },
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_an_email() {
        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "ana",
            "email": "not-an-email",
            "password": "pw"
        }))
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn register_role_is_optional() {
        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "ana",
            "email": "ana@example.org",
            "password": "pw"
        }))
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(Role::from_label(body.role.as_deref()), Role::Citizen);
    }

    #[test]
    fn login_rejects_empty_password() {
        let body = LoginRequest {
            email: "ana@example.org".to_owned(),
            password: String::new(),
        };
        assert!(body.validate().is_err());
    }
}
