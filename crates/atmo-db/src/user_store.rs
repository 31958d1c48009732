//! Operations on the `users` table.

use atmo_types::{Role, User, UserCredentials};
use sqlx::PgPool;

use crate::error::DbError;
use crate::rows;

/// Operations on the `users` table.
pub struct UserStore<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStore<'a> {
    /// Create a new user store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up an account and its password hash by email.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserCredentials>, DbError> {
        let row: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT to_jsonb(u) FROM (
                  SELECT user_id, username, email, password_hash, role_id
                  FROM users WHERE email = $1
              ) u",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        rows::decode_opt(row)
    }

    /// Whether an account with this email already exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn email_exists(&self, email: &str) -> Result<bool, DbError> {
        let exists: bool =
            sqlx::query_scalar(r"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Create an account. The password must already be hashed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails (including a
    /// unique-constraint race on `email`).
    pub async fn insert(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, DbError> {
        let row: serde_json::Value = sqlx::query_scalar(
            r"WITH created AS (
                  INSERT INTO users (username, email, password_hash, role_id)
                  VALUES ($1, $2, $3, $4)
                  RETURNING user_id, username, email, role_id
              )
              SELECT to_jsonb(created) FROM created",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role.id())
        .fetch_one(self.pool)
        .await?;

        let user: User = rows::decode(row)?;
        tracing::info!(user_id = user.user_id, role = ?role, "Registered user");
        Ok(user)
    }
}
