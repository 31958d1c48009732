//! Bearer-token authentication and role guards.
//!
//! Tokens are HS256 JWTs issued at login and carried in the
//! `Authorization` header as `Bearer <token>`. Two extractors guard
//! routes:
//!
//! - [`AuthUser`] -- any valid token.
//! - [`AdminUser`] -- a valid token whose `role_id` is the admin role.
//!
//! New passwords are stored as Argon2id PHC strings. Accounts created
//! before the switch still carry bcrypt hashes (`$2a$`, `$2b$`, `$2y$`),
//! which keep verifying.

use std::sync::Arc;
use std::time::Duration;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use atmo_types::{Role, User};
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Rejection body when no token is supplied.
pub const TOKEN_REQUIRED: &str = "A token is required for authentication";
/// Rejection body when the token does not verify.
pub const INVALID_TOKEN: &str = "Invalid Token";
/// Rejection body when a non-admin calls an admin route.
pub const ADMIN_REQUIRED: &str = "Requires admin privileges";

/// Salt length in bytes before base64 encoding.
const SALT_LEN: usize = 16;

/// Version prefixes of bcrypt modular-crypt hashes.
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    /// User email.
    pub email: String,
    /// Role id at the time of login.
    pub role_id: i32,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

impl Claims {
    /// The user id encoded in `sub`.
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }

    /// Whether the token was issued to an admin.
    pub fn is_admin(&self) -> bool {
        Role::from_id(self.role_id).is_some_and(Role::is_admin)
    }
}

/// Issues and verifies access tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtService {
    /// Create a service signing with `secret`; tokens live for `ttl`.
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if encoding fails.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.issue_claims(&Claims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            role_id: user.role_id,
            iat: now,
            exp: now.saturating_add(ttl),
        })
    }

    /// Sign an explicit set of claims.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if encoding fails.
    pub fn issue_claims(&self, claims: &Claims) -> Result<String, ApiError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify a token's signature and expiry and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for any invalid token.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized(INVALID_TOKEN.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Hash a password with Argon2id and a random salt.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt_bytes: [u8; SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ApiError::Internal(format!("failed to build salt: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
}

/// Check a password against a stored hash.
///
/// bcrypt hashes are recognised by their version prefix; anything else
/// must be an Argon2 PHC string. An unparsable hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix)) {
        return bcrypt::verify(password, hash).unwrap_or(false);
    }

    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// A caller holding a valid token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Forbidden(TOKEN_REQUIRED.to_owned()))?;
        state.jwt.verify(token).map(Self)
    }
}

/// A caller holding a valid admin token.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(ApiError::Forbidden(ADMIN_REQUIRED.to_owned()));
        }
        Ok(Self(claims))
    }
}

/// The second word of the `Authorization` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .nth(1)
}
