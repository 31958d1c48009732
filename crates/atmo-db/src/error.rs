//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] and [`serde_json`] errors.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A row could not be decoded into its typed form.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the underlying pool or listener has been shut down.
    ///
    /// Callers that loop on the store use this to tell a permanent stop
    /// apart from a transient failure worth logging and moving past.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Postgres(sqlx::Error::PoolClosed))
    }
}
