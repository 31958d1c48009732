//! Error types for the server binary.

use atmo_api::ServerError;
use atmo_core::{ConfigError, RelayError};
use atmo_db::DbError;

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that startup can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerBinError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The shared pool could not be created.
    #[error("database error: {source}")]
    Database {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// The notification listener could not be set up.
    #[error("relay error: {source}")]
    Relay {
        /// The underlying relay error.
        #[from]
        source: RelayError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}
