//! Shared application state for the HTTP server.
//!
//! [`AppState`] holds the two things every handler may touch: the shared
//! store pool and the real-time [`Fanout`]. It is built once in `main`
//! and injected through Axum's `State` extractor.

use std::sync::Arc;
use std::time::Duration;

use atmo_core::Fanout;
use atmo_db::PostgresPool;

use crate::auth::JwtService;

/// Default deadline for writing one frame to a `WebSocket` client.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Shared `PostgreSQL` pool.
    pub db: PostgresPool,
    /// Live real-time connections.
    pub fanout: Arc<Fanout>,
    /// Token issuing and verification.
    pub jwt: JwtService,
    /// Deadline for writing one frame to a `WebSocket` client.
    pub send_timeout: Duration,
}

impl AppState {
    /// Create the application state.
    pub const fn new(db: PostgresPool, fanout: Arc<Fanout>, jwt: JwtService) -> Self {
        Self {
            db,
            fanout,
            jwt,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-frame `WebSocket` send deadline.
    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}
