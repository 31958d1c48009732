//! Type-safe identifier for live real-time connections.
//!
//! Store rows are keyed by `serial` integers owned by `PostgreSQL`, so the
//! only identifier minted by the backend itself is the one handed to each
//! `WebSocket` client when it joins the fanout. It uses UUID v7
//! (time-ordered) so log lines sort by connect time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one open real-time connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_matches_uuid() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
