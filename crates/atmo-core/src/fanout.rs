//! Registry of live real-time connections and broadcast to all of them.
//!
//! Each connection gets a bounded queue. [`Fanout::broadcast`] never waits:
//! it offers the event to every queue with `try_send` and moves on, so a
//! slow client loses events instead of stalling the relay or a request
//! handler. There is no backlog; a connection only sees events broadcast
//! while it is registered.
//!
//! The registry is deliberately independent of any transport so that
//! membership and delivery can be tested without a socket. The `WebSocket`
//! endpoint in `atmo-api` drains a [`Subscription`] into its socket.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use atmo_types::{ConnectionId, FanoutMessage, RealtimeEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// The receiving side of one registered connection.
#[derive(Debug)]
pub struct Subscription {
    /// Identity of the connection in the registry.
    pub id: ConnectionId,
    /// Events broadcast while this connection is registered.
    pub rx: mpsc::Receiver<Arc<FanoutMessage>>,
}

/// Connection registry with broadcast-to-all.
#[derive(Debug)]
pub struct Fanout {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<Arc<FanoutMessage>>>>,
    queue_capacity: usize,
}

impl Fanout {
    /// Create an empty registry.
    ///
    /// `queue_capacity` is the number of undelivered events buffered per
    /// connection; it is clamped to at least 1.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection.
    pub fn connect(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = ConnectionId::new();

        let total = {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            connections.insert(id, tx);
            connections.len()
        };

        debug!(connection_id = %id, total, "Real-time client connected");
        Subscription { id, rx }
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let (removed, total) = {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let removed = connections.remove(&id).is_some();
            (removed, connections.len())
        };

        if removed {
            debug!(connection_id = %id, total, "Real-time client disconnected");
        }
        removed
    }

    /// Send an event to every registered connection.
    ///
    /// Returns the number of connections whose queue accepted the event.
    /// Connections whose receiver has gone away are pruned; connections
    /// whose queue is full miss this event only.
    pub fn broadcast(&self, event: RealtimeEvent, data: serde_json::Value) -> usize {
        let message = Arc::new(FanoutMessage::new(event, data));
        let mut delivered: usize = 0;
        let mut closed = Vec::new();

        {
            let connections = self
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for (id, tx) in connections.iter() {
                match tx.try_send(Arc::clone(&message)) {
                    Ok(()) => delivered = delivered.saturating_add(1),
                    Err(TrySendError::Full(_)) => {
                        warn!(connection_id = %id, %event, "Client queue full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut connections = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for id in &closed {
                connections.remove(id);
            }
        }

        debug!(%event, delivered, pruned = closed.len(), "Broadcast sent");
        delivered
    }

    /// Serialize a record and broadcast it.
    ///
    /// A record that fails to serialize is logged and delivered to nobody.
    pub fn broadcast_record<T: Serialize>(&self, event: RealtimeEvent, record: &T) -> usize {
        match serde_json::to_value(record) {
            Ok(data) => self.broadcast(event, data),
            Err(e) => {
                warn!(%event, error = %e, "Failed to serialize broadcast body");
                0
            }
        }
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a connection is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new(256)
    }
}
