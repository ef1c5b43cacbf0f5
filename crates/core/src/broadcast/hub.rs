//! Connection registry and fanout for queue events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use super::QueueEvent;

/// Identifies one websocket connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Fanout hub for queue events.
///
/// Every registered connection receives every event, in registration
/// order. Delivery is best effort: a connection whose channel is closed
/// is dropped from the registry and never fails the broadcast.
pub struct BroadcastHub {
    connections: Mutex<Vec<(ConnectionId, mpsc::UnboundedSender<QueueEvent>)>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new viewer. Returns the connection id and the receiving
    /// end of its event channel.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<QueueEvent>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        let mut connections = self.connections.lock().unwrap();
        connections.push((id, tx));
        tracing::debug!(connection = %id, total = connections.len(), "viewer connected");

        (id, rx)
    }

    /// Remove a connection from the registry. Safe to call for an id that
    /// was already removed.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut connections = self.connections.lock().unwrap();
        let before = connections.len();
        connections.retain(|(conn_id, _)| *conn_id != id);
        if connections.len() < before {
            tracing::debug!(connection = %id, total = connections.len(), "viewer disconnected");
        }
    }

    /// Send an event to every registered connection, in registration order.
    ///
    /// Returns the number of connections the event was delivered to.
    /// Connections with a closed channel are pruned.
    pub fn broadcast(&self, event: &QueueEvent) -> usize {
        // Snapshot under the lock, send outside it. A send on an unbounded
        // channel never blocks, but handler code must not run while the
        // registry is held.
        let snapshot: Vec<(ConnectionId, mpsc::UnboundedSender<QueueEvent>)> = {
            let connections = self.connections.lock().unwrap();
            connections.clone()
        };

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, tx) in &snapshot {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(connection = %id, command = %event.command, "dropping viewer with closed channel");
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.lock().unwrap();
            connections.retain(|(conn_id, _)| !dead.contains(conn_id));
        }

        delivered
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
