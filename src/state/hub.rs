use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::{dto::ws::ServerEvent, state::rooms::ConnectionId};

/// Per-connection outbound queues.
///
/// Delivery is fire-and-forget: a frame pushed to a closed queue is dropped and the
/// next full-state broadcast brings the client back in sync.
#[derive(Default)]
pub struct BroadcastHub {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the outbound queue of a connection; the caller drains the receiver.
    pub fn register(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(connection, tx);
        rx
    }

    /// Close the outbound queue of a connection.
    pub fn unregister(&self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    /// Queue a frame for one connection. Returns `false` when it is gone.
    pub fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        let Some(tx) = self.connections.get(&connection).map(|tx| tx.clone()) else {
            return false;
        };
        tx.send(event).is_ok()
    }

    /// Queue the same frame for every listed connection, returning how many accepted it.
    pub fn send_to_all(&self, connections: &[ConnectionId], event: &ServerEvent) -> usize {
        connections
            .iter()
            .filter(|connection| self.send_to(**connection, event.clone()))
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
