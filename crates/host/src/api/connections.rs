//! Connection registry for player tabs.
//!
//! Mirrors the transport's inbound table: one data listener per live
//! connection, registered when the connection shows up and deregistered when
//! it leaves, so listeners never pile up across polls.

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;

use fari_domain::PeerId;
use fari_shared::{AcceptConnections, ConnectionEvent, Payload, PeerConnection};

use crate::stores::RosterEntry;

/// A payload received from a player, tagged with the sender's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: PeerId,
    pub payload: Payload,
}

/// Outcome of sending one payload to every connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// A spawned data listener and the link it drains.
struct Listener {
    connection: PeerConnection,
    task: JoinHandle<()>,
}

pub struct ConnectionRegistry {
    transport: Arc<dyn AcceptConnections>,
    /// Last polled snapshot, in transport order
    connections: Vec<PeerConnection>,
    listeners: Vec<Listener>,
    inbox: mpsc::UnboundedSender<InboundMessage>,
}

impl ConnectionRegistry {
    /// Create a registry over `transport`. Data from every connection lands
    /// in the returned inbox.
    pub fn new(
        transport: Arc<dyn AcceptConnections>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundMessage>) {
        let (inbox, rx) = mpsc::unbounded_channel();
        let registry = Self {
            transport,
            connections: Vec::new(),
            listeners: Vec::new(),
            inbox,
        };
        (registry, rx)
    }

    pub fn transport(&self) -> &Arc<dyn AcceptConnections> {
        &self.transport
    }

    /// Re-read the transport's table. Returns true if the set of connections
    /// changed since the last poll, including a player that rejoined under
    /// the same label.
    pub fn poll(&mut self) -> bool {
        let current = self.transport.connections();
        let changed = current.len() != self.connections.len()
            || current
                .iter()
                .zip(&self.connections)
                .any(|(now, before)| !now.same_link(before));

        self.listeners.retain(|listener| {
            let alive = current.iter().any(|c| c.same_link(&listener.connection));
            if !alive {
                listener.task.abort();
                tracing::debug!(player_id = %listener.connection.label(), "Listener deregistered");
            }
            alive
        });
        for connection in &current {
            let listening = self
                .listeners
                .iter()
                .any(|listener| listener.connection.same_link(connection));
            if !listening {
                let task = tokio::spawn(listen(connection.clone(), self.inbox.clone()));
                self.listeners.push(Listener {
                    connection: connection.clone(),
                    task,
                });
                tracing::info!(
                    player_id = %connection.label(),
                    player_name = %connection.metadata().player_name,
                    "Player connected"
                );
            }
        }

        self.connections = current;
        changed
    }

    pub fn connections(&self) -> &[PeerConnection] {
        &self.connections
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// The connected players as the roster sees them.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.connections
            .iter()
            .map(|c| RosterEntry {
                id: c.label().clone(),
                player_name: c.metadata().player_name.clone(),
            })
            .collect()
    }

    /// Send `payload` to every known connection. A failed send is logged and
    /// does not stop the others.
    pub fn broadcast(&self, payload: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for connection in &self.connections {
            match connection.send(payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        player_id = %connection.label(),
                        error = %e,
                        "Failed to broadcast session"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Deregister every listener.
    pub fn shutdown(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.task.abort();
        }
        self.connections.clear();
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn listen(connection: PeerConnection, inbox: mpsc::UnboundedSender<InboundMessage>) {
    let mut events = connection.subscribe();
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Data(payload)) => {
                let message = InboundMessage {
                    from: connection.label().clone(),
                    payload,
                };
                if inbox.send(message).is_err() {
                    break;
                }
            }
            Ok(ConnectionEvent::Closed) | Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    player_id = %connection.label(),
                    skipped,
                    "Listener lagged, messages dropped"
                );
            }
        }
    }
    tracing::debug!(player_id = %connection.label(), "Connection closed");
}
