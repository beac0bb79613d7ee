//! In-process transport.
//!
//! Every `MemoryPeer` created from the same `MemoryNetwork` can reach the
//! others by identity. Used for local (same-process) play and as the transport
//! double in tests, including signaling loss via [`MemoryPeer::disconnect`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use fari_domain::PeerId;

use super::{
    AcceptConnections, ConnectionEvent, ConnectionIo, DialPeer, Payload, PeerConnection,
    PeerStatus, PeerTransport, TransportError,
};
use crate::messages::JoinMeta;

type ConnectionTable = Arc<Mutex<Vec<PeerConnection>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Signaling stand-in: maps open identities to their inbound tables.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    peers: Arc<Mutex<HashMap<PeerId, ConnectionTable>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a peer on this network. Call `open()` before using it.
    pub fn peer(&self) -> MemoryPeer {
        let (status, _) = watch::channel(PeerStatus::Pending);
        MemoryPeer {
            network: self.clone(),
            status,
            accepted: Arc::new(Mutex::new(Vec::new())),
            dialed: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, id: PeerId, table: ConnectionTable) {
        lock(&self.peers).insert(id, table);
    }

    fn unregister(&self, id: &PeerId) {
        lock(&self.peers).remove(id);
    }

    fn lookup(&self, id: &PeerId) -> Option<ConnectionTable> {
        lock(&self.peers).get(id).cloned()
    }
}

pub struct MemoryPeer {
    network: MemoryNetwork,
    status: watch::Sender<PeerStatus>,
    accepted: ConnectionTable,
    dialed: Mutex<Vec<PeerConnection>>,
}

impl MemoryPeer {
    /// Drop off the signaling network. The identity becomes invalid and new
    /// dials to it fail; established connections stay up.
    pub fn disconnect(&self) {
        if let Some(id) = self.id() {
            self.network.unregister(&id);
            tracing::warn!(peer_id = %id, "Connection lost. Please reconnect");
        }
        self.status.send_replace(PeerStatus::Disconnected);
    }
}

#[async_trait]
impl PeerTransport for MemoryPeer {
    async fn open(&self) -> Result<PeerId, TransportError> {
        if let Some(id) = self.id() {
            return Ok(id);
        }
        let id = PeerId::generate();
        self.network.register(id.clone(), Arc::clone(&self.accepted));
        self.status.send_replace(PeerStatus::Open(id.clone()));
        tracing::debug!(peer_id = %id, "Memory peer open");
        Ok(id)
    }

    fn status(&self) -> watch::Receiver<PeerStatus> {
        self.status.subscribe()
    }

    async fn destroy(&self) {
        if let Some(id) = self.id() {
            self.network.unregister(&id);
        }
        for connection in lock(&self.accepted).drain(..) {
            connection.close();
        }
        for connection in lock(&self.dialed).drain(..) {
            connection.close();
        }
        self.status.send_replace(PeerStatus::Closed);
        tracing::debug!("Memory peer destroyed");
    }
}

impl AcceptConnections for MemoryPeer {
    fn connections(&self) -> Vec<PeerConnection> {
        let mut table = lock(&self.accepted);
        table.retain(PeerConnection::is_open);
        table.clone()
    }
}

#[async_trait]
impl DialPeer for MemoryPeer {
    async fn connect(
        &self,
        remote: &PeerId,
        metadata: JoinMeta,
    ) -> Result<PeerConnection, TransportError> {
        let local_id = self.id().ok_or(TransportError::NotOpen)?;
        let remote_table = self
            .network
            .lookup(remote)
            .ok_or_else(|| TransportError::Unreachable(remote.clone()))?;

        let closed = CancellationToken::new();
        let (local, local_io) = PeerConnection::new(
            local_id.clone(),
            remote.clone(),
            metadata.clone(),
            closed.clone(),
        );
        let (far, far_io) = PeerConnection::new(local_id.clone(), local_id, metadata, closed);
        link(local_io, far_io);

        lock(&remote_table).push(far);
        lock(&self.dialed).push(local.clone());
        tracing::debug!(remote = %remote, label = %local.label(), "Memory connection opened");
        Ok(local)
    }
}

fn link(a: ConnectionIo, b: ConnectionIo) {
    let ConnectionIo {
        outbound: a_out,
        inbound: a_in,
        closed,
    } = a;
    let ConnectionIo {
        outbound: b_out,
        inbound: b_in,
        ..
    } = b;
    tokio::spawn(pump(a_out, b_in, closed.clone()));
    tokio::spawn(pump(b_out, a_in, closed));
}

async fn pump(
    mut from: mpsc::UnboundedReceiver<Payload>,
    to: broadcast::Sender<ConnectionEvent>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            payload = from.recv() => match payload {
                Some(payload) => {
                    let _ = to.send(ConnectionEvent::Data(payload));
                }
                None => break,
            },
            _ = closed.cancelled() => break,
        }
    }
    closed.cancel();
    let _ = to.send(ConnectionEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_is_undefined_until_open() {
        let network = MemoryNetwork::new();
        let peer = network.peer();
        assert_eq!(peer.id(), None);
        assert_eq!(*peer.status().borrow(), PeerStatus::Pending);

        let id = peer.open().await.unwrap();
        assert_eq!(peer.id(), Some(id.clone()));
        assert_eq!(peer.open().await.unwrap(), id);
    }

    #[tokio::test]
    async fn dial_requires_open_identity_and_known_remote() {
        let network = MemoryNetwork::new();
        let player = network.peer();
        let meta = JoinMeta::new("Magnus").unwrap();

        let err = player.connect(&PeerId::new("host"), meta.clone()).await.unwrap_err();
        assert_eq!(err, TransportError::NotOpen);

        player.open().await.unwrap();
        let err = player.connect(&PeerId::new("host"), meta).await.unwrap_err();
        assert_eq!(err, TransportError::Unreachable(PeerId::new("host")));
    }

    #[tokio::test]
    async fn both_ends_exchange_data() {
        let network = MemoryNetwork::new();
        let host = network.peer();
        let player = network.peer();
        let host_id = host.open().await.unwrap();
        let player_id = player.open().await.unwrap();

        let to_host = player
            .connect(&host_id, JoinMeta::new("Magnus").unwrap())
            .await
            .unwrap();
        let accepted = host.connections();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].label(), &player_id);
        assert_eq!(accepted[0].metadata().player_name, "Magnus");

        let mut host_events = accepted[0].subscribe();
        let mut player_events = to_host.subscribe();
        to_host.send("ping").unwrap();
        accepted[0].send("pong").unwrap();

        assert_eq!(host_events.recv().await.unwrap(), ConnectionEvent::Data("ping".into()));
        assert_eq!(player_events.recv().await.unwrap(), ConnectionEvent::Data("pong".into()));
    }

    #[tokio::test]
    async fn closing_one_end_drops_it_from_the_table() {
        let network = MemoryNetwork::new();
        let host = network.peer();
        let player = network.peer();
        let host_id = host.open().await.unwrap();
        player.open().await.unwrap();

        let to_host = player
            .connect(&host_id, JoinMeta::new("Magnus").unwrap())
            .await
            .unwrap();
        let mut host_events = host.connections()[0].subscribe();

        to_host.close();
        assert_eq!(host_events.recv().await.unwrap(), ConnectionEvent::Closed);
        assert!(host.connections().is_empty());
    }

    #[tokio::test]
    async fn disconnect_invalidates_identity() {
        let network = MemoryNetwork::new();
        let host = network.peer();
        let player = network.peer();
        let host_id = host.open().await.unwrap();
        player.open().await.unwrap();

        host.disconnect();
        assert_eq!(host.id(), None);
        assert_eq!(*host.status().borrow(), PeerStatus::Disconnected);
        let err = player
            .connect(&host_id, JoinMeta::new("Magnus").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Unreachable(host_id));
    }
}
