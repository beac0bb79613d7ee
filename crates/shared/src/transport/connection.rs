//! A single bidirectional channel between two peers.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use fari_domain::PeerId;

use super::{Payload, TransportError};
use crate::messages::JoinMeta;

/// Inbound events buffered per subscriber before it starts lagging
pub const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Data(Payload),
    Closed,
}

/// Handle to a connection. Cheap to clone; every clone drives the same channel.
#[derive(Clone)]
pub struct PeerConnection {
    label: PeerId,
    remote: PeerId,
    metadata: JoinMeta,
    outbound: mpsc::UnboundedSender<Payload>,
    events: broadcast::Sender<ConnectionEvent>,
    /// First receiver, created with the channel so nothing sent before the
    /// first subscription is lost
    first_subscriber: Arc<Mutex<Option<broadcast::Receiver<ConnectionEvent>>>>,
    closed: CancellationToken,
}

/// The transport-facing end of a connection: what to write to the wire and
/// where to deliver what comes off it.
pub struct ConnectionIo {
    pub outbound: mpsc::UnboundedReceiver<Payload>,
    pub inbound: broadcast::Sender<ConnectionEvent>,
    pub closed: CancellationToken,
}

impl ConnectionIo {
    pub fn deliver(&self, payload: Payload) {
        // No subscriber means nobody is listening yet; the next full-state
        // broadcast supersedes anything dropped here.
        let _ = self.inbound.send(ConnectionEvent::Data(payload));
    }

    /// Mark the connection closed and tell subscribers.
    pub fn finish(&self) {
        self.closed.cancel();
        let _ = self.inbound.send(ConnectionEvent::Closed);
    }
}

impl PeerConnection {
    /// Build a connection handle and its transport-facing end.
    ///
    /// `label` is the dialing peer's identity on both ends; the host uses it
    /// as the player id. Both halves of a link share `closed`.
    pub fn new(
        label: PeerId,
        remote: PeerId,
        metadata: JoinMeta,
        closed: CancellationToken,
    ) -> (Self, ConnectionIo) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events, first) = broadcast::channel(EVENT_BUFFER);
        let connection = Self {
            label,
            remote,
            metadata,
            outbound: outbound_tx,
            events: events.clone(),
            first_subscriber: Arc::new(Mutex::new(Some(first))),
            closed: closed.clone(),
        };
        let io = ConnectionIo {
            outbound: outbound_rx,
            inbound: events,
            closed,
        };
        (connection, io)
    }

    pub fn label(&self) -> &PeerId {
        &self.label
    }

    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    pub fn metadata(&self) -> &JoinMeta {
        &self.metadata
    }

    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// True if both handles drive the same link. A peer that rejoins gets a
    /// new link under the same label.
    pub fn same_link(&self, other: &PeerConnection) -> bool {
        Arc::ptr_eq(&self.first_subscriber, &other.first_subscriber)
    }

    pub fn send(&self, payload: impl Into<Payload>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(payload.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Listen for inbound data. Dropping the receiver deregisters the listener.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        let stashed = self
            .first_subscriber
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        stashed.unwrap_or_else(|| self.events.subscribe())
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once either end closes the link.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

impl fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnection")
            .field("label", &self.label)
            .field("remote", &self.remote)
            .field("metadata", &self.metadata)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (PeerConnection, ConnectionIo) {
        PeerConnection::new(
            PeerId::new("player"),
            PeerId::new("host"),
            JoinMeta::new("Magnus").unwrap(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn clones_share_a_link_and_rejoins_do_not() {
        let (first, _io) = connection();
        let (second, _second_io) = connection();
        assert!(first.same_link(&first.clone()));
        assert!(!first.same_link(&second));
        assert_eq!(first.label(), second.label());
    }

    #[tokio::test]
    async fn data_delivered_before_first_subscribe_is_kept() {
        let (conn, io) = connection();
        io.deliver("early".to_string());

        let mut events = conn.subscribe();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Data("early".into()));
    }

    #[tokio::test]
    async fn send_reaches_the_transport_end() {
        let (conn, mut io) = connection();
        conn.send("hello").unwrap();
        assert_eq!(io.outbound.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (conn, io) = connection();
        io.finish();
        assert!(!conn.is_open());
        assert_eq!(conn.send("late"), Err(TransportError::ConnectionClosed));

        let mut events = conn.subscribe();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);
    }
}
