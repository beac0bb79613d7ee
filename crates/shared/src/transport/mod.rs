//! Peer transport contract
//!
//! A transport gives a tab an addressable identity and bidirectional channels
//! ("connections") to other tabs. The contract is split by capability so each
//! side only depends on what it uses:
//!
//! - [`PeerTransport`] - identity, status and teardown (every tab)
//! - [`AcceptConnections`] - snapshot of the inbound connection table (host)
//! - [`DialPeer`] - open a connection to a remote identity (players)
//!
//! Transports never retry. Losing the identity is reported through
//! [`PeerTransport::status`] and dependents must stop sending until a new
//! identity is obtained.

mod connection;
mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use fari_domain::PeerId;

use crate::messages::JoinMeta;

pub use connection::{ConnectionEvent, ConnectionIo, PeerConnection, EVENT_BUFFER};
pub use memory::{MemoryNetwork, MemoryPeer};

/// Opaque payload carried over a connection
pub type Payload = String;

/// Lifecycle of a tab's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStatus {
    /// `open()` not called yet, or the handshake is in flight
    Pending,
    Open(PeerId),
    /// Signaling lost; existing connections may linger but the identity is gone
    Disconnected,
    /// Destroyed by its owner
    Closed,
    Error(String),
}

impl PeerStatus {
    /// The identity, only while open
    pub fn id(&self) -> Option<&PeerId> {
        match self {
            Self::Open(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport identity is not open")]
    NotOpen,
    #[error("Peer unreachable: {0}")]
    Unreachable(PeerId),
    #[error("Signaling failed: {0}")]
    Signaling(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Operation not supported by this transport: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Complete the handshake and return this tab's identity.
    async fn open(&self) -> Result<PeerId, TransportError>;

    /// Watch the identity lifecycle.
    fn status(&self) -> watch::Receiver<PeerStatus>;

    /// Current identity, `None` unless open.
    fn id(&self) -> Option<PeerId> {
        let status = self.status();
        let id = status.borrow().id().cloned();
        id
    }

    /// Tear down the identity and every connection.
    async fn destroy(&self);
}

/// Inbound side: the live connection table.
///
/// The table is polled rather than pushed; implementations may lag behind
/// open/close events, so callers reconcile on a tick.
pub trait AcceptConnections: PeerTransport {
    fn connections(&self) -> Vec<PeerConnection>;
}

/// Outbound side.
#[async_trait]
pub trait DialPeer: PeerTransport {
    async fn connect(
        &self,
        remote: &PeerId,
        metadata: JoinMeta,
    ) -> Result<PeerConnection, TransportError>;
}
