//! Connection to the host tab.
//!
//! A player tab holds at most one connection. Nothing here retries: when the
//! link drops the tab reports `Disconnected` and the user rejoins.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::broadcast;

use fari_domain::PeerId;
use fari_shared::{
    ConnectionEvent, DialPeer, JoinMeta, PeerAction, PeerConnection, PeerTransport,
    TransportError,
};

/// Connection state for the player tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the host
    Disconnected,
    /// Dial in flight
    Connecting,
    Connected,
    /// The last join attempt failed
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Could not join the host: {0}")]
    Join(#[from] TransportError),
    #[error("Not connected to the host")]
    NotConnected,
    #[error("Failed to encode action: {0}")]
    Encode(String),
}

#[derive(Default)]
struct ClientInner {
    connection: Option<PeerConnection>,
    connecting: bool,
    error: Option<ClientError>,
}

pub struct PlayerClient {
    transport: Arc<dyn DialPeer>,
    inner: Mutex<ClientInner>,
}

impl PlayerClient {
    pub fn new(transport: Arc<dyn DialPeer>) -> Self {
        Self {
            transport,
            inner: Mutex::new(ClientInner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, ClientInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// This tab's identity; also its player id in the host's session.
    pub fn user_id(&self) -> Option<PeerId> {
        self.transport.id()
    }

    /// Open this tab's identity if needed and dial the host.
    pub async fn connect(
        &self,
        host: &PeerId,
        meta: JoinMeta,
    ) -> Result<PeerConnection, ClientError> {
        {
            let mut inner = self.inner();
            if let Some(previous) = inner.connection.take() {
                previous.close();
            }
            inner.connecting = true;
            inner.error = None;
        }

        let result = match self.transport.open().await {
            Ok(_) => self.transport.connect(host, meta).await,
            Err(e) => Err(e),
        };

        let mut inner = self.inner();
        inner.connecting = false;
        match result {
            Ok(connection) => {
                tracing::info!(host = %host, "Connected to host");
                inner.connection = Some(connection.clone());
                Ok(connection)
            }
            Err(e) => {
                tracing::error!(host = %host, error = %e, "Failed to connect to host");
                let error = ClientError::from(e);
                inner.error = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        let inner = self.inner();
        if inner.connecting {
            ConnectionState::Connecting
        } else if inner.connection.as_ref().is_some_and(PeerConnection::is_open) {
            ConnectionState::Connected
        } else if inner.error.is_some() {
            ConnectionState::Failed
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected_to_host(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn connecting_to_host(&self) -> bool {
        self.state() == ConnectionState::Connecting
    }

    pub fn connecting_to_host_error(&self) -> Option<ClientError> {
        self.inner().error.clone()
    }

    /// Listen for the host's broadcasts on the current connection.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        self.inner().connection.as_ref().map(PeerConnection::subscribe)
    }

    /// Send an action to the host.
    ///
    /// Without a live connection the action is dropped: nothing is sent or
    /// queued and nothing panics. The returned error only says why, so
    /// callers that don't care can ignore it.
    pub fn send_to_host(&self, action: &PeerAction) -> Result<(), ClientError> {
        let connection = self
            .inner()
            .connection
            .clone()
            .filter(PeerConnection::is_open);
        let Some(connection) = connection else {
            tracing::debug!(action = action.tag(), "Not connected, action dropped");
            return Err(ClientError::NotConnected);
        };
        let payload = action
            .to_payload()
            .map_err(|e| ClientError::Encode(e.to_string()))?;
        connection.send(payload).map_err(|e| {
            tracing::warn!(action = action.tag(), error = %e, "Failed to send action");
            ClientError::from(e)
        })
    }

    /// Close the connection to the host, if any.
    pub fn disconnect(&self) {
        if let Some(connection) = self.inner().connection.take() {
            connection.close();
            tracing::info!("Disconnected from host");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fari_domain::DiceRollKind;
    use fari_shared::{AcceptConnections, MemoryNetwork};

    async fn host(network: &MemoryNetwork) -> (fari_shared::MemoryPeer, PeerId) {
        let host = network.peer();
        let id = host.open().await.unwrap();
        (host, id)
    }

    #[tokio::test]
    async fn failed_join_is_reported() {
        let network = MemoryNetwork::new();
        let client = PlayerClient::new(Arc::new(network.peer()));

        let err = client
            .connect(&PeerId::new("nobody"), JoinMeta::new("Magnus").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Join(TransportError::Unreachable(PeerId::new("nobody"))));
        assert_eq!(client.state(), ConnectionState::Failed);
        assert_eq!(client.connecting_to_host_error(), Some(err));
        assert!(!client.is_connected_to_host());
    }

    #[tokio::test]
    async fn send_is_a_no_op_until_connected() {
        let network = MemoryNetwork::new();
        let client = PlayerClient::new(Arc::new(network.peer()));
        let action = PeerAction::PlayedInTurnOrder(true);

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.send_to_host(&action), Err(ClientError::NotConnected));
    }

    #[tokio::test]
    async fn connected_client_reaches_the_host() {
        let network = MemoryNetwork::new();
        let (host, host_id) = host(&network).await;
        let client = PlayerClient::new(Arc::new(network.peer()));

        client
            .connect(&host_id, JoinMeta::new("Magnus").unwrap())
            .await
            .unwrap();
        assert!(client.is_connected_to_host());
        assert!(client.connecting_to_host_error().is_none());

        let accepted = host.connections();
        assert_eq!(Some(accepted[0].label().clone()), client.user_id());
        let mut events = accepted[0].subscribe();

        let roll = DiceRollKind::OneFate.roll_with(|_| 0);
        client.send_to_host(&PeerAction::Roll(roll.clone())).unwrap();
        let ConnectionEvent::Data(payload) = events.recv().await.unwrap() else {
            panic!("expected data");
        };
        assert_eq!(PeerAction::from_payload(&payload).unwrap(), PeerAction::Roll(roll));
    }

    #[tokio::test]
    async fn closed_link_reads_as_disconnected() {
        let network = MemoryNetwork::new();
        let (host, host_id) = host(&network).await;
        let client = PlayerClient::new(Arc::new(network.peer()));
        client
            .connect(&host_id, JoinMeta::new("Magnus").unwrap())
            .await
            .unwrap();

        host.destroy().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(
            client.send_to_host(&PeerAction::UpdateFatePoint(1)),
            Err(ClientError::NotConnected)
        );
    }
}
