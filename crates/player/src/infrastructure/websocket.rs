//! Dialing the host over WebSocket.
//!
//! A host identity is its join URL (`ws://host:port/play/<session>`). This
//! tab's own identity is generated locally and sent as the `label` query
//! parameter, along with the display name as `playerName`.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use fari_domain::PeerId;
use fari_shared::{
    ConnectionEvent, ConnectionIo, DialPeer, JoinMeta, PeerConnection, PeerStatus,
    PeerTransport, TransportError,
};

/// Build the URL to join `host` as `label`.
pub fn join_url(host: &PeerId, label: &PeerId, meta: &JoinMeta) -> Result<Url, TransportError> {
    let mut url = Url::parse(host.as_str())
        .map_err(|_| TransportError::Unreachable(host.clone()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(TransportError::Unreachable(host.clone()));
    }
    url.query_pairs_mut()
        .append_pair("label", label.as_str())
        .append_pair("playerName", &meta.player_name);
    Ok(url)
}

pub struct WsDialer {
    status: watch::Sender<PeerStatus>,
    dialed: Mutex<Vec<PeerConnection>>,
}

impl WsDialer {
    pub fn new() -> Self {
        let (status, _) = watch::channel(PeerStatus::Pending);
        Self {
            status,
            dialed: Mutex::new(Vec::new()),
        }
    }

    fn dialed(&self) -> MutexGuard<'_, Vec<PeerConnection>> {
        self.dialed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for WsDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for WsDialer {
    async fn open(&self) -> Result<PeerId, TransportError> {
        if let Some(id) = self.id() {
            return Ok(id);
        }
        let id = PeerId::generate();
        self.status.send_replace(PeerStatus::Open(id.clone()));
        Ok(id)
    }

    fn status(&self) -> watch::Receiver<PeerStatus> {
        self.status.subscribe()
    }

    async fn destroy(&self) {
        for connection in self.dialed().drain(..) {
            connection.close();
        }
        self.status.send_replace(PeerStatus::Closed);
    }
}

#[async_trait]
impl DialPeer for WsDialer {
    async fn connect(
        &self,
        remote: &PeerId,
        metadata: JoinMeta,
    ) -> Result<PeerConnection, TransportError> {
        let local = self.id().ok_or(TransportError::NotOpen)?;
        let url = join_url(remote, &local, &metadata)?;

        let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            tracing::warn!(host = %remote, error = %e, "Failed to connect to host");
            TransportError::Unreachable(remote.clone())
        })?;
        tracing::info!(host = %remote, "Connected to host");

        let (connection, io) =
            PeerConnection::new(local, remote.clone(), metadata, CancellationToken::new());
        tokio::spawn(bridge(stream, io));

        let mut dialed = self.dialed();
        dialed.retain(PeerConnection::is_open);
        dialed.push(connection.clone());
        Ok(connection)
    }
}

type HostStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pump frames between the socket and the connection until either side closes.
async fn bridge(stream: HostStream, io: ConnectionIo) {
    let (mut write, mut read) = stream.split();
    let ConnectionIo {
        mut outbound,
        inbound,
        closed,
    } = io;

    let writer_closed = closed.clone();
    let mut write_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                payload = outbound.recv() => match payload {
                    Some(payload) => {
                        if let Err(e) = write.send(Message::Text(payload)).await {
                            tracing::error!(error = %e, "Failed to send message");
                            break;
                        }
                    }
                    None => break,
                },
                _ = writer_closed.cancelled() => break,
            }
        }
        let _ = write.send(Message::Close(None)).await;
    });

    let reader_inbound = inbound.clone();
    let mut read_handle = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let _ = reader_inbound.send(ConnectionEvent::Data(text));
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Host closed connection");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_handle => write_handle.abort(),
        _ = &mut write_handle => read_handle.abort(),
    }
    closed.cancel();
    let _ = inbound.send(ConnectionEvent::Closed);
}
