//! WebSocket transport for player connections.
//!
//! The host tab listens on `/play/{session}`. Players dial with their own
//! identity as `label` and their display name as `playerName` in the query
//! string. The share identity is the full join URL, so it becomes invalid as
//! soon as the listener goes away.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use fari_domain::PeerId;
use fari_shared::{
    AcceptConnections, ConnectionEvent, ConnectionIo, JoinMeta, PeerConnection, PeerStatus,
    PeerTransport, TransportError,
};

/// Connection table keyed by the dialer's label. The sequence number keeps
/// snapshots in join order.
type ConnectionTable = DashMap<PeerId, (u64, PeerConnection)>;

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub label: String,
    #[serde(rename = "playerName")]
    pub player_name: String,
}

/// Combined state for the join handler.
struct AcceptorState {
    session: String,
    table: Arc<ConnectionTable>,
    next_seq: AtomicU64,
}

pub struct WsAcceptor {
    bind_addr: SocketAddr,
    status: watch::Sender<PeerStatus>,
    table: Arc<ConnectionTable>,
    shutdown: Mutex<CancellationToken>,
}

impl WsAcceptor {
    pub fn new(bind_addr: SocketAddr) -> Self {
        let (status, _) = watch::channel(PeerStatus::Pending);
        Self {
            bind_addr,
            status,
            table: Arc::new(DashMap::new()),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn close_all(&self) {
        for entry in self.table.iter() {
            entry.value().1.close();
        }
        self.table.clear();
    }
}

#[async_trait]
impl PeerTransport for WsAcceptor {
    async fn open(&self) -> Result<PeerId, TransportError> {
        if let Some(id) = self.id() {
            return Ok(id);
        }

        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| TransportError::Io(format!("bind {}: {e}", self.bind_addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let session = Uuid::new_v4().to_string();
        let id = PeerId::new(format!("ws://{local_addr}/play/{session}"));
        let state = Arc::new(AcceptorState {
            session,
            table: Arc::clone(&self.table),
            next_seq: AtomicU64::new(0),
        });
        let router = Router::new()
            .route("/play/{session}", get(join_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let shutdown = CancellationToken::new();
        *self
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = shutdown.clone();
        let status = self.status.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "WebSocket listener failed");
                status.send_replace(PeerStatus::Error(e.to_string()));
            }
        });

        self.status.send_replace(PeerStatus::Open(id.clone()));
        tracing::info!(addr = %local_addr, "Listening for players");
        Ok(id)
    }

    fn status(&self) -> watch::Receiver<PeerStatus> {
        self.status.subscribe()
    }

    async fn destroy(&self) {
        self.shutdown_token().cancel();
        self.close_all();
        self.status.send_replace(PeerStatus::Closed);
        tracing::info!("WebSocket listener closed");
    }
}

impl AcceptConnections for WsAcceptor {
    fn connections(&self) -> Vec<PeerConnection> {
        self.table.retain(|_, (_, connection)| connection.is_open());
        let mut connections: Vec<(u64, PeerConnection)> =
            self.table.iter().map(|entry| entry.value().clone()).collect();
        connections.sort_by_key(|(seq, _)| *seq);
        connections.into_iter().map(|(_, c)| c).collect()
    }
}

/// WebSocket upgrade handler - entry point for joining players.
async fn join_handler(
    ws: WebSocketUpgrade,
    Path(session): Path<String>,
    Query(query): Query<JoinQuery>,
    State(state): State<Arc<AcceptorState>>,
) -> Response {
    if session != state.session {
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    }
    let label = query.label.trim();
    if label.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing label").into_response();
    }
    let meta = match JoinMeta::new(query.player_name) {
        Ok(meta) => meta,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let label = PeerId::new(label);
    ws.on_upgrade(move |socket| handle_socket(socket, label, meta, state))
}

/// Bridge one socket to a `PeerConnection` until either side closes.
async fn handle_socket(
    socket: WebSocket,
    label: PeerId,
    meta: JoinMeta,
    state: Arc<AcceptorState>,
) {
    let (connection, io) =
        PeerConnection::new(label.clone(), label.clone(), meta, CancellationToken::new());
    let seq = state.next_seq.fetch_add(1, Ordering::Relaxed);
    if let Some((_, previous)) = state.table.insert(label.clone(), (seq, connection)) {
        previous.close();
    }
    tracing::info!(player_id = %label, "WebSocket connection established");

    let ConnectionIo {
        mut outbound,
        inbound,
        closed,
    } = io;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward outbound payloads to the socket
    let writer_closed = closed.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                payload = outbound.recv() => match payload {
                    Some(payload) => {
                        if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = writer_closed.cancelled() => break,
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    // Handle incoming messages
    let reader_label = label.clone();
    let reader_inbound = inbound.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let _ = reader_inbound.send(ConnectionEvent::Data(text.as_str().to_owned()));
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(player_id = %reader_label, "WebSocket closed by player");
                    break;
                }
                Err(e) => {
                    tracing::warn!(player_id = %reader_label, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Clean up
    closed.cancel();
    let _ = inbound.send(ConnectionEvent::Closed);
    state
        .table
        .remove_if(&label, |_, (entry_seq, _)| *entry_seq == seq);
    tracing::info!(player_id = %label, "WebSocket connection terminated");
}
