//! Host synchronization loop.
//!
//! One task owns the connection registry and drives every effect the host
//! has on the wire:
//!
//! - on each tick, poll the transport table and reconcile the roster
//! - apply inbound player actions in arrival order
//! - broadcast the full session after every committed change
//! - follow the transport's identity so nothing is sent while it is gone
//!
//! Cancelling the token stops the loop and deregisters every listener.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fari_domain::{CharacterLibrary, Session};
use fari_shared::{
    encode_session, AcceptConnections, ConfettiEffect, PeerStatus, PeerTransport,
};

use crate::api::connections::{BroadcastReport, ConnectionRegistry, InboundMessage};
use crate::infrastructure::tick::TickSource;
use crate::stores::SessionStore;
use crate::use_cases::confetti::ConfettiObserver;
use crate::use_cases::dispatch::handle_inbound;

pub struct HostSync {
    store: Arc<SessionStore>,
    registry: ConnectionRegistry,
    inbox: mpsc::UnboundedReceiver<InboundMessage>,
    tick: Box<dyn TickSource>,
    library: Option<Arc<dyn CharacterLibrary>>,
    confetti: Option<ConfettiObserver>,
}

impl HostSync {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn AcceptConnections>,
        tick: Box<dyn TickSource>,
    ) -> Self {
        let (registry, inbox) = ConnectionRegistry::new(transport);
        Self {
            store,
            registry,
            inbox,
            tick,
            library: None,
            confetti: None,
        }
    }

    /// Push sheets edited during play into the GM's character collection.
    pub fn with_character_library(mut self, library: Arc<dyn CharacterLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_confetti(mut self, effect: Arc<dyn ConfettiEffect>) -> Self {
        self.confetti = Some(ConfettiObserver::new(Arc::clone(&self.store), effect));
        self
    }

    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            store,
            mut registry,
            mut inbox,
            mut tick,
            library,
            confetti,
        } = self;
        let mut sessions = store.subscribe();
        let mut status = registry.transport().status();

        tracing::info!("Host sync loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if !registry.poll() {
                        continue;
                    }
                    // a rejoin leaves the roster as it was, so no change
                    // notification will carry the state to the new link
                    if !store.update_players_with_connections(&registry.roster()) {
                        if let Some(session) = store.snapshot() {
                            let current = status.borrow().clone();
                            publish(&registry, &current, &session);
                        }
                    }
                }
                Some(message) = inbox.recv() => {
                    handle_inbound(&store, message);
                }
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = sessions.borrow_and_update().clone();
                    let Some(session) = session else {
                        continue;
                    };
                    let current = status.borrow().clone();
                    publish(&registry, &current, &session);
                    if let Some(library) = &library {
                        session.sync_character_sheets(&session.gm.id, library.as_ref());
                    }
                    if let Some(confetti) = &confetti {
                        confetti.observe();
                    }
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    log_status(&current);
                    // players missed every change made while the identity was gone
                    if current.is_open() {
                        if let Some(session) = store.snapshot() {
                            publish(&registry, &current, &session);
                        }
                    }
                }
            }
        }

        registry.shutdown();
        tracing::info!("Host sync loop stopped");
    }
}

/// Broadcast the whole session while the identity is valid.
fn publish(
    registry: &ConnectionRegistry,
    status: &PeerStatus,
    session: &Session,
) -> BroadcastReport {
    if !status.is_open() {
        tracing::debug!("Transport identity not open, skipping broadcast");
        return BroadcastReport::default();
    }
    let payload = match encode_session(session) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode session");
            return BroadcastReport::default();
        }
    };
    let report = registry.broadcast(&payload);
    tracing::debug!(
        delivered = report.delivered,
        failed = report.failed,
        "Session broadcast"
    );
    report
}

fn log_status(status: &PeerStatus) {
    match status {
        PeerStatus::Open(id) => tracing::info!(peer_id = %id, "Host identity open"),
        PeerStatus::Disconnected => {
            tracing::warn!("Host identity lost, broadcasts paused until a new identity is opened")
        }
        PeerStatus::Closed => tracing::info!("Host transport closed"),
        PeerStatus::Error(e) => tracing::error!(error = %e, "Host transport error"),
        PeerStatus::Pending => {}
    }
}
