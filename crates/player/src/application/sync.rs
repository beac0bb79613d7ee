//! Keeps the local replica in step with the host's broadcasts.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use fari_domain::{CharacterLibrary, PeerId};
use fari_shared::{decode_session, ConfettiEffect, ConnectionEvent};

use crate::state::SessionReplica;

pub struct PlayerSync {
    replica: Arc<SessionReplica>,
    user_id: PeerId,
    library: Option<Arc<dyn CharacterLibrary>>,
    confetti: Option<Arc<dyn ConfettiEffect>>,
}

impl PlayerSync {
    pub fn new(replica: Arc<SessionReplica>, user_id: PeerId) -> Self {
        Self {
            replica,
            user_id,
            library: None,
            confetti: None,
        }
    }

    /// Push sheets seen during play into this player's character collection.
    pub fn with_character_library(mut self, library: Arc<dyn CharacterLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_confetti(mut self, effect: Arc<dyn ConfettiEffect>) -> Self {
        self.confetti = Some(effect);
        self
    }

    /// Apply one broadcast. Returns true if the replica changed.
    pub fn apply_payload(&self, payload: &str) -> bool {
        let session = match decode_session(payload) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse session from host");
                return false;
            }
        };
        let previous = self
            .replica
            .snapshot()
            .map(|s| (s.good_confetti, s.bad_confetti))
            .unwrap_or_default();
        if !self.replica.replace(session.clone()) {
            return false;
        }

        // The host drains its counters after showing them; only a rise is new.
        if let Some(confetti) = &self.confetti {
            if session.good_confetti > previous.0 {
                confetti.fire_confetti();
            }
            if session.bad_confetti > previous.1 {
                confetti.fire_cannon();
            }
        }
        if let Some(library) = &self.library {
            session.sync_character_sheets(&self.user_id, library.as_ref());
        }
        true
    }

    /// Follow the host's broadcasts until the connection closes or `cancel` fires.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<ConnectionEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(ConnectionEvent::Data(payload)) => {
                        self.apply_payload(&payload);
                    }
                    Ok(ConnectionEvent::Closed) | Err(RecvError::Closed) => {
                        tracing::warn!("Connection to host closed");
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // the next broadcast carries the full state again
                        tracing::warn!(skipped, "Missed host broadcasts");
                    }
                },
            }
        }
    }
}
