//! Application composition for the host tab.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fari_domain::{CharacterLibrary, DiceRollKind, DiceRollResult, PeerId};
use fari_shared::{
    roll_dice, AcceptConnections, ClockPort, ConfettiEffect, LogConfetti, PeerTransport,
    RandomPort, SystemClock, SystemRandom, TransportError,
};

use crate::infrastructure::tick::TickSource;
use crate::stores::SessionStore;
use crate::use_cases::HostSync;

/// Collaborators injected into the host.
pub struct Services {
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
    pub confetti: Arc<dyn ConfettiEffect>,
    pub library: Option<Arc<dyn CharacterLibrary>>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            random: Arc::new(SystemRandom),
            confetti: Arc::new(LogConfetti),
            library: None,
        }
    }
}

/// A running game on the host tab.
///
/// Owns the session store and the sync loop task. `dispose` ends the game.
pub struct App {
    pub store: Arc<SessionStore>,
    transport: Arc<dyn AcceptConnections>,
    random: Arc<dyn RandomPort>,
    identity: PeerId,
    cancel: CancellationToken,
    sync: JoinHandle<()>,
}

impl App {
    /// Open the transport identity, create the session and start syncing.
    pub async fn start(
        transport: Arc<dyn AcceptConnections>,
        tick: Box<dyn TickSource>,
        services: Services,
    ) -> Result<Self, TransportError> {
        let identity = transport.open().await?;

        let store = Arc::new(SessionStore::new(services.clock));
        store.create(PeerId::generate());

        let mut sync = HostSync::new(Arc::clone(&store), Arc::clone(&transport), tick)
            .with_confetti(services.confetti);
        if let Some(library) = services.library {
            sync = sync.with_character_library(library);
        }
        let cancel = CancellationToken::new();
        let sync = tokio::spawn(sync.run(cancel.clone()));

        tracing::info!(identity = %identity, "Game started");
        Ok(Self {
            store,
            transport,
            random: services.random,
            identity,
            cancel,
            sync,
        })
    }

    /// The identity players join with.
    pub fn identity(&self) -> &PeerId {
        &self.identity
    }

    /// Roll for the GM and record it.
    pub fn roll_for_gm(&self, kind: DiceRollKind) -> DiceRollResult {
        let roll = roll_dice(kind, self.random.as_ref());
        self.store.update_gm_roll(roll.clone());
        roll
    }

    /// End the game: stop syncing, drop the session and tear down the transport.
    pub async fn dispose(self) {
        self.cancel.cancel();
        if let Err(e) = self.sync.await {
            tracing::error!(error = %e, "Sync loop ended abnormally");
        }
        self.store.dispose();
        self.transport.destroy().await;
        tracing::info!("Game ended");
    }
}
