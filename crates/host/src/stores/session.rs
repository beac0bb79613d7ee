//! Authoritative session store.
//!
//! The host tab owns the only mutable copy of the session. Every action is a
//! transactional edit through [`SessionStore::update`]; subscribers are woken
//! only when an action actually changed something. Before `create` and after
//! `dispose` there is no session and every action is a no-op.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::watch;

use fari_domain::{Aspect, AspectId, Character, DiceRollResult, PeerId, Player, Session};
use fari_shared::ClockPort;

/// A live connection as the roster sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: PeerId,
    pub player_name: String,
}

pub struct SessionStore {
    state: watch::Sender<Option<Session>>,
    /// Ids kicked by the GM. Reconciliation never brings them back, even if
    /// their connection lingers in the transport table.
    removed_players: Mutex<HashSet<PeerId>>,
    clock: Arc<dyn ClockPort>,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            removed_players: Mutex::new(HashSet::new()),
            clock,
        }
    }

    /// Start a fresh game with `gm_id` in the GM seat.
    pub fn create(&self, gm_id: PeerId) {
        self.removed().clear();
        tracing::info!(gm_id = %gm_id, "Session created");
        self.state.send_replace(Some(Session::new(gm_id)));
    }

    /// Drop the session. Later actions are ignored until the next `create`.
    pub fn dispose(&self) {
        if self.state.send_replace(None).is_some() {
            tracing::info!("Session disposed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// Watch committed changes. The receiver starts with the current value
    /// marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    pub fn gm_id(&self) -> Option<PeerId> {
        self.state.borrow().as_ref().map(|s| s.gm.id.clone())
    }

    pub fn is_removed(&self, id: &PeerId) -> bool {
        self.removed().contains(id)
    }

    fn removed(&self) -> MutexGuard<'_, HashSet<PeerId>> {
        self.removed_players
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now(&self) -> i64 {
        self.clock.now().timestamp()
    }

    /// Apply `edit` to the draft. `edit` reports whether it changed anything;
    /// only then are subscribers notified.
    fn update(&self, edit: impl FnOnce(&mut Session) -> bool) -> bool {
        self.state.send_if_modified(|draft| match draft {
            Some(session) => edit(session),
            None => false,
        })
    }

    fn update_player(&self, id: &PeerId, edit: impl FnOnce(&mut Player) -> bool) -> bool {
        self.update(|session| match session.player_mut(id) {
            Some(player) => edit(player),
            None => {
                tracing::debug!(player_id = %id, "Action for unknown player ignored");
                false
            }
        })
    }

    fn update_aspect(&self, id: &AspectId, edit: impl FnOnce(&mut Aspect) -> bool) -> bool {
        self.update(|session| match session.aspects.get_mut(id) {
            Some(aspect) => edit(aspect),
            None => false,
        })
    }

    // ---------------------------------------------------------------------
    // Roster
    // ---------------------------------------------------------------------

    /// Rebuild the player list from the live connections.
    ///
    /// Connected players keep their rolls, sheet, points and turn flag across
    /// reconciliations. Offline players are kept after the connected ones.
    /// Anyone the GM removed is left out.
    pub fn update_players_with_connections(&self, connections: &[RosterEntry]) -> bool {
        let removed = self.removed().clone();
        self.update(|session| {
            let connected = connections.iter().map(|entry| {
                let prior = session.players.iter().find(|p| p.id == entry.id);
                let mut player = Player::connected(entry.id.clone(), entry.player_name.clone());
                if let Some(prior) = prior {
                    player.character = prior.character.clone();
                    player.rolls = prior.rolls.clone();
                    player.points = prior.points.clone();
                    player.played_during_turn = prior.played_during_turn;
                }
                player
            });
            let offline = session.players.iter().filter(|p| p.offline).cloned();
            let players: Vec<Player> = connected
                .chain(offline)
                .filter(|p| !removed.contains(&p.id))
                .collect();

            if players == session.players {
                return false;
            }
            session.players = players;
            true
        })
    }

    /// Seat a player who has no connection. Returns its id, or `None` when
    /// there is no session.
    pub fn add_offline_player(&self) -> Option<PeerId> {
        let id = PeerId::generate();
        let added = self.update(|session| {
            session.players.push(Player::offline_placeholder(id.clone()));
            true
        });
        added.then_some(id)
    }

    /// Kick a player. The id stays banned for the rest of the session.
    pub fn remove_player(&self, id: &PeerId) -> bool {
        if !self.is_initialized() {
            return false;
        }
        self.removed().insert(id.clone());
        self.update(|session| {
            let before = session.players.len();
            session.players.retain(|p| &p.id != id);
            session.players.len() != before
        })
    }

    // ---------------------------------------------------------------------
    // Rolls and celebrations
    // ---------------------------------------------------------------------

    pub fn update_gm_roll(&self, roll: DiceRollResult) -> bool {
        self.update(|session| {
            session.gm.push_roll(roll);
            true
        })
    }

    pub fn update_player_roll(&self, id: &PeerId, roll: DiceRollResult) -> bool {
        self.update_player(id, |player| {
            player.push_roll(roll);
            true
        })
    }

    pub fn fire_good_confetti(&self) -> bool {
        self.update(|session| {
            session.good_confetti = session.good_confetti.saturating_add(1);
            true
        })
    }

    pub fn fire_bad_confetti(&self) -> bool {
        self.update(|session| {
            session.bad_confetti = session.bad_confetti.saturating_add(1);
            true
        })
    }

    /// Reset the good counter once the effect has been shown. Returns the
    /// count that was pending.
    pub fn drain_good_confetti(&self) -> u32 {
        let mut pending = 0;
        self.update(|session| {
            pending = std::mem::take(&mut session.good_confetti);
            pending > 0
        });
        pending
    }

    pub fn drain_bad_confetti(&self) -> u32 {
        let mut pending = 0;
        self.update(|session| {
            pending = std::mem::take(&mut session.bad_confetti);
            pending > 0
        });
        pending
    }

    // ---------------------------------------------------------------------
    // Table
    // ---------------------------------------------------------------------

    pub fn update_draw_area_objects(&self, objects: Vec<Value>) -> bool {
        self.update(|session| {
            if session.draw_area_objects == objects {
                return false;
            }
            session.draw_area_objects = objects;
            true
        })
    }

    /// Clear the turn-order flag for everyone, GM included.
    pub fn reset_initiative(&self) -> bool {
        self.update(|session| {
            let mut changed = false;
            for player in session.everyone_mut() {
                changed |= std::mem::take(&mut player.played_during_turn);
            }
            changed
        })
    }

    /// Clear the drawing and everyone's turn-order flag. Players, rolls
    /// and aspects stay.
    pub fn reset(&self) -> bool {
        self.update(|session| {
            let mut changed = !session.draw_area_objects.is_empty();
            session.draw_area_objects.clear();
            for player in session.everyone_mut() {
                changed |= std::mem::take(&mut player.played_during_turn);
            }
            changed
        })
    }

    // ---------------------------------------------------------------------
    // Character sheets
    // ---------------------------------------------------------------------

    pub fn update_player_character(&self, id: &PeerId, character: Character) -> bool {
        self.update_player(id, |player| {
            if player.character.as_ref() == Some(&character) {
                return false;
            }
            player.character = Some(character);
            true
        })
    }

    /// Bring a sheet into play. The player's turn-order flag is restored
    /// from the sheet.
    pub fn load_player_character(&self, id: &PeerId, character: Character) -> bool {
        self.update_player(id, |player| {
            player.played_during_turn = character.played_during_turn.unwrap_or(false);
            player.character = Some(character);
            true
        })
    }

    pub fn update_player_played_during_turn(&self, id: &PeerId, played: bool) -> bool {
        let now = self.now();
        self.update_player(id, |player| {
            player.played_during_turn = played;
            if let Some(character) = player.character.as_mut() {
                character.played_during_turn = Some(played);
                character.last_updated = now;
            }
            true
        })
    }

    /// Set a player's points and mirror them into the sheet's main point
    /// counter. `max` is written as given; `None` clears it.
    pub fn update_player_character_main_point_counter(
        &self,
        id: &PeerId,
        points: &str,
        max: Option<&str>,
    ) -> bool {
        let now = self.now();
        self.update_player(id, |player| {
            player.points = points.to_string();
            if let Some(character) = player.character.as_mut() {
                character.set_main_point_counter(points, max, now);
            }
            true
        })
    }

    // ---------------------------------------------------------------------
    // Aspects
    // ---------------------------------------------------------------------

    /// Add an empty aspect card. Returns its id, or `None` when there is no
    /// session.
    pub fn add_aspect(&self) -> Option<AspectId> {
        let id = AspectId::generate();
        let added = self.update(|session| {
            session.aspects.insert(id.clone(), Aspect::default());
            true
        });
        added.then_some(id)
    }

    pub fn remove_aspect(&self, id: &AspectId) -> bool {
        self.update(|session| session.aspects.remove(id).is_some())
    }

    pub fn reset_aspect(&self, id: &AspectId) -> bool {
        self.update_aspect(id, |aspect| {
            aspect.reset();
            true
        })
    }

    pub fn update_aspect_title(&self, id: &AspectId, title: impl Into<String>) -> bool {
        let title = title.into();
        self.update_aspect(id, |aspect| {
            aspect.title = title;
            true
        })
    }

    pub fn update_aspect_content(&self, id: &AspectId, content: impl Into<String>) -> bool {
        let content = content.into();
        self.update_aspect(id, |aspect| {
            aspect.content = content;
            true
        })
    }

    /// Tick or untick an existing box. Indexes past the end are ignored.
    pub fn update_aspect_checkbox(&self, id: &AspectId, index: usize, value: bool) -> bool {
        self.update_aspect(id, |aspect| match aspect.checkboxes.get_mut(index) {
            Some(checkbox) => {
                *checkbox = value;
                true
            }
            None => false,
        })
    }

    pub fn update_aspect_consequence(
        &self,
        id: &AspectId,
        index: usize,
        value: impl Into<String>,
    ) -> bool {
        let value = value.into();
        self.update_aspect(id, |aspect| match aspect.consequences.get_mut(index) {
            Some(consequence) => {
                *consequence = value;
                true
            }
            None => false,
        })
    }

    pub fn add_aspect_checkbox(&self, id: &AspectId) -> bool {
        self.update_aspect(id, |aspect| {
            aspect.checkboxes.push(false);
            true
        })
    }

    pub fn add_aspect_consequence(&self, id: &AspectId) -> bool {
        self.update_aspect(id, |aspect| {
            aspect.consequences.push(String::new());
            true
        })
    }

    // ---------------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------------

    pub fn players_with_character_sheets(&self, user_id: &PeerId) -> Vec<Player> {
        self.state
            .borrow()
            .as_ref()
            .map(|session| {
                session
                    .players_with_character_sheets(user_id)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn user_character_sheet(&self, user_id: &PeerId) -> Option<Player> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|session| session.user_character_sheet(user_id).cloned())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(fari_shared::SystemClock))
    }
}
