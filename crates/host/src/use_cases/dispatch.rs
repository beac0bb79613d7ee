//! Applying player actions to the authoritative session.

use fari_domain::PeerId;
use fari_shared::PeerAction;

use crate::api::connections::InboundMessage;
use crate::stores::SessionStore;

/// Decode and apply one inbound payload. Undecodable payloads are logged and
/// dropped.
pub fn handle_inbound(store: &SessionStore, message: InboundMessage) -> bool {
    match PeerAction::from_payload(&message.payload) {
        Ok(action) => apply_peer_action(store, &message.from, action),
        Err(e) => {
            tracing::warn!(player_id = %message.from, error = %e, "Failed to parse player action");
            false
        }
    }
}

/// Route a player action to the store action of the same name, acting on the
/// sender's seat. Returns true if the session changed.
pub fn apply_peer_action(store: &SessionStore, from: &PeerId, action: PeerAction) -> bool {
    tracing::debug!(player_id = %from, action = action.tag(), "Player action");
    match action {
        PeerAction::Roll(roll) => store.update_player_roll(from, roll),
        PeerAction::UpdateFatePoint(points) => {
            // the sheet's max is not part of the message; keep what is there
            let max = store
                .user_character_sheet(from)
                .and_then(|player| player.character)
                .and_then(|character| character.main_point_counter_max().map(str::to_string));
            store.update_player_character_main_point_counter(
                from,
                &points.to_string(),
                max.as_deref(),
            )
        }
        PeerAction::UpdateCharacter(character) => store.update_player_character(from, character),
        PeerAction::LoadCharacter(character) => store.load_player_character(from, character),
        PeerAction::PlayedInTurnOrder(played) => {
            store.update_player_played_during_turn(from, played)
        }
        PeerAction::Unknown => {
            tracing::debug!(player_id = %from, "Unknown player action ignored");
            false
        }
    }
}
