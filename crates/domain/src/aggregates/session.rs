//! The shared play document.
//!
//! One `Session` exists per play instance. The host owns and mutates it; every
//! player tab holds a read-only replica that is replaced wholesale whenever a
//! new copy arrives. The serialized form is the broadcast payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::character_sheet::CharacterLibrary;
use crate::entities::{Aspect, Player};
use crate::ids::{AspectId, PeerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub gm: Player,
    pub players: Vec<Player>,
    #[serde(default)]
    pub aspects: BTreeMap<AspectId, Aspect>,
    /// Whiteboard strokes; opaque to the play core
    #[serde(default)]
    pub draw_area_objects: Vec<Value>,
    #[serde(default)]
    pub good_confetti: u32,
    #[serde(default)]
    pub bad_confetti: u32,
}

impl Session {
    pub fn new(gm_id: PeerId) -> Self {
        Self {
            gm: Player::game_master(gm_id),
            players: Vec::new(),
            aspects: BTreeMap::new(),
            draw_area_objects: Vec::new(),
            good_confetti: 0,
            bad_confetti: 0,
        }
    }

    /// GM first, then players in roster order.
    pub fn everyone(&self) -> impl Iterator<Item = &Player> {
        std::iter::once(&self.gm).chain(self.players.iter())
    }

    pub fn everyone_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        std::iter::once(&mut self.gm).chain(self.players.iter_mut())
    }

    /// Look up a seat by id, GM included.
    pub fn player(&self, id: &PeerId) -> Option<&Player> {
        self.everyone().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PeerId) -> Option<&mut Player> {
        self.everyone_mut().find(|p| &p.id == id)
    }

    /// Players that brought a sheet, the local user's own seat first.
    pub fn players_with_character_sheets(&self, user_id: &PeerId) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.iter().filter(|p| p.has_character()).collect();
        // stable: keeps roster order otherwise
        players.sort_by_key(|p| &p.id != user_id);
        players
    }

    pub fn user_character_sheet(&self, user_id: &PeerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == user_id)
    }

    /// Push sheets edited during play back into the local character collection.
    ///
    /// The local user's own sheet is added if the library doesn't have it yet;
    /// any sheet in the session replaces the stored copy when it is newer.
    pub fn sync_character_sheets(&self, user_id: &PeerId, library: &dyn CharacterLibrary) {
        for player in &self.players {
            let Some(character) = &player.character else {
                continue;
            };
            if &player.id == user_id {
                library.add_if_absent(character);
            }
            library.update_if_more_recent(character);
        }
    }
}
