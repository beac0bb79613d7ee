//! A seat at the table: the GM, a connected player, or an offline placeholder.

use serde::{Deserialize, Serialize};

use crate::character_sheet::Character;
use crate::ids::PeerId;
use crate::value_objects::DiceRollResult;

/// Fate points a new seat starts with
pub const DEFAULT_POINTS: &str = "3";

const GAME_MASTER_NAME: &str = "Game Master";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PeerId,
    pub player_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Character>,
    /// Most recent first
    #[serde(default)]
    pub rolls: Vec<DiceRollResult>,
    #[serde(rename = "isGM")]
    pub is_gm: bool,
    /// Kept as text so the sheet can hold free-form values
    pub points: String,
    pub played_during_turn: bool,
    pub offline: bool,
}

impl Player {
    pub fn game_master(id: PeerId) -> Self {
        Self {
            is_gm: true,
            ..Self::connected(id, GAME_MASTER_NAME)
        }
    }

    /// A seat backed by a live connection.
    pub fn connected(id: PeerId, player_name: impl Into<String>) -> Self {
        Self {
            id,
            player_name: player_name.into(),
            character: None,
            rolls: Vec::new(),
            is_gm: false,
            points: DEFAULT_POINTS.to_string(),
            played_during_turn: false,
            offline: false,
        }
    }

    /// A GM-managed seat with no connection behind it.
    pub fn offline_placeholder(id: PeerId) -> Self {
        Self {
            offline: true,
            ..Self::connected(id, "")
        }
    }

    /// Record a roll at the front of the history.
    pub fn push_roll(&mut self, roll: DiceRollResult) {
        self.rolls.insert(0, roll);
    }

    pub fn latest_roll(&self) -> Option<&DiceRollResult> {
        self.rolls.first()
    }

    pub fn has_character(&self) -> bool {
        self.character.is_some()
    }
}
