//! Message types exchanged over a peer connection
//!
//! - Host → players: the full [`Session`] document on every change, no envelope.
//!   Receivers treat each payload as a complete replacement.
//! - Player → host: small tagged [`PeerAction`]s, dispatched by tag.
//! - [`JoinMeta`] rides on connection establishment, never on the data channel.
//!
//! ## Versioning Policy
//!
//! - New action tags can be added (forward compatible)
//! - Unknown tags deserialize to `PeerAction::Unknown` so an older host ignores them

use serde::{Deserialize, Serialize};

use fari_domain::{Character, DiceRollResult, DomainError, Session};

/// Metadata a player supplies when dialing the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeta {
    pub player_name: String,
}

impl JoinMeta {
    /// Names are cosmetic (two players may share one) but must not be blank.
    pub fn new(player_name: impl Into<String>) -> Result<Self, DomainError> {
        let player_name = player_name.into().trim().to_string();
        if player_name.is_empty() {
            return Err(DomainError::validation("Player name cannot be empty"));
        }
        Ok(Self { player_name })
    }
}

/// Requests from a player tab to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum PeerAction {
    /// A roll to prepend to the sender's history
    Roll(DiceRollResult),
    /// New value for the sender's fate point counter
    UpdateFatePoint(i32),
    /// Sheet edited by its owner during play
    UpdateCharacter(Character),
    /// Sheet picked from the owner's library; also restores its turn flag
    LoadCharacter(Character),
    /// Toggle of the sender's turn-order flag
    PlayedInTurnOrder(bool),
    /// Unknown action for forward compatibility
    #[serde(other)]
    Unknown,
}

impl PeerAction {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Roll(_) => "roll",
            Self::UpdateFatePoint(_) => "update-fate-point",
            Self::UpdateCharacter(_) => "update-character",
            Self::LoadCharacter(_) => "load-character",
            Self::PlayedInTurnOrder(_) => "played-in-turn-order",
            Self::Unknown => "unknown",
        }
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Serialize the session as a broadcast payload.
pub fn encode_session(session: &Session) -> Result<String, serde_json::Error> {
    serde_json::to_string(session)
}

/// Parse a broadcast payload received from the host.
pub fn decode_session(payload: &str) -> Result<Session, serde_json::Error> {
    serde_json::from_str(payload)
}
