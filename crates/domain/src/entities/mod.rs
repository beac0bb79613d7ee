//! Entities with identity that live inside the session document.

mod aspect;
mod player;

pub use aspect::Aspect;
pub use player::{Player, DEFAULT_POINTS};
