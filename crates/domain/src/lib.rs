//! Fari Domain - the data the play core synchronizes.
//!
//! Pure types and rules: no transport, no runtime. The host's session store
//! mutates these; player tabs only ever replace their copy.

pub mod aggregates;
pub mod character_sheet;
pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use aggregates::Session;
pub use character_sheet::{
    Block, BlockMeta, BlockType, Character, CharacterLibrary, CharacterPage,
    MemoryCharacterLibrary, PageSections, Section,
};
pub use entities::{Aspect, Player, DEFAULT_POINTS};
pub use error::DomainError;
pub use ids::{AspectId, CharacterId, PeerId};
pub use value_objects::{DiceRollKind, DiceRollResult};

#[cfg(any(test, feature = "testing"))]
pub use character_sheet::MockCharacterLibrary;
