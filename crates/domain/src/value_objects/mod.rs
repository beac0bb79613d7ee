//! Value objects - immutable data carried inside the session document.

mod dice;

pub use dice::{DiceRollKind, DiceRollResult};
