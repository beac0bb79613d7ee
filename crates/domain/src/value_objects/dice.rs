//! Dice rolling value objects
//!
//! Covers the fixed set of roll kinds the table uses: Fate dice (4dF, 1dF),
//! two six-sided dice and a coin toss. Face selection is injected so rolling
//! stays deterministic under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

const FATE_DIE: [i32; 6] = [-1, -1, 0, 0, 1, 1];
const COIN: [i32; 2] = [-1, 1];
const SIX_SIDED_DIE: [i32; 6] = [1, 2, 3, 4, 5, 6];

/// The kinds of rolls a player can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiceRollKind {
    #[serde(rename = "4dF")]
    FourFate,
    #[serde(rename = "1dF")]
    OneFate,
    #[serde(rename = "2d6")]
    TwoSixSided,
    #[serde(rename = "coin-toss")]
    CoinToss,
}

impl DiceRollKind {
    /// Number of dice thrown for this kind
    pub fn number_of_dice(&self) -> usize {
        match self {
            Self::FourFate => 4,
            Self::OneFate | Self::CoinToss => 1,
            Self::TwoSixSided => 2,
        }
    }

    /// Face values of a single die of this kind
    pub fn sides(&self) -> &'static [i32] {
        match self {
            Self::FourFate | Self::OneFate => &FATE_DIE,
            Self::TwoSixSided => &SIX_SIDED_DIE,
            Self::CoinToss => &COIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FourFate => "4dF",
            Self::OneFate => "1dF",
            Self::TwoSixSided => "2d6",
            Self::CoinToss => "coin-toss",
        }
    }

    /// Roll this kind, asking `pick_side` for a face index in `0..number_of_sides`.
    ///
    /// Out-of-range indices are clamped to the last face.
    pub fn roll_with(&self, mut pick_side: impl FnMut(usize) -> usize) -> DiceRollResult {
        let sides = self.sides();
        let rolls: Vec<i32> = (0..self.number_of_dice())
            .map(|_| {
                let index = pick_side(sides.len()).min(sides.len() - 1);
                sides[index]
            })
            .collect();

        DiceRollResult {
            total: rolls.iter().sum(),
            rolls,
            kind: *self,
            bonus: None,
            bonus_label: None,
        }
    }
}

impl fmt::Display for DiceRollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiceRollKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "4df" => Ok(Self::FourFate),
            "1df" => Ok(Self::OneFate),
            "2d6" => Ok(Self::TwoSixSided),
            "coin-toss" | "coin" => Ok(Self::CoinToss),
            other => Err(DomainError::parse(format!("Unknown roll kind: '{}'", other))),
        }
    }
}

/// Result of a roll. Immutable once produced; histories prepend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRollResult {
    pub total: i32,
    /// Per-die face values, in throw order
    pub rolls: Vec<i32>,
    #[serde(rename = "type")]
    pub kind: DiceRollKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_label: Option<String>,
}

impl DiceRollResult {
    /// Attach a skill/aspect bonus to the roll. The total stays the raw dice sum.
    pub fn with_bonus(mut self, bonus: i32, label: impl Into<String>) -> Self {
        self.bonus = Some(bonus);
        self.bonus_label = Some(label.into());
        self
    }

    /// Dice total plus the bonus, if any
    pub fn total_with_bonus(&self) -> i32 {
        self.total + self.bonus.unwrap_or(0)
    }
}

impl fmt::Display for DiceRollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces: Vec<String> = self.rolls.iter().map(|r| format!("{:+}", r)).collect();
        write!(f, "{}[{}] = {}", self.kind, faces.join(", "), self.total)?;
        if let Some(bonus) = self.bonus {
            write!(f, " ({:+} {})", bonus, self.bonus_label.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}
