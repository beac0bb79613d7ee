//! Character sheets as carried inside the session.
//!
//! The sheet layout (pages, two columns of sections, typed blocks) belongs to
//! the character editor. The play core only needs a few fields: identity, the
//! last-modified stamp used to pick the newer copy, the turn-order flag and the
//! main point counter. Everything else round-trips untouched via `extra`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::CharacterId;

/// A character sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    #[serde(default)]
    pub name: String,
    /// Unix seconds of the last edit
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_during_turn: Option<bool>,
    #[serde(default)]
    pub pages: Vec<CharacterPage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterPage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sections: PageSections,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSections {
    #[serde(default)]
    pub left: Vec<Section>,
    #[serde(default)]
    pub right: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    Text,
    Numeric,
    Skill,
    DicePool,
    PointCounter,
    SlotTracker,
    Link,
    Image,
    Separator,
    /// Block kinds this crate doesn't know about, kept verbatim
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub meta: BlockMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_main_point_counter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    pub fn is_main_point_counter(&self) -> bool {
        self.block_type == BlockType::PointCounter && self.meta.is_main_point_counter == Some(true)
    }
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>, last_updated: i64) -> Self {
        Self {
            id,
            name: name.into(),
            last_updated,
            played_during_turn: None,
            pages: Vec::new(),
            extra: Map::new(),
        }
    }

    fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.pages.iter_mut().flat_map(|page| {
            page.sections
                .left
                .iter_mut()
                .chain(page.sections.right.iter_mut())
                .flat_map(|section| section.blocks.iter_mut())
        })
    }

    /// Write `points`/`max` into every main point counter block.
    ///
    /// Returns true if at least one block was updated; `last_updated` is then set to `now`.
    pub fn set_main_point_counter(&mut self, points: &str, max: Option<&str>, now: i64) -> bool {
        let mut updated = false;
        for block in self.blocks_mut().filter(|b| b.is_main_point_counter()) {
            block.value = Value::String(points.to_string());
            block.meta.max = max.map(str::to_string);
            updated = true;
        }
        if updated {
            self.last_updated = now;
        }
        updated
    }

    fn main_point_counter_block(&self) -> Option<&Block> {
        self.pages
            .iter()
            .flat_map(|p| p.sections.left.iter().chain(p.sections.right.iter()))
            .flat_map(|s| s.blocks.iter())
            .find(|b| b.is_main_point_counter())
    }

    /// Value of the first main point counter block, if the sheet has one
    pub fn main_point_counter(&self) -> Option<&Value> {
        self.main_point_counter_block().map(|b| &b.value)
    }

    pub fn main_point_counter_max(&self) -> Option<&str> {
        self.main_point_counter_block()
            .and_then(|b| b.meta.max.as_deref())
    }
}

/// The player's persistent character collection.
///
/// Durable storage lives outside the play core; this is the seam the session
/// uses to push sheets edited during play back into it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CharacterLibrary: Send + Sync {
    /// Insert the character unless one with the same id is already stored.
    fn add_if_absent(&self, character: &Character) -> bool;

    /// Replace the stored copy when `character` is strictly newer.
    fn update_if_more_recent(&self, character: &Character) -> bool;
}

/// In-memory character library.
#[derive(Debug, Default)]
pub struct MemoryCharacterLibrary {
    characters: Mutex<HashMap<CharacterId, Character>>,
}

impl MemoryCharacterLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CharacterId, Character>> {
        self.characters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, id: &CharacterId) -> Option<Character> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl CharacterLibrary for MemoryCharacterLibrary {
    fn add_if_absent(&self, character: &Character) -> bool {
        let mut characters = self.lock();
        if characters.contains_key(&character.id) {
            return false;
        }
        characters.insert(character.id.clone(), character.clone());
        true
    }

    fn update_if_more_recent(&self, character: &Character) -> bool {
        let mut characters = self.lock();
        match characters.get_mut(&character.id) {
            Some(existing) if character.last_updated > existing.last_updated => {
                *existing = character.clone();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet_json() -> Value {
        json!({
            "id": "char-1",
            "name": "Magnus",
            "lastUpdated": 100,
            "group": "Tuesday game",
            "pages": [{
                "id": "page-1",
                "label": "Character",
                "sections": {
                    "left": [{
                        "id": "s-1",
                        "label": "Fate Points",
                        "blocks": [{
                            "id": "b-1",
                            "label": "FP",
                            "type": "PointCounter",
                            "value": "3",
                            "meta": { "isMainPointCounter": true, "max": "3", "isTrack": false }
                        }, {
                            "id": "b-2",
                            "label": "Notes",
                            "type": "Scribble",
                            "value": ""
                        }]
                    }],
                    "right": []
                }
            }]
        })
    }

    #[test]
    fn unknown_fields_and_block_types_round_trip() {
        let character: Character = serde_json::from_value(sheet_json()).unwrap();
        let blocks = &character.pages[0].sections.left[0].blocks;
        assert_eq!(blocks[1].block_type, BlockType::Other("Scribble".to_string()));

        let back = serde_json::to_value(&character).unwrap();
        assert_eq!(back["group"], "Tuesday game");
        assert_eq!(back["pages"][0]["sections"]["left"][0]["blocks"][1]["type"], "Scribble");
        assert_eq!(
            back["pages"][0]["sections"]["left"][0]["blocks"][0]["meta"]["isTrack"],
            false
        );
    }

    #[test]
    fn main_point_counter_is_updated_and_stamped() {
        let mut character: Character = serde_json::from_value(sheet_json()).unwrap();
        assert!(character.set_main_point_counter("5", Some("6"), 200));
        assert_eq!(character.last_updated, 200);
        assert_eq!(character.main_point_counter(), Some(&json!("5")));
        let block = &character.pages[0].sections.left[0].blocks[0];
        assert_eq!(block.meta.max.as_deref(), Some("6"));
    }

    #[test]
    fn sheet_without_main_counter_is_left_alone() {
        let mut character = Character::new(CharacterId::new("c"), "Nobody", 10);
        assert!(!character.set_main_point_counter("5", None, 200));
        assert_eq!(character.last_updated, 10);
    }

    #[test]
    fn library_only_takes_newer_copies() {
        let library = MemoryCharacterLibrary::new();
        let old = Character::new(CharacterId::new("c"), "Old", 10);
        let newer = Character::new(CharacterId::new("c"), "New", 20);

        assert!(!library.update_if_more_recent(&old));
        assert!(library.add_if_absent(&old));
        assert!(!library.add_if_absent(&newer));
        assert!(library.update_if_more_recent(&newer));
        assert!(!library.update_if_more_recent(&old));
        assert_eq!(library.get(&CharacterId::new("c")).unwrap().name, "New");
        assert_eq!(library.len(), 1);
    }
}
