use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers in the play core are opaque strings: the transport hands out
/// peer ids, and sheets/cards created locally get a fresh v4 uuid rendered as text.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Transport-assigned address of a tab; doubles as the player id
define_id!(PeerId);

// Index cards on the scene
define_id!(AspectId);

// Character sheets
define_id!(CharacterId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(PeerId::generate(), PeerId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = PeerId::new("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
        let back: PeerId = serde_json::from_str("\"abc-123\"").unwrap();
        assert_eq!(back, id);
    }
}
