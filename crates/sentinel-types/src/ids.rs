//! Type-safe identifier wrappers around the client's numeric ids.
//!
//! The game client addresses actors, skills, and items by plain integers.
//! Wrapping each in its own newtype keeps a skill id from ever being sent
//! where a target id is expected. On the wire they stay bare integers.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw client identifier.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the raw client identifier.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of an entity in the game world (monster, player, NPC).
    ActorId
}

define_id! {
    /// Identifier of a skill in the client's skill table.
    SkillId
}

define_id! {
    /// Identifier of an item in the client's item table.
    ItemId
}
