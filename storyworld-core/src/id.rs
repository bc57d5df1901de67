//! Typed identifiers for storyworld entities.
//!
//! Every entity kind gets its own UUID newtype so a `SceneId` can never be
//! passed where an `EventId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Defines a newtype ID wrapper around UUID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID.
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an ID from an existing UUID.
            #[inline]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            #[inline]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Create a nil (all zeros) ID.
            #[inline]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Check if this is a nil ID.
            #[inline]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(
    /// Identifier of a World, the root container.
    WorldId
);

define_id!(
    /// Identifier of a Folder.
    FolderId
);

define_id!(
    /// Identifier of a Scene.
    SceneId
);

define_id!(
    /// Identifier of an Event.
    EventId
);

define_id!(
    /// Identifier of a Choice anchored on a Choice-type Event.
    ChoiceId
);

define_id!(
    /// Identifier of the single outgoing handle of an Input-type Event.
    InputId
);

define_id!(
    /// Identifier of a Jump.
    JumpId
);

define_id!(
    /// Identifier of a Path (flow-graph edge).
    PathId
);

define_id!(
    /// Identifier of a story Variable.
    VariableId
);
