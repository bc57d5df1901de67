//! Error types for storyworld editing.
//!
//! Contract violations and store failures are errors; referential gaps
//! (a reference whose target is already gone) are not, and read as `None`.

use crate::graph::ConnectionRejection;
use crate::id::{ChoiceId, EventId, SceneId};
use crate::model::{ElementRef, EntityRef, EventType, ItemKind, NodeRef};
use std::fmt;

/// Main error type returned by editor operations.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The operation is illegal in the current state.
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractError),

    /// A read or single write against the store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Some writes of a multi-entity operation did not persist.
    #[error("{operation} persisted partially: {} write(s) failed", .failed.len())]
    PartialWrite {
        /// The logical operation that was being committed.
        operation: &'static str,
        /// The writes that failed.
        failed: Vec<FailedWrite>,
    },
}

impl EditError {
    /// The failed writes, if this is a partial write.
    pub fn failed_writes(&self) -> &[FailedWrite] {
        match self {
            EditError::PartialWrite { failed, .. } => failed,
            _ => &[],
        }
    }
}

/// Errors reported by an [`EntityStore`](crate::store::EntityStore).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected the request.
    #[error("Backend error: {reason}")]
    Backend {
        /// Backend-provided description.
        reason: String,
    },

    /// The backend is not reachable.
    #[error("Store unavailable")]
    Unavailable,
}

impl StoreError {
    /// Convenience constructor for backend failures.
    pub fn backend(reason: impl Into<String>) -> Self {
        StoreError::Backend {
            reason: reason.into(),
        }
    }
}

/// One write of a multi-entity operation that did not persist.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    /// The entity whose save or removal failed.
    pub entity: EntityRef,
    /// Why it failed.
    pub error: StoreError,
}

impl fmt::Display for FailedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.error)
    }
}

/// Illegal operations. These are programming errors in the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    /// The outline item does not exist.
    #[error("Unknown item: {0}")]
    UnknownItem(ElementRef),

    /// The referenced record does not exist.
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityRef),

    /// The parent kind cannot hold the child kind.
    #[error("A {parent} cannot contain a {child}")]
    IllegalChild {
        /// Kind of the would-be parent.
        parent: ItemKind,
        /// Kind of the would-be child.
        child: ItemKind,
    },

    /// A folder would become its own descendant.
    #[error("Cannot move {item} into its descendant {target}")]
    MoveIntoDescendant {
        /// The item being moved.
        item: ElementRef,
        /// The requested destination.
        target: ElementRef,
    },

    /// The stated source parent does not hold the item.
    #[error("{item} is not a child of {expected}")]
    ParentMismatch {
        /// The item being moved.
        item: ElementRef,
        /// The parent the caller named.
        expected: ElementRef,
    },

    /// A child-list index past the end.
    #[error("Index {index} out of range for {len} children")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Current list length.
        len: usize,
    },

    /// The world root cannot be moved or removed.
    #[error("The world root cannot be moved or removed")]
    RootItem,

    /// The connection validator refused the edge.
    #[error("Connection rejected: {0}")]
    ConnectionRejected(ConnectionRejection),

    /// The node is not part of the open scene.
    #[error("{node:?} is not in scene {scene}")]
    NotInScene {
        /// The offending node.
        node: NodeRef,
        /// The open scene.
        scene: SceneId,
    },

    /// A flow-graph operation was requested with no scene open.
    #[error("No scene is open")]
    NoSceneOpen,

    /// The event has the wrong type for the operation.
    #[error("Event {event} is not a {expected} event")]
    WrongEventType {
        /// The event.
        event: EventId,
        /// The type the operation needs.
        expected: EventType,
    },

    /// The choice does not belong to the event.
    #[error("Choice {choice} does not belong to event {event}")]
    ChoiceNotOnEvent {
        /// The event.
        event: EventId,
        /// The choice.
        choice: ChoiceId,
    },

    /// The jump target does not name an existing scene/event pair.
    #[error("Invalid jump target: {reason}")]
    InvalidJumpTarget {
        /// What is wrong with the target.
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Environment variable name.
        key: &'static str,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for editor operations.
pub type EditResult<T> = std::result::Result<T, EditError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::FolderId;

    #[test]
    fn test_error_display() {
        let err = ContractError::IllegalChild {
            parent: ItemKind::Scene,
            child: ItemKind::Folder,
        };
        assert_eq!(err.to_string(), "A Scene cannot contain a Folder");
    }

    #[test]
    fn test_error_conversion() {
        let err: EditError = StoreError::Unavailable.into();
        assert!(matches!(err, EditError::Store(_)));
        assert!(err.failed_writes().is_empty());
    }

    #[test]
    fn test_partial_write_lists_failures() {
        let err = EditError::PartialWrite {
            operation: "remove",
            failed: vec![FailedWrite {
                entity: EntityRef::Folder(FolderId::nil()),
                error: StoreError::backend("disk full"),
            }],
        };
        assert_eq!(err.failed_writes().len(), 1);
        assert_eq!(err.to_string(), "remove persisted partially: 1 write(s) failed");
    }
}
