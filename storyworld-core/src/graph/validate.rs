//! Connection validation for the scene flow graph.
//!
//! Everything here is pure: the same proposal against the same edges always
//! yields the same answer, so it can back both live drag feedback and the
//! final check before a path is persisted.

use crate::id::{ChoiceId, InputId};
use crate::model::{Event, EventKind, NodeRef, Path, PathHandle};

/// An edge the author is trying to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposedConnection {
    /// Node the edge leaves from.
    pub source: NodeRef,
    /// Outgoing handle on the source; `None` for a passthrough edge.
    pub handle: Option<PathHandle>,
    /// Node the edge arrives at.
    pub target: NodeRef,
}

impl ProposedConnection {
    /// Create a proposal.
    pub fn new(source: NodeRef, handle: Option<PathHandle>, target: NodeRef) -> Self {
        Self {
            source,
            handle,
            target,
        }
    }
}

/// What the source node offers as outgoing handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind<'a> {
    /// A Choice event and its current choices.
    Choice {
        /// Choice IDs of the source event.
        choices: &'a [ChoiceId],
    },
    /// An Input event and its single handle.
    Input {
        /// The handle.
        input: InputId,
    },
    /// A jump; it has no outgoing handles.
    Jump,
}

impl<'a> SourceKind<'a> {
    /// Handles offered by an event.
    pub fn of_event(event: &'a Event) -> Self {
        match &event.kind {
            EventKind::Choice { choices } => SourceKind::Choice { choices },
            EventKind::Input { input, .. } => SourceKind::Input { input: *input },
        }
    }
}

/// Why a connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionRejection {
    /// A jump cannot loop to itself.
    #[error("a jump cannot connect to itself")]
    JumpSelfLoop,

    /// Jumps end their branch of the scene.
    #[error("jumps have no outgoing paths")]
    JumpHasNoOutgoing,

    /// The same origin, handle and destination are already connected.
    #[error("an identical path already exists")]
    Duplicate,

    /// The handle is not the input event's single handle.
    #[error("input events connect only through their input handle")]
    InputHandleMismatch,

    /// The handle is not one of the event's current choices.
    #[error("handle is not a choice of the source event")]
    UnknownChoiceHandle,

    /// A bare event-level edge from an event that already has choices.
    #[error("events with choices must connect through a choice")]
    PassthroughNotAllowed,
}

/// Decide whether `proposed` may be added next to `existing`.
pub fn validate_connection<'p>(
    proposed: &ProposedConnection,
    existing: impl IntoIterator<Item = &'p Path>,
    source: SourceKind<'_>,
) -> Result<(), ConnectionRejection> {
    let origin = match proposed.source {
        NodeRef::Jump(_) if proposed.source == proposed.target => {
            return Err(ConnectionRejection::JumpSelfLoop)
        }
        NodeRef::Jump(_) => return Err(ConnectionRejection::JumpHasNoOutgoing),
        NodeRef::Event(id) => id,
    };

    let key = (origin, proposed.handle, proposed.target);
    if existing.into_iter().any(|path| path.key() == key) {
        return Err(ConnectionRejection::Duplicate);
    }

    match (source, proposed.handle) {
        (SourceKind::Jump, _) => Err(ConnectionRejection::JumpHasNoOutgoing),
        (SourceKind::Input { input }, Some(PathHandle::Input(handle))) if handle == input => Ok(()),
        (SourceKind::Input { .. }, _) => Err(ConnectionRejection::InputHandleMismatch),
        (SourceKind::Choice { choices }, None) if choices.is_empty() => Ok(()),
        (SourceKind::Choice { .. }, None) => Err(ConnectionRejection::PassthroughNotAllowed),
        (SourceKind::Choice { choices }, Some(PathHandle::Choice(choice)))
            if choices.contains(&choice) =>
        {
            Ok(())
        }
        (SourceKind::Choice { .. }, Some(_)) => Err(ConnectionRejection::UnknownChoiceHandle),
    }
}

/// Boolean form of [`validate_connection`], for drag-to-connect affordances.
pub fn is_connection_valid<'p>(
    proposed: &ProposedConnection,
    existing: impl IntoIterator<Item = &'p Path>,
    source: SourceKind<'_>,
) -> bool {
    validate_connection(proposed, existing, source).is_ok()
}
