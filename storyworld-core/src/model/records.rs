//! Persisted entity records.
//!
//! These are the plain records exchanged with the [`EntityStore`](crate::store::EntityStore).
//! Parent/child links are stored on both sides; keeping the two sides in
//! agreement is the job of the editor operations, not of the records.

use super::refs::{BranchRef, EntityRef, NodeKind, NodeRef, ParentRef};
use crate::id::{
    ChoiceId, EventId, FolderId, InputId, JumpId, PathId, SceneId, VariableId, WorldId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canvas coordinates of a flow-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Create a position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This position shifted by `offset`.
    pub fn offset(self, offset: Position) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y)
    }
}

/// The root container of a storyworld.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Unique identifier.
    pub id: WorldId,
    /// Display title.
    pub title: String,
    /// Ordered top-level folders and scenes.
    pub children: Vec<BranchRef>,
}

impl World {
    /// Create an empty world.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: WorldId::new(),
            title: title.into(),
            children: Vec::new(),
        }
    }
}

/// A folder of folders and scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier.
    pub id: FolderId,
    /// Owning world.
    pub world_id: WorldId,
    /// Display title.
    pub title: String,
    /// Containing world or folder.
    pub parent: ParentRef,
    /// Ordered nested folders and scenes.
    pub children: Vec<BranchRef>,
}

impl Folder {
    /// Create an empty folder under `parent`.
    pub fn new(world_id: WorldId, parent: ParentRef, title: impl Into<String>) -> Self {
        Self {
            id: FolderId::new(),
            world_id,
            title: title.into(),
            parent,
            children: Vec::new(),
        }
    }
}

/// A scene: an outline container of events and jumps, and a flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Unique identifier.
    pub id: SceneId,
    /// Owning world.
    pub world_id: WorldId,
    /// Display title.
    pub title: String,
    /// Containing world or folder.
    pub parent: ParentRef,
    /// Ordered events and jumps.
    pub children: Vec<NodeRef>,
}

impl Scene {
    /// Create an empty scene under `parent`.
    pub fn new(world_id: WorldId, parent: ParentRef, title: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            world_id,
            title: title.into(),
            parent,
            children: Vec::new(),
        }
    }
}

/// Event type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Branches through an ordered list of choices.
    Choice,
    /// Reads a variable and continues through a single handle.
    Input,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Choice => f.write_str("choice"),
            EventType::Input => f.write_str("input"),
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "choice" => Ok(EventType::Choice),
            "input" => Ok(EventType::Input),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Type-specific data of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Ordered choices, each an outgoing handle.
    Choice {
        /// Choice IDs in display order.
        choices: Vec<ChoiceId>,
    },
    /// A single outgoing handle bound to a variable.
    Input {
        /// The outgoing handle.
        input: InputId,
        /// The variable this input writes, if chosen yet.
        variable: Option<VariableId>,
    },
}

impl EventKind {
    /// Fresh, empty data for the given event type.
    pub fn new(event_type: EventType) -> Self {
        match event_type {
            EventType::Choice => EventKind::Choice {
                choices: Vec::new(),
            },
            EventType::Input => EventKind::Input {
                input: InputId::new(),
                variable: None,
            },
        }
    }

    /// The type tag.
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Choice { .. } => EventType::Choice,
            EventKind::Input { .. } => EventType::Input,
        }
    }
}

/// A narrative beat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Owning world.
    pub world_id: WorldId,
    /// Containing scene.
    pub scene_id: SceneId,
    /// Display title.
    pub title: String,
    /// Choice or Input data.
    pub kind: EventKind,
    /// Marks the event as a story ending with no outgoing paths.
    pub ending: bool,
    /// Flow-graph position.
    pub position: Position,
    /// Opaque rich-text body, written only through
    /// [`EntityStore::save_event_content`](crate::store::EntityStore::save_event_content).
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl Event {
    /// Create an event of the given type in a scene.
    pub fn new(
        world_id: WorldId,
        scene_id: SceneId,
        event_type: EventType,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            world_id,
            scene_id,
            title: title.into(),
            kind: EventKind::new(event_type),
            ending: false,
            position: Position::default(),
            content: None,
        }
    }

    /// The event type tag.
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Ordered choice IDs; empty for Input events.
    pub fn choices(&self) -> &[ChoiceId] {
        match &self.kind {
            EventKind::Choice { choices } => choices,
            EventKind::Input { .. } => &[],
        }
    }

    /// The input handle, for Input events.
    pub fn input_handle(&self) -> Option<InputId> {
        match &self.kind {
            EventKind::Input { input, .. } => Some(*input),
            EventKind::Choice { .. } => None,
        }
    }

    /// Whether `handle` is a current outgoing handle of this event.
    ///
    /// `None` is a valid handle only for a Choice event with no choices.
    pub fn has_handle(&self, handle: Option<PathHandle>) -> bool {
        match (&self.kind, handle) {
            (EventKind::Choice { choices }, None) => choices.is_empty(),
            (EventKind::Choice { choices }, Some(PathHandle::Choice(id))) => choices.contains(&id),
            (EventKind::Input { input, .. }, Some(PathHandle::Input(id))) => *input == id,
            _ => false,
        }
    }
}

/// A named outgoing branch of a Choice event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Unique identifier.
    pub id: ChoiceId,
    /// Owning world.
    pub world_id: WorldId,
    /// The event this choice belongs to.
    pub event_id: EventId,
    /// Display title.
    pub title: String,
}

impl Choice {
    /// Create a choice on an event.
    pub fn new(world_id: WorldId, event_id: EventId, title: impl Into<String>) -> Self {
        Self {
            id: ChoiceId::new(),
            world_id,
            event_id,
            title: title.into(),
        }
    }
}

/// Where a jump redirects the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JumpTarget {
    /// Target scene.
    pub scene: Option<SceneId>,
    /// Specific event within the target scene.
    pub event: Option<EventId>,
}

impl JumpTarget {
    /// Target a whole scene.
    pub fn scene(scene: SceneId) -> Self {
        Self {
            scene: Some(scene),
            event: None,
        }
    }

    /// Target a specific event in a scene.
    pub fn event(scene: SceneId, event: EventId) -> Self {
        Self {
            scene: Some(scene),
            event: Some(event),
        }
    }
}

/// A beat that redirects flow to another scene or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jump {
    /// Unique identifier.
    pub id: JumpId,
    /// Owning world.
    pub world_id: WorldId,
    /// Containing scene.
    pub scene_id: SceneId,
    /// Display title.
    pub title: String,
    /// Redirect target.
    pub target: JumpTarget,
    /// Flow-graph position.
    pub position: Position,
}

impl Jump {
    /// Create an untargeted jump in a scene.
    pub fn new(world_id: WorldId, scene_id: SceneId, title: impl Into<String>) -> Self {
        Self {
            id: JumpId::new(),
            world_id,
            scene_id,
            title: title.into(),
            target: JumpTarget::default(),
            position: Position::default(),
        }
    }
}

/// The outgoing handle a path leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PathHandle {
    /// A choice of a Choice event.
    Choice(ChoiceId),
    /// The handle of an Input event.
    Input(InputId),
}

/// A directed edge between two nodes of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Unique identifier.
    pub id: PathId,
    /// Owning world.
    pub world_id: WorldId,
    /// Scene the path is drawn in.
    pub scene_id: SceneId,
    /// Source event.
    pub origin: EventId,
    /// Type of the source event when the path was tagged.
    pub origin_type: EventType,
    /// Source handle; `None` for a passthrough path.
    pub handle: Option<PathHandle>,
    /// Target node.
    pub destination: NodeRef,
}

impl Path {
    /// Create a path.
    pub fn new(
        world_id: WorldId,
        scene_id: SceneId,
        origin: EventId,
        origin_type: EventType,
        handle: Option<PathHandle>,
        destination: NodeRef,
    ) -> Self {
        Self {
            id: PathId::new(),
            world_id,
            scene_id,
            origin,
            origin_type,
            handle,
            destination,
        }
    }

    /// Kind of the destination node.
    pub fn destination_type(&self) -> NodeKind {
        self.destination.kind()
    }

    /// Whether the path starts or ends at `node`.
    pub fn touches(&self, node: NodeRef) -> bool {
        NodeRef::Event(self.origin) == node || self.destination == node
    }

    /// Whether this is a handle-less passthrough path.
    pub fn is_passthrough(&self) -> bool {
        self.handle.is_none()
    }

    /// The uniqueness key `(origin, handle, destination)`.
    pub fn key(&self) -> (EventId, Option<PathHandle>, NodeRef) {
        (self.origin, self.handle, self.destination)
    }
}

/// Value held by a story variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VariableValue {
    /// True/false flag.
    Boolean(bool),
    /// Numeric value.
    Number(f64),
    /// Free text.
    Text(String),
}

/// A world-scoped story variable that Input events write to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique identifier.
    pub id: VariableId,
    /// Owning world.
    pub world_id: WorldId,
    /// Display title.
    pub title: String,
    /// Initial value.
    pub value: VariableValue,
}

impl Variable {
    /// Create a variable.
    pub fn new(world_id: WorldId, title: impl Into<String>, value: VariableValue) -> Self {
        Self {
            id: VariableId::new(),
            world_id,
            title: title.into(),
            value,
        }
    }
}

/// Any persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum Record {
    /// World record.
    World(World),
    /// Folder record.
    Folder(Folder),
    /// Scene record.
    Scene(Scene),
    /// Event record.
    Event(Event),
    /// Choice record.
    Choice(Choice),
    /// Jump record.
    Jump(Jump),
    /// Path record.
    Path(Path),
    /// Variable record.
    Variable(Variable),
}

impl Record {
    /// Reference naming this record.
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Record::World(r) => EntityRef::World(r.id),
            Record::Folder(r) => EntityRef::Folder(r.id),
            Record::Scene(r) => EntityRef::Scene(r.id),
            Record::Event(r) => EntityRef::Event(r.id),
            Record::Choice(r) => EntityRef::Choice(r.id),
            Record::Jump(r) => EntityRef::Jump(r.id),
            Record::Path(r) => EntityRef::Path(r.id),
            Record::Variable(r) => EntityRef::Variable(r.id),
        }
    }
}

macro_rules! record_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Record {
                fn from(record: $variant) -> Self {
                    Record::$variant(record)
                }
            }
        )*
    };
}

record_from!(World, Folder, Scene, Event, Choice, Jump, Path, Variable);
