//! Tagged `(type, id)` references between entities.

use crate::id::{ChoiceId, EventId, FolderId, JumpId, PathId, SceneId, VariableId, WorldId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an outline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// The root container.
    World,
    /// A folder of folders and scenes.
    Folder,
    /// A scene holding events and jumps.
    Scene,
    /// A narrative beat.
    Event,
    /// A redirect to another scene or event.
    Jump,
}

impl ItemKind {
    /// Whether an item of this kind may hold a child of `child` kind.
    pub fn accepts(self, child: ItemKind) -> bool {
        match self {
            ItemKind::World | ItemKind::Folder => {
                matches!(child, ItemKind::Folder | ItemKind::Scene)
            }
            ItemKind::Scene => matches!(child, ItemKind::Event | ItemKind::Jump),
            ItemKind::Event | ItemKind::Jump => false,
        }
    }

    /// Get the display name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::World => "World",
            ItemKind::Folder => "Folder",
            ItemKind::Scene => "Scene",
            ItemKind::Event => "Event",
            ItemKind::Jump => "Jump",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parent of a Folder or Scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    /// Directly under the world root.
    World(WorldId),
    /// Inside a folder.
    Folder(FolderId),
}

/// Child of a World or Folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum BranchRef {
    /// A nested folder.
    Folder(FolderId),
    /// A scene.
    Scene(SceneId),
}

/// Child of a Scene, and a node of that scene's flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    /// An event node.
    Event(EventId),
    /// A jump node.
    Jump(JumpId),
}

impl NodeRef {
    /// The node kind tag.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Event(_) => NodeKind::Event,
            NodeRef::Jump(_) => NodeKind::Jump,
        }
    }

    /// The event ID, if this is an event node.
    pub fn as_event(&self) -> Option<EventId> {
        match self {
            NodeRef::Event(id) => Some(*id),
            NodeRef::Jump(_) => None,
        }
    }
}

/// Flow-graph node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Event node, may have outgoing paths.
    Event,
    /// Jump node, only incoming paths.
    Jump,
}

/// Any item that can appear in the outline tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ElementRef {
    /// World root.
    World(WorldId),
    /// Folder.
    Folder(FolderId),
    /// Scene.
    Scene(SceneId),
    /// Event.
    Event(EventId),
    /// Jump.
    Jump(JumpId),
}

impl ElementRef {
    /// The outline kind of the referenced item.
    pub fn kind(&self) -> ItemKind {
        match self {
            ElementRef::World(_) => ItemKind::World,
            ElementRef::Folder(_) => ItemKind::Folder,
            ElementRef::Scene(_) => ItemKind::Scene,
            ElementRef::Event(_) => ItemKind::Event,
            ElementRef::Jump(_) => ItemKind::Jump,
        }
    }

    /// View as a Folder/Scene parent, if it is a World or Folder.
    pub fn as_parent(&self) -> Option<ParentRef> {
        match *self {
            ElementRef::World(id) => Some(ParentRef::World(id)),
            ElementRef::Folder(id) => Some(ParentRef::Folder(id)),
            _ => None,
        }
    }

    /// View as a World/Folder child, if it is a Folder or Scene.
    pub fn as_branch(&self) -> Option<BranchRef> {
        match *self {
            ElementRef::Folder(id) => Some(BranchRef::Folder(id)),
            ElementRef::Scene(id) => Some(BranchRef::Scene(id)),
            _ => None,
        }
    }

    /// View as a Scene child, if it is an Event or Jump.
    pub fn as_node(&self) -> Option<NodeRef> {
        match *self {
            ElementRef::Event(id) => Some(NodeRef::Event(id)),
            ElementRef::Jump(id) => Some(NodeRef::Jump(id)),
            _ => None,
        }
    }
}

impl From<ParentRef> for ElementRef {
    fn from(parent: ParentRef) -> Self {
        match parent {
            ParentRef::World(id) => ElementRef::World(id),
            ParentRef::Folder(id) => ElementRef::Folder(id),
        }
    }
}

impl From<BranchRef> for ElementRef {
    fn from(branch: BranchRef) -> Self {
        match branch {
            BranchRef::Folder(id) => ElementRef::Folder(id),
            BranchRef::Scene(id) => ElementRef::Scene(id),
        }
    }
}

impl From<NodeRef> for ElementRef {
    fn from(node: NodeRef) -> Self {
        match node {
            NodeRef::Event(id) => ElementRef::Event(id),
            NodeRef::Jump(id) => ElementRef::Jump(id),
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::World(id) => write!(f, "World {id}"),
            ElementRef::Folder(id) => write!(f, "Folder {id}"),
            ElementRef::Scene(id) => write!(f, "Scene {id}"),
            ElementRef::Event(id) => write!(f, "Event {id}"),
            ElementRef::Jump(id) => write!(f, "Jump {id}"),
        }
    }
}

/// Reference to any persisted record, used to name writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// World record.
    World(WorldId),
    /// Folder record.
    Folder(FolderId),
    /// Scene record.
    Scene(SceneId),
    /// Event record.
    Event(EventId),
    /// Choice record.
    Choice(ChoiceId),
    /// Jump record.
    Jump(JumpId),
    /// Path record.
    Path(PathId),
    /// Variable record.
    Variable(VariableId),
}

impl From<ElementRef> for EntityRef {
    fn from(element: ElementRef) -> Self {
        match element {
            ElementRef::World(id) => EntityRef::World(id),
            ElementRef::Folder(id) => EntityRef::Folder(id),
            ElementRef::Scene(id) => EntityRef::Scene(id),
            ElementRef::Event(id) => EntityRef::Event(id),
            ElementRef::Jump(id) => EntityRef::Jump(id),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::World(id) => write!(f, "World {id}"),
            EntityRef::Folder(id) => write!(f, "Folder {id}"),
            EntityRef::Scene(id) => write!(f, "Scene {id}"),
            EntityRef::Event(id) => write!(f, "Event {id}"),
            EntityRef::Choice(id) => write!(f, "Choice {id}"),
            EntityRef::Jump(id) => write!(f, "Jump {id}"),
            EntityRef::Path(id) => write!(f, "Path {id}"),
            EntityRef::Variable(id) => write!(f, "Variable {id}"),
        }
    }
}
