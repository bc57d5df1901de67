//! Scene flow graph: events and jumps as nodes, paths as edges.
//!
//! Like the outline, the graph is a projection. It is loaded for one scene
//! and patched from committed change sets; the store stays authoritative.

mod ops;
mod validate;

pub use validate::{
    is_connection_valid, validate_connection, ConnectionRejection, ProposedConnection, SourceKind,
};

use crate::error::{ContractError, EditResult};
use crate::id::{ChoiceId, EventId, JumpId, PathId, SceneId, WorldId};
use crate::model::{
    Choice, ElementRef, EntityRef, Event, EventType, Jump, JumpTarget, NodeKind, NodeRef, Path,
    PathHandle, Position, Record,
};
use crate::store::{ChangeSet, EntityStore, Write};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// One outgoing handle of an event node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleView {
    /// The handle.
    pub id: PathHandle,
    /// Choice title; `None` for an input handle.
    pub title: Option<String>,
}

/// Type-specific node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    /// An event node.
    Event {
        /// Display title.
        title: String,
        /// Choice or Input.
        event_type: EventType,
        /// Ending flag.
        ending: bool,
        /// Outgoing handles in display order.
        handles: Vec<HandleView>,
    },
    /// A jump node.
    Jump {
        /// Display title.
        title: String,
        /// Redirect target.
        target: JumpTarget,
    },
}

/// A graph node as handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    /// The node.
    pub id: NodeRef,
    /// Node kind.
    pub kind: NodeKind,
    /// Canvas position.
    pub position: Position,
    /// Payload.
    pub data: NodeData,
}

/// A graph edge as handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    /// The path.
    pub id: PathId,
    /// Source event.
    pub source: EventId,
    /// Source handle; `None` for a passthrough edge.
    pub source_handle: Option<PathHandle>,
    /// Target node.
    pub target: NodeRef,
}

/// In-memory projection of one scene's flow graph.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    scene_id: SceneId,
    world_id: WorldId,
    order: Vec<NodeRef>,
    events: HashMap<EventId, Event>,
    jumps: HashMap<JumpId, Jump>,
    choices: HashMap<ChoiceId, Choice>,
    paths: BTreeMap<PathId, Path>,
}

impl SceneGraph {
    /// Build the graph of a scene from the store.
    pub async fn load<S: EntityStore + ?Sized>(store: &S, scene_id: SceneId) -> EditResult<Self> {
        let scene = store
            .get_scene(scene_id)
            .await?
            .ok_or(ContractError::UnknownItem(ElementRef::Scene(scene_id)))?;

        let mut nodes = ChangeSet::new();
        let mut edges = ChangeSet::new();
        for event in store.events_by_scene(scene_id).await? {
            for choice in store.choices_by_event(event.id).await? {
                edges.save(choice);
            }
            nodes.save(event);
        }
        for jump in store.jumps_by_scene(scene_id).await? {
            nodes.save(jump);
        }
        for path in store.paths_by_scene(scene_id).await? {
            edges.save(path);
        }

        let mut graph = Self {
            scene_id,
            world_id: scene.world_id,
            order: Vec::new(),
            events: HashMap::new(),
            jumps: HashMap::new(),
            choices: HashMap::new(),
            paths: BTreeMap::new(),
        };
        nodes.save(scene);
        graph.apply(&nodes);
        graph.apply(&edges);
        graph.drop_stray_edges();

        debug!(
            scene = %scene_id,
            nodes = graph.order.len(),
            paths = graph.paths.len(),
            "scene graph loaded"
        );
        Ok(graph)
    }

    /// The scene shown.
    pub fn scene_id(&self) -> SceneId {
        self.scene_id
    }

    /// The world the scene belongs to.
    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// Nodes in outline order.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.order
    }

    /// Look up an event node.
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    /// Look up a jump node.
    pub fn jump(&self, id: JumpId) -> Option<&Jump> {
        self.jumps.get(&id)
    }

    /// Look up a choice of an event in this scene.
    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices.get(&id)
    }

    /// Look up a path.
    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.get(&id)
    }

    /// All paths, ordered by ID.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.values()
    }

    /// Outgoing paths of an event.
    pub fn paths_from(&self, event: EventId) -> impl Iterator<Item = &Path> {
        self.paths.values().filter(move |path| path.origin == event)
    }

    /// Paths that start or end at `node`.
    pub fn paths_touching(&self, node: NodeRef) -> impl Iterator<Item = &Path> {
        self.paths.values().filter(move |path| path.touches(node))
    }

    /// Whether the node is part of this graph.
    pub fn contains_node(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Event(id) => self.events.contains_key(&id),
            NodeRef::Jump(id) => self.jumps.contains_key(&id),
        }
    }

    /// Whether the graph holds the entity.
    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Scene(id) => id == self.scene_id,
            EntityRef::Event(id) => self.events.contains_key(&id),
            EntityRef::Jump(id) => self.jumps.contains_key(&id),
            EntityRef::Choice(id) => self.choices.contains_key(&id),
            EntityRef::Path(id) => self.paths.contains_key(&id),
            _ => false,
        }
    }

    /// Handles the node offers for new connections.
    pub fn source_kind(&self, node: NodeRef) -> Option<SourceKind<'_>> {
        match node {
            NodeRef::Event(id) => self.events.get(&id).map(|event| SourceKind::of_event(event)),
            NodeRef::Jump(id) => self.jumps.get(&id).map(|_| SourceKind::Jump),
        }
    }

    /// Live check for a connection drawn on this graph.
    pub fn can_connect(&self, proposed: &ProposedConnection) -> bool {
        if !self.contains_node(proposed.target) {
            return false;
        }
        match self.source_kind(proposed.source) {
            Some(source) => is_connection_valid(proposed, self.paths.values(), source),
            None => false,
        }
    }

    /// Canvas position of a node.
    pub fn position(&self, node: NodeRef) -> Option<Position> {
        match node {
            NodeRef::Event(id) => self.events.get(&id).map(|e| e.position),
            NodeRef::Jump(id) => self.jumps.get(&id).map(|j| j.position),
        }
    }

    /// Node records for the view layer, in outline order.
    pub fn node_views(&self) -> Vec<NodeView> {
        self.order
            .iter()
            .filter_map(|&node| match node {
                NodeRef::Event(id) => self.events.get(&id).map(|event| NodeView {
                    id: node,
                    kind: NodeKind::Event,
                    position: event.position,
                    data: NodeData::Event {
                        title: event.title.clone(),
                        event_type: event.event_type(),
                        ending: event.ending,
                        handles: self.handles(event),
                    },
                }),
                NodeRef::Jump(id) => self.jumps.get(&id).map(|jump| NodeView {
                    id: node,
                    kind: NodeKind::Jump,
                    position: jump.position,
                    data: NodeData::Jump {
                        title: jump.title.clone(),
                        target: jump.target,
                    },
                }),
            })
            .collect()
    }

    /// Edge records for the view layer.
    pub fn edge_views(&self) -> Vec<EdgeView> {
        self.paths
            .values()
            .map(|path| EdgeView {
                id: path.id,
                source: path.origin,
                source_handle: path.handle,
                target: path.destination,
            })
            .collect()
    }

    fn handles(&self, event: &Event) -> Vec<HandleView> {
        match event.input_handle() {
            Some(input) => vec![HandleView {
                id: PathHandle::Input(input),
                title: None,
            }],
            None => event
                .choices()
                .iter()
                .map(|&choice| HandleView {
                    id: PathHandle::Choice(choice),
                    title: self.choices.get(&choice).map(|c| c.title.clone()),
                })
                .collect(),
        }
    }

    /// Patch the projection with committed writes.
    ///
    /// Returns `false` once the scene itself has been removed; the graph is
    /// then stale and should be dropped.
    pub(crate) fn apply(&mut self, changes: &ChangeSet) -> bool {
        let mut open = true;

        // Nodes first, so choices and paths can be matched against them.
        for write in changes.writes() {
            match write {
                Write::Save(Record::Scene(scene)) if scene.id == self.scene_id => {
                    self.order = scene.children.clone();
                }
                Write::Save(Record::Event(event)) => {
                    if event.scene_id == self.scene_id {
                        self.events.insert(event.id, event.clone());
                    } else {
                        self.events.remove(&event.id);
                    }
                }
                Write::Save(Record::Jump(jump)) => {
                    if jump.scene_id == self.scene_id {
                        self.jumps.insert(jump.id, jump.clone());
                    } else {
                        self.jumps.remove(&jump.id);
                    }
                }
                Write::Remove(EntityRef::Scene(id)) if *id == self.scene_id => open = false,
                Write::Remove(EntityRef::Event(id)) => {
                    self.events.remove(id);
                }
                Write::Remove(EntityRef::Jump(id)) => {
                    self.jumps.remove(id);
                }
                _ => {}
            }
        }

        for write in changes.writes() {
            match write {
                Write::Save(Record::Choice(choice)) => {
                    if self.events.contains_key(&choice.event_id) {
                        self.choices.insert(choice.id, choice.clone());
                    } else {
                        self.choices.remove(&choice.id);
                    }
                }
                Write::Save(Record::Path(path)) => {
                    if path.scene_id == self.scene_id {
                        self.paths.insert(path.id, path.clone());
                    } else {
                        self.paths.remove(&path.id);
                    }
                }
                Write::Remove(EntityRef::Choice(id)) => {
                    self.choices.remove(id);
                }
                Write::Remove(EntityRef::Path(id)) => {
                    self.paths.remove(id);
                }
                _ => {}
            }
        }

        let events = &self.events;
        self.choices
            .retain(|_, choice| events.contains_key(&choice.event_id));
        open
    }

    /// Paths whose endpoints are not in this scene are referential gaps.
    fn drop_stray_edges(&mut self) {
        let stray: Vec<PathId> = self
            .paths
            .values()
            .filter(|path| {
                !self.events.contains_key(&path.origin) || !self.contains_node(path.destination)
            })
            .map(|path| path.id)
            .collect();
        for id in stray {
            warn!(path = %id, scene = %self.scene_id, "path endpoint is not in its scene");
            self.paths.remove(&id);
        }
    }
}
