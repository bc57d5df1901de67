//! Flow-graph operations.
//!
//! These work on any scene of the open world; the open graph, if it shows
//! the scene, follows along through the committed change set.

use super::validate::{validate_connection, ConnectionRejection, ProposedConnection, SourceKind};
use super::SceneGraph;
use crate::editor::StoryEditor;
use crate::error::{ContractError, EditError, EditResult};
use crate::id::{ChoiceId, EventId, JumpId, PathId, SceneId, VariableId};
use crate::model::{
    Choice, ElementRef, EntityRef, Event, EventKind, EventType, Jump, JumpTarget, NodeRef, Path,
    PathHandle, Position, Variable, VariableValue,
};
use crate::outline::{stage_prune_dangling_jumps, stage_remove_event, stage_remove_jump};
use crate::store::{Draft, EntityStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

impl<S: EntityStore> StoryEditor<S> {
    /// Show a scene's flow graph. Any graph selection is reset.
    pub async fn open_scene(&mut self, scene_id: SceneId) -> EditResult<()> {
        let graph = SceneGraph::load(self.store.as_ref(), scene_id).await?;
        if graph.world_id() != self.world_id() {
            return Err(ContractError::UnknownItem(ElementRef::Scene(scene_id)).into());
        }
        self.graph = Some(graph);
        self.selection.clear_graph();
        info!(scene = %scene_id, "opened scene");
        Ok(())
    }

    /// Drop the flow-graph projection.
    pub fn close_scene(&mut self) {
        self.graph = None;
        self.selection.clear_graph();
    }

    /// Select nodes and paths of the open graph.
    pub fn select_nodes(
        &mut self,
        nodes: impl IntoIterator<Item = NodeRef>,
        paths: impl IntoIterator<Item = PathId>,
    ) -> EditResult<()> {
        let graph = self.graph.as_ref().ok_or(ContractError::NoSceneOpen)?;
        let nodes: Vec<NodeRef> = nodes.into_iter().collect();
        let paths: Vec<PathId> = paths.into_iter().collect();

        if let Some(&node) = nodes.iter().find(|&&node| !graph.contains_node(node)) {
            return Err(ContractError::NotInScene {
                node,
                scene: graph.scene_id(),
            }
            .into());
        }
        if let Some(&path) = paths.iter().find(|&&path| graph.path(path).is_none()) {
            return Err(ContractError::UnknownEntity(EntityRef::Path(path)).into());
        }

        self.selection.select_graph(nodes, paths);
        Ok(())
    }

    /// Narrow the selection of `event` to one of its choices, or widen it
    /// back with `None`. Returns `false` unless `event` is the sole selection.
    pub fn select_choice(&mut self, event: EventId, choice: Option<ChoiceId>) -> EditResult<bool> {
        let graph = self.graph.as_ref().ok_or(ContractError::NoSceneOpen)?;
        if let Some(choice) = choice {
            if graph.choice(choice).map(|c| c.event_id) != Some(event) {
                return Err(ContractError::ChoiceNotOnEvent { event, choice }.into());
            }
        }
        Ok(self.selection.select_choice(event, choice))
    }

    /// Move a node on the canvas.
    pub async fn reposition(&mut self, node: NodeRef, position: Position) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());

        match node {
            NodeRef::Event(id) => {
                let mut event = require_event(&draft, id).await?;
                event.position = position;
                draft.save(event);
            }
            NodeRef::Jump(id) => {
                let mut jump = require_jump(&draft, id).await?;
                jump.position = position;
                draft.save(jump);
            }
        }
        self.commit("reposition", draft.into_changes()).await
    }

    /// Draw a path from `source` through `handle` to `target`.
    ///
    /// Both nodes must sit in the same scene and the validator must accept
    /// the edge. An ending source stops being an ending.
    pub async fn connect(
        &mut self,
        source: NodeRef,
        handle: Option<PathHandle>,
        target: NodeRef,
    ) -> EditResult<PathId> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());

        let scene_id = node_scene(&draft, source).await?;
        if node_scene(&draft, target).await? != scene_id {
            return Err(ContractError::NotInScene {
                node: target,
                scene: scene_id,
            }
            .into());
        }

        let proposal = ProposedConnection::new(source, handle, target);
        let existing = draft.paths_in_scene(scene_id).await?;
        let event = match source {
            NodeRef::Event(id) => Some(require_event(&draft, id).await?),
            NodeRef::Jump(_) => None,
        };
        let kind = match &event {
            Some(event) => SourceKind::of_event(event),
            None => SourceKind::Jump,
        };
        if let Err(rejection) = validate_connection(&proposal, &existing, kind) {
            debug!(?proposal, %rejection, "connection rejected");
            return Err(ContractError::ConnectionRejected(rejection).into());
        }
        let Some(mut event) = event else {
            return Err(
                ContractError::ConnectionRejected(ConnectionRejection::JumpHasNoOutgoing).into(),
            );
        };

        let path = Path::new(
            event.world_id,
            scene_id,
            event.id,
            event.event_type(),
            handle,
            target,
        );
        let path_id = path.id;
        draft.save(path);
        if event.ending {
            event.ending = false;
            draft.save(event);
        }

        self.commit("connect", draft.into_changes()).await?;
        info!(path = %path_id, "connected");
        Ok(path_id)
    }

    /// Remove a path. The source's ending flag is left alone.
    pub async fn disconnect(&mut self, path: PathId) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        if draft.path(path).await?.is_none() {
            return Err(ContractError::UnknownEntity(EntityRef::Path(path)).into());
        }
        draft.remove(EntityRef::Path(path));
        self.commit("disconnect", draft.into_changes()).await?;
        info!(path = %path, "disconnected");
        Ok(())
    }

    /// Append a choice to a Choice event.
    ///
    /// The event's first choice replaces its passthrough paths.
    pub async fn add_choice(
        &mut self,
        event: EventId,
        title: Option<String>,
    ) -> EditResult<ChoiceId> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_event(&draft, event).await?;

        let EventKind::Choice { choices } = &mut record.kind else {
            return Err(ContractError::WrongEventType {
                event,
                expected: EventType::Choice,
            }
            .into());
        };
        let first = choices.is_empty();
        let choice = Choice::new(
            record.world_id,
            event,
            title.unwrap_or_else(|| self.config.choice_title.clone()),
        );
        let choice_id = choice.id;
        choices.push(choice_id);

        if first {
            for path in draft.paths_in_scene(record.scene_id).await? {
                if path.origin == event && path.is_passthrough() {
                    debug!(path = %path.id, "dropping passthrough path");
                    draft.remove(EntityRef::Path(path.id));
                }
            }
        }
        draft.save(choice);
        draft.save(record);

        self.commit("add_choice", draft.into_changes()).await?;
        info!(event = %event, choice = %choice_id, "added choice");
        Ok(choice_id)
    }

    /// Retitle a choice.
    pub async fn rename_choice(
        &mut self,
        choice: ChoiceId,
        title: impl Into<String>,
    ) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = draft
            .choice(choice)
            .await?
            .ok_or(ContractError::UnknownEntity(EntityRef::Choice(choice)))?;
        record.title = title.into();
        draft.save(record);
        self.commit("rename_choice", draft.into_changes()).await
    }

    /// Remove a choice and the paths leaving through it.
    pub async fn remove_choice(&mut self, event: EventId, choice: ChoiceId) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_event(&draft, event).await?;

        let EventKind::Choice { choices } = &mut record.kind else {
            return Err(ContractError::WrongEventType {
                event,
                expected: EventType::Choice,
            }
            .into());
        };
        let Some(at) = choices.iter().position(|&c| c == choice) else {
            return Err(ContractError::ChoiceNotOnEvent { event, choice }.into());
        };
        choices.remove(at);

        let handle = Some(PathHandle::Choice(choice));
        for path in draft.paths_in_scene(record.scene_id).await? {
            if path.origin == event && path.handle == handle {
                draft.remove(EntityRef::Path(path.id));
            }
        }
        draft.remove(EntityRef::Choice(choice));
        draft.save(record);

        self.commit("remove_choice", draft.into_changes()).await?;
        info!(event = %event, choice = %choice, "removed choice");
        Ok(())
    }

    /// Move a choice to `index` in its event's choice order.
    pub async fn reorder_choice(
        &mut self,
        event: EventId,
        choice: ChoiceId,
        index: usize,
    ) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_event(&draft, event).await?;

        let EventKind::Choice { choices } = &mut record.kind else {
            return Err(ContractError::WrongEventType {
                event,
                expected: EventType::Choice,
            }
            .into());
        };
        let Some(at) = choices.iter().position(|&c| c == choice) else {
            return Err(ContractError::ChoiceNotOnEvent { event, choice }.into());
        };
        if index >= choices.len() {
            return Err(ContractError::IndexOutOfRange {
                index,
                len: choices.len(),
            }
            .into());
        }
        choices.remove(at);
        choices.insert(index, choice);
        draft.save(record);

        self.commit("reorder_choice", draft.into_changes()).await
    }

    /// Bind an Input event to a variable, or unbind it.
    pub async fn set_input_variable(
        &mut self,
        event: EventId,
        variable: Option<VariableId>,
    ) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_event(&draft, event).await?;

        if let Some(id) = variable {
            if draft.variable(id).await?.is_none() {
                return Err(ContractError::UnknownEntity(EntityRef::Variable(id)).into());
            }
        }
        let EventKind::Input { variable: slot, .. } = &mut record.kind else {
            return Err(ContractError::WrongEventType {
                event,
                expected: EventType::Input,
            }
            .into());
        };
        *slot = variable;
        draft.save(record);

        self.commit("set_input_variable", draft.into_changes()).await
    }

    /// Change an event between Choice and Input.
    ///
    /// Outgoing paths are re-tagged onto the new handle: the Input handle, or
    /// passthrough for an event that becomes a Choice event without choices.
    /// Paths that collapse onto the same destination keep only the first.
    pub async fn switch_event_type(&mut self, event: EventId, to: EventType) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_event(&draft, event).await?;
        if record.event_type() == to {
            return Ok(());
        }

        let mut stale: Vec<ChoiceId> = record.choices().to_vec();
        for choice in draft.choices_of_event(event).await? {
            if !stale.contains(&choice.id) {
                stale.push(choice.id);
            }
        }
        for choice in stale {
            draft.remove(EntityRef::Choice(choice));
        }

        record.kind = EventKind::new(to);
        let handle = record.input_handle().map(PathHandle::Input);

        let mut seen = HashSet::new();
        for mut path in draft.paths_in_scene(record.scene_id).await? {
            if path.origin != event {
                continue;
            }
            if !seen.insert(path.destination) {
                draft.remove(EntityRef::Path(path.id));
                continue;
            }
            path.handle = handle;
            path.origin_type = to;
            draft.save(path);
        }
        draft.save(record);

        self.commit("switch_event_type", draft.into_changes()).await?;
        info!(event = %event, to = %to, "switched event type");
        Ok(())
    }

    /// Replace an event by a jump in the same outline slot.
    ///
    /// Incoming paths now end at the jump; outgoing paths and choices go
    /// with the event, as do jumps that targeted it.
    pub async fn convert_to_jump(&mut self, event: EventId) -> EditResult<JumpId> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let record = require_event(&draft, event).await?;

        let mut jump = Jump::new(record.world_id, record.scene_id, record.title.clone());
        jump.position = record.position;
        let old = NodeRef::Event(event);
        let new = NodeRef::Jump(jump.id);

        redirect_incoming(&mut draft, record.scene_id, old, new).await?;
        stage_remove_event(&mut draft, event).await?;
        replace_in_scene(&mut draft, record.scene_id, old, new).await?;
        draft.save(jump.clone());
        stage_prune_dangling_jumps(&mut draft, self.world_id()).await?;

        let was_selected = self.selection.outline() == Some(ElementRef::from(old));
        self.commit("convert_to_jump", draft.into_changes()).await?;
        if was_selected {
            self.selection
                .select_outline(ElementRef::from(new), self.graph.as_ref());
        }
        info!(event = %event, jump = %jump.id, "converted event to jump");
        Ok(jump.id)
    }

    /// Replace a jump by a fresh event of `event_type` in the same slot.
    ///
    /// Incoming paths now end at the event.
    pub async fn convert_from_jump(
        &mut self,
        jump: JumpId,
        event_type: EventType,
    ) -> EditResult<EventId> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let record = require_jump(&draft, jump).await?;

        let mut event = Event::new(
            record.world_id,
            record.scene_id,
            event_type,
            record.title.clone(),
        );
        event.position = record.position;
        let old = NodeRef::Jump(jump);
        let new = NodeRef::Event(event.id);

        redirect_incoming(&mut draft, record.scene_id, old, new).await?;
        stage_remove_jump(&mut draft, jump).await?;
        replace_in_scene(&mut draft, record.scene_id, old, new).await?;
        let event_id = event.id;
        draft.save(event);

        let was_selected = self.selection.outline() == Some(ElementRef::from(old));
        self.commit("convert_from_jump", draft.into_changes()).await?;
        if was_selected {
            self.selection
                .select_outline(ElementRef::from(new), self.graph.as_ref());
        }
        info!(jump = %jump, event = %event_id, "converted jump to event");
        Ok(event_id)
    }

    /// Mark or unmark an event as an ending.
    ///
    /// Marking removes the event's outgoing paths.
    pub async fn set_ending(&mut self, event: EventId, ending: bool) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_event(&draft, event).await?;

        if ending {
            for path in draft.paths_in_scene(record.scene_id).await? {
                if path.origin == event {
                    draft.remove(EntityRef::Path(path.id));
                }
            }
        }
        record.ending = ending;
        draft.save(record);
        self.commit("set_ending", draft.into_changes()).await
    }

    /// Point a jump at a scene, or at one event of a scene.
    pub async fn set_jump_target(&mut self, jump: JumpId, target: JumpTarget) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut record = require_jump(&draft, jump).await?;

        match (target.scene, target.event) {
            (None, Some(_)) => {
                return Err(invalid_target("an event target needs its scene"));
            }
            (Some(scene_id), event) => {
                let scene = draft.scene(scene_id).await?;
                if scene.map(|s| s.world_id) != Some(self.world_id()) {
                    return Err(invalid_target(format!("scene {scene_id} is not in this world")));
                }
                if let Some(event_id) = event {
                    let owner = draft.event(event_id).await?.map(|e| e.scene_id);
                    if owner != Some(scene_id) {
                        return Err(invalid_target(format!(
                            "event {event_id} is not in scene {scene_id}"
                        )));
                    }
                }
            }
            (None, None) => {}
        }

        record.target = target;
        draft.save(record);
        self.commit("set_jump_target", draft.into_changes()).await
    }

    /// Create a world variable.
    pub async fn create_variable(
        &mut self,
        title: impl Into<String>,
        value: VariableValue,
    ) -> EditResult<VariableId> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let variable = Variable::new(self.world_id(), title, value);
        let id = variable.id;
        draft.save(variable);
        self.commit("create_variable", draft.into_changes()).await?;
        Ok(id)
    }

    /// Remove a variable and unbind every Input event that used it.
    pub async fn remove_variable(&mut self, variable: VariableId) -> EditResult<()> {
        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        if draft.variable(variable).await?.is_none() {
            return Err(ContractError::UnknownEntity(EntityRef::Variable(variable)).into());
        }

        for scene in draft.scenes_in_world(self.world_id()).await? {
            for mut event in draft.events_in_scene(scene.id).await? {
                if let EventKind::Input { variable: slot, .. } = &mut event.kind {
                    if *slot == Some(variable) {
                        *slot = None;
                        draft.save(event);
                    }
                }
            }
        }
        draft.remove(EntityRef::Variable(variable));
        self.commit("remove_variable", draft.into_changes()).await
    }

    /// Variables of the open world.
    pub async fn variables(&self) -> EditResult<Vec<Variable>> {
        Ok(self.store.variables_by_world(self.world_id()).await?)
    }
}

async fn require_event<S: EntityStore + ?Sized>(
    draft: &Draft<'_, S>,
    id: EventId,
) -> EditResult<Event> {
    draft
        .event(id)
        .await?
        .ok_or_else(|| ContractError::UnknownEntity(EntityRef::Event(id)).into())
}

async fn require_jump<S: EntityStore + ?Sized>(
    draft: &Draft<'_, S>,
    id: JumpId,
) -> EditResult<Jump> {
    draft
        .jump(id)
        .await?
        .ok_or_else(|| ContractError::UnknownEntity(EntityRef::Jump(id)).into())
}

async fn node_scene<S: EntityStore + ?Sized>(
    draft: &Draft<'_, S>,
    node: NodeRef,
) -> EditResult<SceneId> {
    match node {
        NodeRef::Event(id) => Ok(require_event(draft, id).await?.scene_id),
        NodeRef::Jump(id) => Ok(require_jump(draft, id).await?.scene_id),
    }
}

/// Re-point every path arriving at `old` to `new`.
async fn redirect_incoming<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    scene_id: SceneId,
    old: NodeRef,
    new: NodeRef,
) -> EditResult<()> {
    for mut path in draft.paths_in_scene(scene_id).await? {
        if path.destination == old && NodeRef::Event(path.origin) != old {
            path.destination = new;
            draft.save(path);
        }
    }
    Ok(())
}

/// Swap `old` for `new` at the same position of a scene's child list.
async fn replace_in_scene<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    scene_id: SceneId,
    old: NodeRef,
    new: NodeRef,
) -> EditResult<()> {
    let Some(mut scene) = draft.scene(scene_id).await? else {
        return Err(ContractError::UnknownEntity(EntityRef::Scene(scene_id)).into());
    };
    match scene.children.iter().position(|&child| child == old) {
        Some(at) => scene.children[at] = new,
        None => scene.children.push(new),
    }
    draft.save(scene);
    Ok(())
}

fn invalid_target(reason: impl Into<String>) -> EditError {
    ContractError::InvalidJumpTarget {
        reason: reason.into(),
    }
    .into()
}
