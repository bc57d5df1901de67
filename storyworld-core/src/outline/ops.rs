//! Outline operations: add, move, remove, rename.

use super::cascade::{
    detach_node, stage_prune_dangling_jumps, stage_remove_event, stage_remove_folder,
    stage_remove_jump, stage_remove_scene,
};
use crate::editor::StoryEditor;
use crate::error::{ContractError, EditResult};
use crate::graph::SceneGraph;
use crate::id::{SceneId, WorldId};
use crate::model::{
    BranchRef, ElementRef, EntityRef, Event, Folder, ItemKind, Jump, NodeRef, ParentRef, Position,
    Scene,
};
use crate::store::{Draft, EntityStore};
use std::sync::Arc;
use tracing::info;

impl<S: EntityStore> StoryEditor<S> {
    /// Add a new item of `kind` at the end of `parent`'s children.
    ///
    /// The new item is flagged as awaiting a title and its parent is expanded.
    pub async fn add_child(
        &mut self,
        parent: ElementRef,
        kind: ItemKind,
    ) -> EditResult<ElementRef> {
        if !self.outline.contains(parent) {
            return Err(ContractError::UnknownItem(parent).into());
        }
        let illegal = ContractError::IllegalChild {
            parent: parent.kind(),
            child: kind,
        };
        if !parent.kind().accepts(kind) {
            return Err(illegal.into());
        }

        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let world_id = self.world_id();

        let child = match (parent, kind) {
            (ElementRef::Scene(scene_id), ItemKind::Event) => {
                let mut event = Event::new(
                    world_id,
                    scene_id,
                    self.config.default_event_type,
                    self.config.event_title.clone(),
                );
                event.position = self.next_position(&draft, scene_id).await?;
                let node = NodeRef::Event(event.id);
                insert_node(&mut draft, scene_id, node, None).await?;
                draft.save(event);
                ElementRef::from(node)
            }
            (ElementRef::Scene(scene_id), ItemKind::Jump) => {
                let mut jump = Jump::new(world_id, scene_id, self.config.jump_title.clone());
                jump.position = self.next_position(&draft, scene_id).await?;
                let node = NodeRef::Jump(jump.id);
                insert_node(&mut draft, scene_id, node, None).await?;
                draft.save(jump);
                ElementRef::from(node)
            }
            (_, ItemKind::Folder) => {
                let parent_ref = parent.as_parent().ok_or(illegal)?;
                let folder = Folder::new(world_id, parent_ref, self.config.folder_title.clone());
                let branch = BranchRef::Folder(folder.id);
                insert_branch(&mut draft, parent_ref, branch, None).await?;
                draft.save(folder);
                ElementRef::from(branch)
            }
            (_, ItemKind::Scene) => {
                let parent_ref = parent.as_parent().ok_or(illegal)?;
                let scene = Scene::new(world_id, parent_ref, self.config.scene_title.clone());
                let branch = BranchRef::Scene(scene.id);
                insert_branch(&mut draft, parent_ref, branch, None).await?;
                draft.save(scene);
                ElementRef::from(branch)
            }
            _ => return Err(illegal.into()),
        };

        self.commit("add_child", draft.into_changes()).await?;
        self.outline.set_renaming(child, true);
        self.outline.set_expanded(parent, true);

        info!(parent = %parent, child = %child, "added outline item");
        Ok(child)
    }

    /// Move `item` from `source_parent` to position `index` of `dest_parent`.
    ///
    /// `index` counts the destination's children after `item` has left its
    /// old place, so `index == len` appends. Events and jumps that change
    /// scene lose the paths touching them, and jumps aimed at a moved event
    /// fall back to its old scene.
    pub async fn move_item(
        &mut self,
        item: ElementRef,
        source_parent: ElementRef,
        dest_parent: ElementRef,
        index: usize,
    ) -> EditResult<()> {
        if item == self.outline.root() {
            return Err(ContractError::RootItem.into());
        }
        if !self.outline.contains(item) {
            return Err(ContractError::UnknownItem(item).into());
        }
        if !self.outline.contains(dest_parent) {
            return Err(ContractError::UnknownItem(dest_parent).into());
        }
        if self.outline.parent(item) != Some(source_parent) {
            return Err(ContractError::ParentMismatch {
                item,
                expected: source_parent,
            }
            .into());
        }
        if !dest_parent.kind().accepts(item.kind()) {
            return Err(ContractError::IllegalChild {
                parent: dest_parent.kind(),
                child: item.kind(),
            }
            .into());
        }
        if dest_parent == item || self.outline.is_descendant(item, dest_parent) {
            return Err(ContractError::MoveIntoDescendant {
                item,
                target: dest_parent,
            }
            .into());
        }
        let siblings = self.outline.children(dest_parent);
        let len = siblings.iter().filter(|child| **child != item).count();
        if index > len {
            return Err(ContractError::IndexOutOfRange { index, len }.into());
        }

        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let mut entered_scene = None;

        match (item.as_branch(), item.as_node()) {
            (Some(branch), _) => {
                let (Some(from), Some(to)) = (source_parent.as_parent(), dest_parent.as_parent())
                else {
                    return Err(ContractError::IllegalChild {
                        parent: dest_parent.kind(),
                        child: item.kind(),
                    }
                    .into());
                };
                detach_branch(&mut draft, from, branch).await?;
                insert_branch(&mut draft, to, branch, Some(index)).await?;
                match branch {
                    BranchRef::Folder(id) => {
                        let mut folder = draft
                            .folder(id)
                            .await?
                            .ok_or(ContractError::UnknownEntity(EntityRef::Folder(id)))?;
                        folder.parent = to;
                        draft.save(folder);
                    }
                    BranchRef::Scene(id) => {
                        let mut scene = draft
                            .scene(id)
                            .await?
                            .ok_or(ContractError::UnknownEntity(EntityRef::Scene(id)))?;
                        scene.parent = to;
                        draft.save(scene);
                    }
                }
            }
            (None, Some(node)) => {
                let (ElementRef::Scene(from), ElementRef::Scene(to)) = (source_parent, dest_parent)
                else {
                    return Err(ContractError::IllegalChild {
                        parent: dest_parent.kind(),
                        child: item.kind(),
                    }
                    .into());
                };
                detach_node(&mut draft, from, node).await?;
                insert_node(&mut draft, to, node, Some(index)).await?;
                if from != to {
                    rehome_node(&mut draft, self.world_id(), node, from, to).await?;
                    entered_scene = Some(to);
                }
            }
            (None, None) => return Err(ContractError::RootItem.into()),
        }

        self.commit("move", draft.into_changes()).await?;

        // Choices of an event never pass through the change set on a move.
        if let Some(scene_id) = entered_scene {
            if self.graph.as_ref().is_some_and(|g| g.scene_id() == scene_id) {
                self.graph = Some(SceneGraph::load(store.as_ref(), scene_id).await?);
            }
        }
        info!(item = %item, from = %source_parent, to = %dest_parent, index, "moved outline item");
        Ok(())
    }

    /// Remove an item and everything it contains.
    ///
    /// Jumps anywhere in the world whose target disappears with it are
    /// removed too. A selection on a removed item is cleared.
    pub async fn remove(&mut self, item: ElementRef) -> EditResult<()> {
        if item == self.outline.root() {
            return Err(ContractError::RootItem.into());
        }
        if !self.outline.contains(item) {
            return Err(ContractError::UnknownItem(item).into());
        }
        let parent = self.outline.parent(item);

        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());

        match item {
            ElementRef::Folder(id) => {
                if let Some(parent) = parent.and_then(|p| p.as_parent()) {
                    detach_branch(&mut draft, parent, BranchRef::Folder(id)).await?;
                }
                stage_remove_folder(&mut draft, id).await?;
            }
            ElementRef::Scene(id) => {
                if let Some(parent) = parent.and_then(|p| p.as_parent()) {
                    detach_branch(&mut draft, parent, BranchRef::Scene(id)).await?;
                }
                stage_remove_scene(&mut draft, id).await?;
            }
            ElementRef::Event(id) => {
                if let Some(ElementRef::Scene(scene)) = parent {
                    detach_node(&mut draft, scene, NodeRef::Event(id)).await?;
                }
                stage_remove_event(&mut draft, id).await?;
            }
            ElementRef::Jump(id) => {
                if let Some(ElementRef::Scene(scene)) = parent {
                    detach_node(&mut draft, scene, NodeRef::Jump(id)).await?;
                }
                stage_remove_jump(&mut draft, id).await?;
            }
            ElementRef::World(_) => return Err(ContractError::RootItem.into()),
        }
        let pruned = stage_prune_dangling_jumps(&mut draft, self.world_id()).await?;

        let changes = draft.into_changes();
        let writes = changes.len();
        self.commit("remove", changes).await?;
        info!(item = %item, writes, pruned_jumps = pruned.len(), "removed outline item");
        Ok(())
    }

    /// Retitle an item and clear its pending-rename flag.
    pub async fn rename(&mut self, item: ElementRef, title: impl Into<String>) -> EditResult<()> {
        if !self.outline.contains(item) {
            return Err(ContractError::UnknownItem(item).into());
        }
        let title = title.into();

        let store = Arc::clone(&self.store);
        let mut draft = Draft::new(store.as_ref());
        let missing = ContractError::UnknownEntity(EntityRef::from(item));

        match item {
            ElementRef::World(id) => {
                let mut world = draft.world(id).await?.ok_or(missing)?;
                world.title = title;
                draft.save(world);
            }
            ElementRef::Folder(id) => {
                let mut folder = draft.folder(id).await?.ok_or(missing)?;
                folder.title = title;
                draft.save(folder);
            }
            ElementRef::Scene(id) => {
                let mut scene = draft.scene(id).await?.ok_or(missing)?;
                scene.title = title;
                draft.save(scene);
            }
            ElementRef::Event(id) => {
                let mut event = draft.event(id).await?.ok_or(missing)?;
                event.title = title;
                draft.save(event);
            }
            ElementRef::Jump(id) => {
                let mut jump = draft.jump(id).await?.ok_or(missing)?;
                jump.title = title;
                draft.save(jump);
            }
        }

        self.commit("rename", draft.into_changes()).await?;
        self.outline.set_renaming(item, false);
        Ok(())
    }

    /// Canvas position for a node appended to a scene.
    async fn next_position(
        &self,
        draft: &Draft<'_, S>,
        scene_id: SceneId,
    ) -> EditResult<Position> {
        let last = match draft.scene(scene_id).await? {
            Some(scene) => scene.children.last().copied(),
            None => None,
        };
        let anchor = match last {
            Some(NodeRef::Event(id)) => draft.event(id).await?.map(|e| e.position),
            Some(NodeRef::Jump(id)) => draft.jump(id).await?.map(|j| j.position),
            None => None,
        };
        Ok(anchor
            .map(|position| position.offset(self.config.node_spacing))
            .unwrap_or_default())
    }
}

/// Put `child` into a world's or folder's child list.
async fn insert_branch<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    parent: ParentRef,
    child: BranchRef,
    index: Option<usize>,
) -> EditResult<()> {
    match parent {
        ParentRef::World(id) => {
            let mut world = draft
                .world(id)
                .await?
                .ok_or(ContractError::UnknownEntity(EntityRef::World(id)))?;
            splice(&mut world.children, child, index);
            draft.save(world);
        }
        ParentRef::Folder(id) => {
            let mut folder = draft
                .folder(id)
                .await?
                .ok_or(ContractError::UnknownEntity(EntityRef::Folder(id)))?;
            splice(&mut folder.children, child, index);
            draft.save(folder);
        }
    }
    Ok(())
}

/// Take `child` out of a world's or folder's child list, if the parent exists.
async fn detach_branch<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    parent: ParentRef,
    child: BranchRef,
) -> EditResult<()> {
    match parent {
        ParentRef::World(id) => {
            if let Some(mut world) = draft.world(id).await? {
                world.children.retain(|c| *c != child);
                draft.save(world);
            }
        }
        ParentRef::Folder(id) => {
            if let Some(mut folder) = draft.folder(id).await? {
                folder.children.retain(|c| *c != child);
                draft.save(folder);
            }
        }
    }
    Ok(())
}

/// Put `node` into a scene's child list.
async fn insert_node<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    scene_id: SceneId,
    node: NodeRef,
    index: Option<usize>,
) -> EditResult<()> {
    let mut scene = draft
        .scene(scene_id)
        .await?
        .ok_or(ContractError::UnknownEntity(EntityRef::Scene(scene_id)))?;
    splice(&mut scene.children, node, index);
    draft.save(scene);
    Ok(())
}

/// Point a node at its new scene and cut its ties to the old one.
async fn rehome_node<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    world_id: WorldId,
    node: NodeRef,
    from: SceneId,
    to: SceneId,
) -> EditResult<()> {
    for path in draft.paths_in_scene(from).await? {
        if path.touches(node) {
            draft.remove(EntityRef::Path(path.id));
        }
    }

    match node {
        NodeRef::Event(id) => {
            let mut event = draft
                .event(id)
                .await?
                .ok_or(ContractError::UnknownEntity(EntityRef::Event(id)))?;
            event.scene_id = to;
            draft.save(event);

            for mut jump in draft.jumps_in_world(world_id).await? {
                if jump.target.event == Some(id) {
                    jump.target.event = None;
                    draft.save(jump);
                }
            }
        }
        NodeRef::Jump(id) => {
            let mut jump = draft
                .jump(id)
                .await?
                .ok_or(ContractError::UnknownEntity(EntityRef::Jump(id)))?;
            jump.scene_id = to;
            draft.save(jump);
        }
    }
    Ok(())
}

/// Insert `item` at `index` (or the end), dropping any earlier occurrence.
fn splice<T: PartialEq>(list: &mut Vec<T>, item: T, index: Option<usize>) {
    list.retain(|existing| *existing != item);
    let at = index.unwrap_or(list.len()).min(list.len());
    list.insert(at, item);
}
