//! Cascading deletion staged into a [`Draft`].
//!
//! Each function stages the removal of one entity and everything it owns.
//! Detaching the entity from its parent's child list is left to the caller,
//! except for jumps pruned as dangling, which detach themselves.

use crate::error::StoreResult;
use crate::id::{EventId, FolderId, JumpId, SceneId, WorldId};
use crate::model::{BranchRef, EntityRef, NodeRef};
use crate::store::{Draft, EntityStore};
use tracing::debug;

/// Remove a folder and, recursively, every folder and scene below it.
pub(crate) async fn stage_remove_folder<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    folder_id: FolderId,
) -> StoreResult<()> {
    let mut stack = vec![BranchRef::Folder(folder_id)];
    while let Some(branch) = stack.pop() {
        match branch {
            BranchRef::Folder(id) => {
                if let Some(folder) = draft.folder(id).await? {
                    stack.extend(folder.children.iter().copied());
                }
                draft.remove(EntityRef::Folder(id));
            }
            BranchRef::Scene(id) => stage_remove_scene(draft, id).await?,
        }
    }
    Ok(())
}

/// Remove a scene with all its events, choices, jumps and paths.
pub(crate) async fn stage_remove_scene<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    scene_id: SceneId,
) -> StoreResult<()> {
    let mut nodes: Vec<NodeRef> = draft
        .scene(scene_id)
        .await?
        .map(|scene| scene.children)
        .unwrap_or_default();

    // Records that claim this scene but are missing from its child list
    // still belong to it.
    for event in draft.events_in_scene(scene_id).await? {
        let node = NodeRef::Event(event.id);
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }
    for jump in draft.jumps_in_scene(scene_id).await? {
        let node = NodeRef::Jump(jump.id);
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    for node in nodes {
        match node {
            NodeRef::Event(id) => stage_remove_event(draft, id).await?,
            NodeRef::Jump(id) => stage_remove_jump(draft, id).await?,
        }
    }
    for path in draft.paths_in_scene(scene_id).await? {
        draft.remove(EntityRef::Path(path.id));
    }
    draft.remove(EntityRef::Scene(scene_id));
    Ok(())
}

/// Remove an event, its choices, and every path touching it.
pub(crate) async fn stage_remove_event<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    event_id: EventId,
) -> StoreResult<()> {
    let Some(event) = draft.event(event_id).await? else {
        return Ok(());
    };

    let mut choices = event.choices().to_vec();
    for choice in draft.choices_of_event(event_id).await? {
        if !choices.contains(&choice.id) {
            choices.push(choice.id);
        }
    }
    for choice in choices {
        draft.remove(EntityRef::Choice(choice));
    }

    let node = NodeRef::Event(event_id);
    for path in draft.paths_in_scene(event.scene_id).await? {
        if path.touches(node) {
            draft.remove(EntityRef::Path(path.id));
        }
    }
    draft.remove(EntityRef::Event(event_id));
    Ok(())
}

/// Remove a jump and every path into it.
pub(crate) async fn stage_remove_jump<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    jump_id: JumpId,
) -> StoreResult<()> {
    let Some(jump) = draft.jump(jump_id).await? else {
        return Ok(());
    };

    let node = NodeRef::Jump(jump_id);
    for path in draft.paths_in_scene(jump.scene_id).await? {
        if path.touches(node) {
            draft.remove(EntityRef::Path(path.id));
        }
    }
    draft.remove(EntityRef::Jump(jump_id));
    Ok(())
}

/// Drop `node` from its scene's child list, if the scene survives.
pub(crate) async fn detach_node<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    scene_id: SceneId,
    node: NodeRef,
) -> StoreResult<()> {
    if let Some(mut scene) = draft.scene(scene_id).await? {
        let before = scene.children.len();
        scene.children.retain(|child| *child != node);
        if scene.children.len() != before {
            draft.save(scene);
        }
    }
    Ok(())
}

/// Remove every jump in the world whose target scene or event is gone.
pub(crate) async fn stage_prune_dangling_jumps<S: EntityStore + ?Sized>(
    draft: &mut Draft<'_, S>,
    world_id: WorldId,
) -> StoreResult<Vec<JumpId>> {
    let mut pruned = Vec::new();

    for jump in draft.jumps_in_world(world_id).await? {
        let scene_gone = match jump.target.scene {
            Some(scene) => draft.scene(scene).await?.is_none(),
            None => false,
        };
        let event_gone = match jump.target.event {
            Some(event) => draft.event(event).await?.is_none(),
            None => false,
        };
        if !(scene_gone || event_gone) {
            continue;
        }

        debug!(jump = %jump.id, "removing jump with dangling target");
        detach_node(draft, jump.scene_id, NodeRef::Jump(jump.id)).await?;
        stage_remove_jump(draft, jump.id).await?;
        pruned.push(jump.id);
    }

    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Choice, Event, EventKind, EventType, Folder, Jump, JumpTarget, ParentRef, Path, PathHandle,
        Scene, World,
    };
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_remove_event_takes_choices_and_paths() {
        let store = MemoryStore::new();
        let world = World::new("w");
        let scene = Scene::new(world.id, ParentRef::World(world.id), "s");
        let mut event = Event::new(world.id, scene.id, EventType::Choice, "e");
        let other = Event::new(world.id, scene.id, EventType::Choice, "o");
        let choice = Choice::new(world.id, event.id, "go");
        event.kind = EventKind::Choice {
            choices: vec![choice.id],
        };
        let out = Path::new(
            world.id,
            scene.id,
            event.id,
            EventType::Choice,
            Some(PathHandle::Choice(choice.id)),
            NodeRef::Event(other.id),
        );
        let into = Path::new(
            world.id,
            scene.id,
            other.id,
            EventType::Choice,
            None,
            NodeRef::Event(event.id),
        );
        store.save_event(event.clone()).await.unwrap();
        store.save_event(other.clone()).await.unwrap();
        store.save_choice(choice.clone()).await.unwrap();
        store.save_path(out.clone()).await.unwrap();
        store.save_path(into.clone()).await.unwrap();

        let mut draft = Draft::new(&store);
        stage_remove_event(&mut draft, event.id).await.unwrap();
        let changes = draft.into_changes();

        assert!(changes.is_removed(EntityRef::Event(event.id)));
        assert!(changes.is_removed(EntityRef::Choice(choice.id)));
        assert!(changes.is_removed(EntityRef::Path(out.id)));
        assert!(changes.is_removed(EntityRef::Path(into.id)));
        assert!(!changes.is_removed(EntityRef::Event(other.id)));
    }

    #[tokio::test]
    async fn test_folder_removal_prunes_jumps_into_it() {
        let store = MemoryStore::new();
        let world = World::new("w");
        let folder = Folder::new(world.id, ParentRef::World(world.id), "f");
        let mut inner = Scene::new(world.id, ParentRef::Folder(folder.id), "inner");
        let mut outer = Scene::new(world.id, ParentRef::World(world.id), "outer");
        let target = Event::new(world.id, inner.id, EventType::Choice, "t");
        inner.children.push(NodeRef::Event(target.id));
        let mut jump = Jump::new(world.id, outer.id, "to inner");
        jump.target = JumpTarget::event(inner.id, target.id);
        outer.children.push(NodeRef::Jump(jump.id));
        let mut folder = folder;
        folder.children.push(BranchRef::Scene(inner.id));

        store.save_folder(folder.clone()).await.unwrap();
        store.save_scene(inner.clone()).await.unwrap();
        store.save_scene(outer.clone()).await.unwrap();
        store.save_event(target.clone()).await.unwrap();
        store.save_jump(jump.clone()).await.unwrap();

        let mut draft = Draft::new(&store);
        stage_remove_folder(&mut draft, folder.id).await.unwrap();
        let pruned = stage_prune_dangling_jumps(&mut draft, world.id).await.unwrap();
        assert_eq!(pruned, vec![jump.id]);

        let outer_after = draft.scene(outer.id).await.unwrap().unwrap();
        assert!(outer_after.children.is_empty());

        let changes = draft.into_changes();
        assert!(changes.is_removed(EntityRef::Folder(folder.id)));
        assert!(changes.is_removed(EntityRef::Scene(inner.id)));
        assert!(changes.is_removed(EntityRef::Event(target.id)));
        assert!(changes.is_removed(EntityRef::Jump(jump.id)));
    }
}
