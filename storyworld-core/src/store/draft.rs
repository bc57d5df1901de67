//! Read-your-writes overlay used while an edit is being staged.

use super::{ChangeSet, EntityStore, Write};
use crate::error::StoreResult;
use crate::id::{ChoiceId, EventId, FolderId, JumpId, PathId, SceneId, VariableId, WorldId};
use crate::model::{
    Choice, EntityRef, Event, Folder, Jump, Path, Record, Scene, Variable, World,
};
use std::collections::HashSet;

/// Stages writes over a store; reads see staged writes first.
pub(crate) struct Draft<'s, S: EntityStore + ?Sized> {
    store: &'s S,
    changes: ChangeSet,
}

macro_rules! overlay_get {
    ($name:ident, $getter:ident, $id:ty, $variant:ident, $ty:ty) => {
        pub(crate) async fn $name(&self, id: $id) -> StoreResult<Option<$ty>> {
            match self.changes.get(EntityRef::$variant(id)) {
                Some(Write::Save(Record::$variant(record))) => Ok(Some(record.clone())),
                Some(_) => Ok(None),
                None => self.store.$getter(id).await,
            }
        }
    };
}

impl<'s, S: EntityStore + ?Sized> Draft<'s, S> {
    pub(crate) fn new(store: &'s S) -> Self {
        Self {
            store,
            changes: ChangeSet::new(),
        }
    }

    pub(crate) fn save(&mut self, record: impl Into<Record>) {
        self.changes.save(record);
    }

    pub(crate) fn remove(&mut self, entity: EntityRef) {
        self.changes.remove(entity);
    }

    pub(crate) fn into_changes(self) -> ChangeSet {
        self.changes
    }

    overlay_get!(world, get_world, WorldId, World, World);
    overlay_get!(folder, get_folder, FolderId, Folder, Folder);
    overlay_get!(scene, get_scene, SceneId, Scene, Scene);
    overlay_get!(event, get_event, EventId, Event, Event);
    overlay_get!(choice, get_choice, ChoiceId, Choice, Choice);
    overlay_get!(jump, get_jump, JumpId, Jump, Jump);
    overlay_get!(path, get_path, PathId, Path, Path);
    overlay_get!(variable, get_variable, VariableId, Variable, Variable);

    pub(crate) async fn scenes_in_world(&self, world_id: WorldId) -> StoreResult<Vec<Scene>> {
        let stored = self.store.scenes_by_world(world_id).await?;
        Ok(self.merge(
            stored,
            |s| EntityRef::Scene(s.id),
            |r| match r {
                Record::Scene(s) => Some(s),
                _ => None,
            },
            |s| s.world_id == world_id,
        ))
    }

    pub(crate) async fn events_in_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Event>> {
        let stored = self.store.events_by_scene(scene_id).await?;
        Ok(self.merge(
            stored,
            |e| EntityRef::Event(e.id),
            |r| match r {
                Record::Event(e) => Some(e),
                _ => None,
            },
            |e| e.scene_id == scene_id,
        ))
    }

    pub(crate) async fn choices_of_event(&self, event_id: EventId) -> StoreResult<Vec<Choice>> {
        let stored = self.store.choices_by_event(event_id).await?;
        Ok(self.merge(
            stored,
            |c| EntityRef::Choice(c.id),
            |r| match r {
                Record::Choice(c) => Some(c),
                _ => None,
            },
            |c| c.event_id == event_id,
        ))
    }

    pub(crate) async fn jumps_in_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Jump>> {
        let stored = self.store.jumps_by_scene(scene_id).await?;
        Ok(self.merge(
            stored,
            |j| EntityRef::Jump(j.id),
            |r| match r {
                Record::Jump(j) => Some(j),
                _ => None,
            },
            |j| j.scene_id == scene_id,
        ))
    }

    pub(crate) async fn jumps_in_world(&self, world_id: WorldId) -> StoreResult<Vec<Jump>> {
        let stored = self.store.jumps_by_world(world_id).await?;
        Ok(self.merge(
            stored,
            |j| EntityRef::Jump(j.id),
            |r| match r {
                Record::Jump(j) => Some(j),
                _ => None,
            },
            |j| j.world_id == world_id,
        ))
    }

    pub(crate) async fn paths_in_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Path>> {
        let stored = self.store.paths_by_scene(scene_id).await?;
        Ok(self.merge(
            stored,
            |p| EntityRef::Path(p.id),
            |r| match r {
                Record::Path(p) => Some(p),
                _ => None,
            },
            |p| p.scene_id == scene_id,
        ))
    }

    /// Apply staged writes to a stored listing.
    fn merge<T: Clone>(
        &self,
        stored: Vec<T>,
        entity: impl Fn(&T) -> EntityRef,
        extract: impl Fn(&Record) -> Option<&T>,
        belongs: impl Fn(&T) -> bool,
    ) -> Vec<T> {
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(stored.len());

        for item in stored {
            let key = entity(&item);
            seen.insert(key);
            match self.changes.get(key) {
                Some(Write::Remove(_)) => {}
                Some(Write::Save(record)) => {
                    if let Some(staged) = extract(record).filter(|s| belongs(*s)) {
                        merged.push(staged.clone());
                    }
                }
                None => merged.push(item),
            }
        }

        for record in self.changes.saved() {
            if let Some(staged) = extract(record) {
                if !seen.contains(&entity(staged)) && belongs(staged) {
                    merged.push(staged.clone());
                }
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, NodeRef};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_reads_see_staged_writes() {
        let store = MemoryStore::new();
        let world_id = WorldId::new();
        let scene_id = SceneId::new();
        let a = Event::new(world_id, scene_id, EventType::Choice, "a");
        let b = Event::new(world_id, scene_id, EventType::Choice, "b");
        let stale = Path::new(
            world_id,
            scene_id,
            a.id,
            EventType::Choice,
            None,
            NodeRef::Event(b.id),
        );
        store.save_path(stale.clone()).await.unwrap();

        let mut draft = Draft::new(&store);
        draft.remove(EntityRef::Path(stale.id));
        let fresh = Path::new(
            world_id,
            scene_id,
            b.id,
            EventType::Choice,
            None,
            NodeRef::Event(a.id),
        );
        draft.save(fresh.clone());

        let paths = draft.paths_in_scene(scene_id).await.unwrap();
        assert_eq!(paths, vec![fresh]);
        assert!(draft.path(stale.id).await.unwrap().is_none());
        // Nothing reached the store yet.
        assert!(store.get_path(stale.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_staged_move_leaves_listing() {
        let store = MemoryStore::new();
        let world_id = WorldId::new();
        let from = SceneId::new();
        let to = SceneId::new();
        let mut event = Event::new(world_id, from, EventType::Input, "moving");
        store.save_event(event.clone()).await.unwrap();

        let mut draft = Draft::new(&store);
        event.scene_id = to;
        draft.save(event.clone());

        assert!(draft.events_in_scene(from).await.unwrap().is_empty());
        assert_eq!(draft.events_in_scene(to).await.unwrap().len(), 1);
    }
}
