//! In-memory entity store.

use super::EntityStore;
use crate::error::StoreResult;
use crate::id::{ChoiceId, EventId, FolderId, JumpId, PathId, SceneId, VariableId, WorldId};
use crate::model::{Choice, EntityRef, Event, Folder, Jump, Path, Scene, Variable, World};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Record tables, one per entity kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    worlds: BTreeMap<WorldId, World>,
    folders: BTreeMap<FolderId, Folder>,
    scenes: BTreeMap<SceneId, Scene>,
    events: BTreeMap<EventId, Event>,
    choices: BTreeMap<ChoiceId, Choice>,
    jumps: BTreeMap<JumpId, Jump>,
    paths: BTreeMap<PathId, Path>,
    variables: BTreeMap<VariableId, Variable>,
}

/// A local, process-memory [`EntityStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record exists.
    pub async fn contains(&self, entity: EntityRef) -> bool {
        let t = self.tables.read().await;
        match entity {
            EntityRef::World(id) => t.worlds.contains_key(&id),
            EntityRef::Folder(id) => t.folders.contains_key(&id),
            EntityRef::Scene(id) => t.scenes.contains_key(&id),
            EntityRef::Event(id) => t.events.contains_key(&id),
            EntityRef::Choice(id) => t.choices.contains_key(&id),
            EntityRef::Jump(id) => t.jumps.contains_key(&id),
            EntityRef::Path(id) => t.paths.contains_key(&id),
            EntityRef::Variable(id) => t.variables.contains_key(&id),
        }
    }

    /// Total number of records across all tables.
    pub async fn record_count(&self) -> usize {
        let t = self.tables.read().await;
        t.worlds.len()
            + t.folders.len()
            + t.scenes.len()
            + t.events.len()
            + t.choices.len()
            + t.jumps.len()
            + t.paths.len()
            + t.variables.len()
    }

    /// Serialize every table to JSON.
    pub async fn to_json(&self) -> serde_json::Result<String> {
        let t = self.tables.read().await;
        serde_json::to_string_pretty(&*t)
    }

    /// Rebuild a store from [`MemoryStore::to_json`] output.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let tables: Tables = serde_json::from_str(json)?;
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_world(&self, id: WorldId) -> StoreResult<Option<World>> {
        Ok(self.tables.read().await.worlds.get(&id).cloned())
    }

    async fn save_world(&self, world: World) -> StoreResult<()> {
        self.tables.write().await.worlds.insert(world.id, world);
        Ok(())
    }

    async fn remove_world(&self, id: WorldId) -> StoreResult<()> {
        self.tables.write().await.worlds.remove(&id);
        Ok(())
    }

    async fn get_folder(&self, id: FolderId) -> StoreResult<Option<Folder>> {
        Ok(self.tables.read().await.folders.get(&id).cloned())
    }

    async fn save_folder(&self, folder: Folder) -> StoreResult<()> {
        self.tables.write().await.folders.insert(folder.id, folder);
        Ok(())
    }

    async fn remove_folder(&self, id: FolderId) -> StoreResult<()> {
        self.tables.write().await.folders.remove(&id);
        Ok(())
    }

    async fn folders_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Folder>> {
        let t = self.tables.read().await;
        Ok(t.folders
            .values()
            .filter(|f| f.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn get_scene(&self, id: SceneId) -> StoreResult<Option<Scene>> {
        Ok(self.tables.read().await.scenes.get(&id).cloned())
    }

    async fn save_scene(&self, scene: Scene) -> StoreResult<()> {
        self.tables.write().await.scenes.insert(scene.id, scene);
        Ok(())
    }

    async fn remove_scene(&self, id: SceneId) -> StoreResult<()> {
        self.tables.write().await.scenes.remove(&id);
        Ok(())
    }

    async fn scenes_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Scene>> {
        let t = self.tables.read().await;
        Ok(t.scenes
            .values()
            .filter(|s| s.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn save_event(&self, mut event: Event) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if let Some(stored) = t.events.get_mut(&event.id) {
            event.content = stored.content.take();
        }
        t.events.insert(event.id, event);
        Ok(())
    }

    async fn save_event_content(&self, id: EventId, content: Value) -> StoreResult<bool> {
        match self.tables.write().await.events.get_mut(&id) {
            Some(event) => {
                event.content = Some(content);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_event(&self, id: EventId) -> StoreResult<()> {
        self.tables.write().await.events.remove(&id);
        Ok(())
    }

    async fn events_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Event>> {
        let t = self.tables.read().await;
        Ok(t.events
            .values()
            .filter(|e| e.scene_id == scene_id)
            .cloned()
            .collect())
    }

    async fn get_choice(&self, id: ChoiceId) -> StoreResult<Option<Choice>> {
        Ok(self.tables.read().await.choices.get(&id).cloned())
    }

    async fn save_choice(&self, choice: Choice) -> StoreResult<()> {
        self.tables.write().await.choices.insert(choice.id, choice);
        Ok(())
    }

    async fn remove_choice(&self, id: ChoiceId) -> StoreResult<()> {
        self.tables.write().await.choices.remove(&id);
        Ok(())
    }

    async fn choices_by_event(&self, event_id: EventId) -> StoreResult<Vec<Choice>> {
        let t = self.tables.read().await;
        Ok(t.choices
            .values()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn get_jump(&self, id: JumpId) -> StoreResult<Option<Jump>> {
        Ok(self.tables.read().await.jumps.get(&id).cloned())
    }

    async fn save_jump(&self, jump: Jump) -> StoreResult<()> {
        self.tables.write().await.jumps.insert(jump.id, jump);
        Ok(())
    }

    async fn remove_jump(&self, id: JumpId) -> StoreResult<()> {
        self.tables.write().await.jumps.remove(&id);
        Ok(())
    }

    async fn jumps_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Jump>> {
        let t = self.tables.read().await;
        Ok(t.jumps
            .values()
            .filter(|j| j.scene_id == scene_id)
            .cloned()
            .collect())
    }

    async fn jumps_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Jump>> {
        let t = self.tables.read().await;
        Ok(t.jumps
            .values()
            .filter(|j| j.world_id == world_id)
            .cloned()
            .collect())
    }

    async fn get_path(&self, id: PathId) -> StoreResult<Option<Path>> {
        Ok(self.tables.read().await.paths.get(&id).cloned())
    }

    async fn save_path(&self, path: Path) -> StoreResult<()> {
        self.tables.write().await.paths.insert(path.id, path);
        Ok(())
    }

    async fn remove_path(&self, id: PathId) -> StoreResult<()> {
        self.tables.write().await.paths.remove(&id);
        Ok(())
    }

    async fn paths_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Path>> {
        let t = self.tables.read().await;
        Ok(t.paths
            .values()
            .filter(|p| p.scene_id == scene_id)
            .cloned()
            .collect())
    }

    async fn get_variable(&self, id: VariableId) -> StoreResult<Option<Variable>> {
        Ok(self.tables.read().await.variables.get(&id).cloned())
    }

    async fn save_variable(&self, variable: Variable) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .variables
            .insert(variable.id, variable);
        Ok(())
    }

    async fn remove_variable(&self, id: VariableId) -> StoreResult<()> {
        self.tables.write().await.variables.remove(&id);
        Ok(())
    }

    async fn variables_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Variable>> {
        let t = self.tables.read().await;
        Ok(t.variables
            .values()
            .filter(|v| v.world_id == world_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, ParentRef};

    #[tokio::test]
    async fn test_save_get_remove() {
        let store = MemoryStore::new();
        let world = World::new("Tidewater");
        let world_id = world.id;
        store.save_world(world).await.unwrap();

        let scene = Scene::new(world_id, ParentRef::World(world_id), "Docks");
        let scene_id = scene.id;
        store.save_scene(scene).await.unwrap();

        assert!(store.get_scene(scene_id).await.unwrap().is_some());
        assert_eq!(store.scenes_by_world(world_id).await.unwrap().len(), 1);

        store.remove_scene(scene_id).await.unwrap();
        assert!(store.get_scene(scene_id).await.unwrap().is_none());
        // Removing twice is fine.
        store.remove_scene(scene_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_lookup_scoping() {
        let store = MemoryStore::new();
        let world_id = WorldId::new();
        let a = SceneId::new();
        let b = SceneId::new();
        store
            .save_event(Event::new(world_id, a, EventType::Choice, "one"))
            .await
            .unwrap();
        store
            .save_event(Event::new(world_id, b, EventType::Input, "two"))
            .await
            .unwrap();

        let in_a = store.events_by_scene(a).await.unwrap();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].title, "one");
    }

    #[tokio::test]
    async fn test_structural_save_keeps_content() {
        let store = MemoryStore::new();
        let event = Event::new(WorldId::new(), SceneId::new(), EventType::Choice, "Gate");
        store.save_event(event.clone()).await.unwrap();
        assert!(store
            .save_event_content(event.id, serde_json::json!("The gate creaks"))
            .await
            .unwrap());

        // A record read before the body was written.
        let mut stale = event.clone();
        stale.ending = true;
        store.save_event(stale).await.unwrap();

        let stored = store.get_event(event.id).await.unwrap().unwrap();
        assert!(stored.ending);
        assert_eq!(stored.content, Some(serde_json::json!("The gate creaks")));
        assert!(!store
            .save_event_content(EventId::new(), serde_json::json!("lost"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_json_roundtrip_preserves_records() {
        let store = MemoryStore::new();
        let world = World::new("Tidewater");
        let world_id = world.id;
        store.save_world(world).await.unwrap();

        let json = store.to_json().await.unwrap();
        let restored = MemoryStore::from_json(&json).unwrap();
        assert!(restored.contains(EntityRef::World(world_id)).await);
        assert_eq!(restored.record_count().await, 1);
    }
}
