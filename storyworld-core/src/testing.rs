//! Testing utilities for storyworld editing.
//!
//! This module provides tools for integration testing:
//! - `FlakyStore` for injecting store write failures
//! - `consistency_issues` / `assert_consistent` for auditing a stored world
//! - `StoryFixture` for building a small world through the editor

use crate::config::EditorConfig;
use crate::editor::StoryEditor;
use crate::error::{ContractError, EditResult, StoreError, StoreResult};
use crate::id::{ChoiceId, EventId, FolderId, JumpId, PathId, SceneId, VariableId, WorldId};
use crate::model::{
    BranchRef, Choice, ElementRef, EntityRef, Event, Folder, ItemKind, Jump, NodeRef, ParentRef,
    Path, Scene, Variable, World,
};
use crate::store::{EntityStore, MemoryStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A store wrapper that fails selected writes.
///
/// Reads always pass through. Every save or remove is counted, whether it
/// fails or not.
#[derive(Debug, Default)]
pub struct FlakyStore<S = MemoryStore> {
    inner: S,
    failing: Mutex<HashSet<EntityRef>>,
    fail_all: AtomicBool,
    writes: AtomicUsize,
}

impl<S: EntityStore> FlakyStore<S> {
    /// Wrap a store; nothing fails until told to.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            fail_all: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail every save and remove of `entity`.
    pub fn fail_writes_to(&self, entity: EntityRef) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity);
    }

    /// Fail every write, or stop doing so.
    pub fn fail_all_writes(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Let every write through again.
    pub fn heal(&self) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.fail_all.store(false, Ordering::SeqCst);
    }

    /// Number of writes attempted so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, entity: EntityRef) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let targeted = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&entity);
        if targeted || self.fail_all.load(Ordering::SeqCst) {
            Err(StoreError::backend(format!("injected failure writing {entity}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: EntityStore> EntityStore for FlakyStore<S> {
    async fn get_world(&self, id: WorldId) -> StoreResult<Option<World>> {
        self.inner.get_world(id).await
    }

    async fn save_world(&self, world: World) -> StoreResult<()> {
        self.check(EntityRef::World(world.id))?;
        self.inner.save_world(world).await
    }

    async fn remove_world(&self, id: WorldId) -> StoreResult<()> {
        self.check(EntityRef::World(id))?;
        self.inner.remove_world(id).await
    }

    async fn get_folder(&self, id: FolderId) -> StoreResult<Option<Folder>> {
        self.inner.get_folder(id).await
    }

    async fn save_folder(&self, folder: Folder) -> StoreResult<()> {
        self.check(EntityRef::Folder(folder.id))?;
        self.inner.save_folder(folder).await
    }

    async fn remove_folder(&self, id: FolderId) -> StoreResult<()> {
        self.check(EntityRef::Folder(id))?;
        self.inner.remove_folder(id).await
    }

    async fn folders_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Folder>> {
        self.inner.folders_by_world(world_id).await
    }

    async fn get_scene(&self, id: SceneId) -> StoreResult<Option<Scene>> {
        self.inner.get_scene(id).await
    }

    async fn save_scene(&self, scene: Scene) -> StoreResult<()> {
        self.check(EntityRef::Scene(scene.id))?;
        self.inner.save_scene(scene).await
    }

    async fn remove_scene(&self, id: SceneId) -> StoreResult<()> {
        self.check(EntityRef::Scene(id))?;
        self.inner.remove_scene(id).await
    }

    async fn scenes_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Scene>> {
        self.inner.scenes_by_world(world_id).await
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        self.inner.get_event(id).await
    }

    async fn save_event(&self, event: Event) -> StoreResult<()> {
        self.check(EntityRef::Event(event.id))?;
        self.inner.save_event(event).await
    }

    async fn save_event_content(&self, id: EventId, content: Value) -> StoreResult<bool> {
        self.check(EntityRef::Event(id))?;
        self.inner.save_event_content(id, content).await
    }

    async fn remove_event(&self, id: EventId) -> StoreResult<()> {
        self.check(EntityRef::Event(id))?;
        self.inner.remove_event(id).await
    }

    async fn events_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Event>> {
        self.inner.events_by_scene(scene_id).await
    }

    async fn get_choice(&self, id: ChoiceId) -> StoreResult<Option<Choice>> {
        self.inner.get_choice(id).await
    }

    async fn save_choice(&self, choice: Choice) -> StoreResult<()> {
        self.check(EntityRef::Choice(choice.id))?;
        self.inner.save_choice(choice).await
    }

    async fn remove_choice(&self, id: ChoiceId) -> StoreResult<()> {
        self.check(EntityRef::Choice(id))?;
        self.inner.remove_choice(id).await
    }

    async fn choices_by_event(&self, event_id: EventId) -> StoreResult<Vec<Choice>> {
        self.inner.choices_by_event(event_id).await
    }

    async fn get_jump(&self, id: JumpId) -> StoreResult<Option<Jump>> {
        self.inner.get_jump(id).await
    }

    async fn save_jump(&self, jump: Jump) -> StoreResult<()> {
        self.check(EntityRef::Jump(jump.id))?;
        self.inner.save_jump(jump).await
    }

    async fn remove_jump(&self, id: JumpId) -> StoreResult<()> {
        self.check(EntityRef::Jump(id))?;
        self.inner.remove_jump(id).await
    }

    async fn jumps_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Jump>> {
        self.inner.jumps_by_scene(scene_id).await
    }

    async fn jumps_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Jump>> {
        self.inner.jumps_by_world(world_id).await
    }

    async fn get_path(&self, id: PathId) -> StoreResult<Option<Path>> {
        self.inner.get_path(id).await
    }

    async fn save_path(&self, path: Path) -> StoreResult<()> {
        self.check(EntityRef::Path(path.id))?;
        self.inner.save_path(path).await
    }

    async fn remove_path(&self, id: PathId) -> StoreResult<()> {
        self.check(EntityRef::Path(id))?;
        self.inner.remove_path(id).await
    }

    async fn paths_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Path>> {
        self.inner.paths_by_scene(scene_id).await
    }

    async fn get_variable(&self, id: VariableId) -> StoreResult<Option<Variable>> {
        self.inner.get_variable(id).await
    }

    async fn save_variable(&self, variable: Variable) -> StoreResult<()> {
        self.check(EntityRef::Variable(variable.id))?;
        self.inner.save_variable(variable).await
    }

    async fn remove_variable(&self, id: VariableId) -> StoreResult<()> {
        self.check(EntityRef::Variable(id))?;
        self.inner.remove_variable(id).await
    }

    async fn variables_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Variable>> {
        self.inner.variables_by_world(world_id).await
    }
}

/// Audit a stored world for broken links.
///
/// Checks containment in both directions, folder acyclicity, path locality,
/// uniqueness and handles, ending flags, choice ownership and jump targets.
/// Returns one message per problem; empty when the world is consistent.
pub async fn consistency_issues<S: EntityStore + ?Sized>(
    store: &S,
    world_id: WorldId,
) -> StoreResult<Vec<String>> {
    let mut issues = Vec::new();
    let Some(world) = store.get_world(world_id).await? else {
        return Ok(vec![format!("world {world_id} is missing")]);
    };

    let folders = store.folders_by_world(world_id).await?;
    let scenes = store.scenes_by_world(world_id).await?;

    for child in &world.children {
        let parent = match *child {
            BranchRef::Folder(id) => folders.iter().find(|f| f.id == id).map(|f| f.parent),
            BranchRef::Scene(id) => scenes.iter().find(|s| s.id == id).map(|s| s.parent),
        };
        if parent != Some(ParentRef::World(world_id)) {
            issues.push(format!("world lists {child:?} which does not point back"));
        }
    }

    for folder in &folders {
        if !lists_branch(&world, &folders, folder.parent, BranchRef::Folder(folder.id)) {
            issues.push(format!("folder {} is not listed by its parent", folder.id));
        }
        for child in &folder.children {
            let parent = match *child {
                BranchRef::Folder(id) => folders.iter().find(|f| f.id == id).map(|f| f.parent),
                BranchRef::Scene(id) => scenes.iter().find(|s| s.id == id).map(|s| s.parent),
            };
            if parent != Some(ParentRef::Folder(folder.id)) {
                issues.push(format!(
                    "folder {} lists {child:?} which does not point back",
                    folder.id
                ));
            }
        }

        let mut current = folder.parent;
        let mut steps = 0;
        while let ParentRef::Folder(id) = current {
            steps += 1;
            if id == folder.id || steps > folders.len() {
                issues.push(format!("folder {} is its own ancestor", folder.id));
                break;
            }
            match folders.iter().find(|f| f.id == id) {
                Some(parent) => current = parent.parent,
                None => {
                    issues.push(format!("folder {} has a missing ancestor {id}", folder.id));
                    break;
                }
            }
        }
    }

    let mut event_scene = HashMap::new();
    for scene in &scenes {
        if !lists_branch(&world, &folders, scene.parent, BranchRef::Scene(scene.id)) {
            issues.push(format!("scene {} is not listed by its parent", scene.id));
        }

        let events = store.events_by_scene(scene.id).await?;
        let jumps = store.jumps_by_scene(scene.id).await?;
        let mut members: HashSet<NodeRef> = HashSet::new();
        for event in &events {
            members.insert(NodeRef::Event(event.id));
            event_scene.insert(event.id, scene.id);
        }
        for jump in &jumps {
            members.insert(NodeRef::Jump(jump.id));
        }
        let listed: HashSet<NodeRef> = scene.children.iter().copied().collect();
        if listed != members {
            issues.push(format!("scene {} child list disagrees with its nodes", scene.id));
        }

        for event in &events {
            for &choice in event.choices() {
                match store.get_choice(choice).await? {
                    Some(record) if record.event_id == event.id => {}
                    _ => issues.push(format!("event {} lists a foreign choice {choice}", event.id)),
                }
            }
        }

        let mut keys = HashSet::new();
        for path in store.paths_by_scene(scene.id).await? {
            let origin = events.iter().find(|e| e.id == path.origin);
            if origin.is_none() || !members.contains(&path.destination) {
                issues.push(format!("path {} leaves scene {}", path.id, scene.id));
            }
            if !keys.insert(path.key()) {
                issues.push(format!("path {} duplicates another path", path.id));
            }
            if let Some(origin) = origin {
                if origin.event_type() != path.origin_type || !origin.has_handle(path.handle) {
                    issues.push(format!("path {} uses a handle its origin lacks", path.id));
                }
                if origin.ending {
                    issues.push(format!(
                        "ending event {} has outgoing path {}",
                        origin.id, path.id
                    ));
                }
            }
        }
    }

    for jump in store.jumps_by_world(world_id).await? {
        if let Some(scene) = jump.target.scene {
            if !scenes.iter().any(|s| s.id == scene) {
                issues.push(format!("jump {} targets missing scene {scene}", jump.id));
            }
        }
        if let Some(event) = jump.target.event {
            if event_scene.get(&event) != jump.target.scene.as_ref() {
                issues.push(format!("jump {} targets event {event} outside its scene", jump.id));
            }
        }
    }

    Ok(issues)
}

fn lists_branch(world: &World, folders: &[Folder], parent: ParentRef, child: BranchRef) -> bool {
    match parent {
        ParentRef::World(id) => world.id == id && world.children.contains(&child),
        ParentRef::Folder(id) => folders
            .iter()
            .any(|f| f.id == id && f.children.contains(&child)),
    }
}

/// Panic with every issue [`consistency_issues`] finds.
pub async fn assert_consistent<S: EntityStore + ?Sized>(store: &S, world_id: WorldId) {
    match consistency_issues(store, world_id).await {
        Ok(issues) => assert!(issues.is_empty(), "inconsistent world:\n{}", issues.join("\n")),
        Err(e) => panic!("store read failed during audit: {e}"),
    }
}

/// A small world built through the editor: one folder holding one scene.
pub struct StoryFixture<S: EntityStore = MemoryStore> {
    /// The editor over the world.
    pub editor: StoryEditor<S>,
    /// Top-level folder.
    pub folder: FolderId,
    /// Scene inside the folder.
    pub scene: SceneId,
}

impl<S: EntityStore> StoryFixture<S> {
    /// Build the fixture on `store`.
    pub async fn build(store: Arc<S>) -> EditResult<Self> {
        let mut editor = StoryEditor::create(store, "Fixture", EditorConfig::default()).await?;
        let root = editor.outline().root();
        let folder = editor.add_child(root, ItemKind::Folder).await?;
        let scene = editor.add_child(folder, ItemKind::Scene).await?;
        let (ElementRef::Folder(folder), ElementRef::Scene(scene)) = (folder, scene) else {
            return Err(ContractError::UnknownItem(scene).into());
        };
        Ok(Self {
            editor,
            folder,
            scene,
        })
    }

    /// Add an event to the fixture scene.
    pub async fn add_event(&mut self) -> EditResult<EventId> {
        match self
            .editor
            .add_child(ElementRef::Scene(self.scene), ItemKind::Event)
            .await?
        {
            ElementRef::Event(id) => Ok(id),
            other => Err(ContractError::UnknownItem(other).into()),
        }
    }

    /// Add a jump to the fixture scene.
    pub async fn add_jump(&mut self) -> EditResult<JumpId> {
        match self
            .editor
            .add_child(ElementRef::Scene(self.scene), ItemKind::Jump)
            .await?
        {
            ElementRef::Jump(id) => Ok(id),
            other => Err(ContractError::UnknownItem(other).into()),
        }
    }
}
