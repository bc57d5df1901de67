//! Entity store adapter.
//!
//! The store is the single source of truth. The outline tree and scene graph
//! are projections rebuilt from it on load and patched from every committed
//! [`ChangeSet`].

mod changes;
mod draft;
mod memory;

pub use changes::{ChangeSet, Write};
pub(crate) use draft::Draft;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::id::{ChoiceId, EventId, FolderId, JumpId, PathId, SceneId, VariableId, WorldId};
use crate::model::{Choice, Event, Folder, Jump, Path, Scene, Variable, World};
use async_trait::async_trait;
use serde_json::Value;

/// CRUD over per-world entity collections.
///
/// There is no transaction API: a multi-entity edit is a set of independent
/// calls. Removing a record that does not exist is not an error.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // =========================================================================
    // Worlds
    // =========================================================================

    /// Get a world by ID.
    async fn get_world(&self, id: WorldId) -> StoreResult<Option<World>>;

    /// Insert or replace a world.
    async fn save_world(&self, world: World) -> StoreResult<()>;

    /// Delete a world record.
    async fn remove_world(&self, id: WorldId) -> StoreResult<()>;

    // =========================================================================
    // Folders
    // =========================================================================

    /// Get a folder by ID.
    async fn get_folder(&self, id: FolderId) -> StoreResult<Option<Folder>>;

    /// Insert or replace a folder.
    async fn save_folder(&self, folder: Folder) -> StoreResult<()>;

    /// Delete a folder record.
    async fn remove_folder(&self, id: FolderId) -> StoreResult<()>;

    /// All folders of a world.
    async fn folders_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Folder>>;

    // =========================================================================
    // Scenes
    // =========================================================================

    /// Get a scene by ID.
    async fn get_scene(&self, id: SceneId) -> StoreResult<Option<Scene>>;

    /// Insert or replace a scene.
    async fn save_scene(&self, scene: Scene) -> StoreResult<()>;

    /// Delete a scene record.
    async fn remove_scene(&self, id: SceneId) -> StoreResult<()>;

    /// All scenes of a world.
    async fn scenes_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Scene>>;

    // =========================================================================
    // Events
    // =========================================================================

    /// Get an event by ID.
    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>>;

    /// Insert an event, or replace the structure of an existing one.
    ///
    /// An existing event keeps its stored content; bodies change only through
    /// [`EntityStore::save_event_content`].
    async fn save_event(&self, event: Event) -> StoreResult<()>;

    /// Replace the content body of an event.
    ///
    /// Returns `false` when the event does not exist.
    async fn save_event_content(&self, id: EventId, content: Value) -> StoreResult<bool>;

    /// Delete an event record.
    async fn remove_event(&self, id: EventId) -> StoreResult<()>;

    /// All events of a scene.
    async fn events_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Event>>;

    // =========================================================================
    // Choices
    // =========================================================================

    /// Get a choice by ID.
    async fn get_choice(&self, id: ChoiceId) -> StoreResult<Option<Choice>>;

    /// Insert or replace a choice.
    async fn save_choice(&self, choice: Choice) -> StoreResult<()>;

    /// Delete a choice record.
    async fn remove_choice(&self, id: ChoiceId) -> StoreResult<()>;

    /// All choices of an event.
    async fn choices_by_event(&self, event_id: EventId) -> StoreResult<Vec<Choice>>;

    // =========================================================================
    // Jumps
    // =========================================================================

    /// Get a jump by ID.
    async fn get_jump(&self, id: JumpId) -> StoreResult<Option<Jump>>;

    /// Insert or replace a jump.
    async fn save_jump(&self, jump: Jump) -> StoreResult<()>;

    /// Delete a jump record.
    async fn remove_jump(&self, id: JumpId) -> StoreResult<()>;

    /// All jumps of a scene.
    async fn jumps_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Jump>>;

    /// All jumps of a world.
    async fn jumps_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Jump>>;

    // =========================================================================
    // Paths
    // =========================================================================

    /// Get a path by ID.
    async fn get_path(&self, id: PathId) -> StoreResult<Option<Path>>;

    /// Insert or replace a path.
    async fn save_path(&self, path: Path) -> StoreResult<()>;

    /// Delete a path record.
    async fn remove_path(&self, id: PathId) -> StoreResult<()>;

    /// All paths of a scene.
    async fn paths_by_scene(&self, scene_id: SceneId) -> StoreResult<Vec<Path>>;

    // =========================================================================
    // Variables
    // =========================================================================

    /// Get a variable by ID.
    async fn get_variable(&self, id: VariableId) -> StoreResult<Option<Variable>>;

    /// Insert or replace a variable.
    async fn save_variable(&self, variable: Variable) -> StoreResult<()>;

    /// Delete a variable record.
    async fn remove_variable(&self, id: VariableId) -> StoreResult<()>;

    /// All variables of a world.
    async fn variables_by_world(&self, world_id: WorldId) -> StoreResult<Vec<Variable>>;
}
