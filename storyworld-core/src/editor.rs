//! StoryEditor - the editing API over one world.
//!
//! The editor owns the injected store handle and the two projections built
//! from it: the outline of the whole world and the flow graph of at most one
//! open scene. Every operation stages its writes in a [`ChangeSet`], patches
//! the projections, and then persists the set with one concurrent fan-out.

use crate::config::EditorConfig;
use crate::content::ContentSaver;
use crate::error::{ContractError, EditError, EditResult};
use crate::graph::SceneGraph;
use crate::id::WorldId;
use crate::model::{ElementRef, EntityRef, World};
use crate::outline::{OutlineItemView, OutlineTree};
use crate::selection::{Highlight, Selection};
use crate::store::{ChangeSet, EntityStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Editor for one storyworld.
pub struct StoryEditor<S: EntityStore> {
    pub(crate) store: Arc<S>,
    pub(crate) config: EditorConfig,
    pub(crate) outline: OutlineTree,
    pub(crate) graph: Option<SceneGraph>,
    pub(crate) selection: Selection,
}

impl<S: EntityStore> StoryEditor<S> {
    /// Create a new, empty world and open it.
    pub async fn create(
        store: Arc<S>,
        title: impl Into<String>,
        config: EditorConfig,
    ) -> EditResult<Self> {
        let world = World::new(title);
        let world_id = world.id;
        store.save_world(world).await?;
        info!(world = %world_id, "created world");
        Self::open(store, world_id, config).await
    }

    /// Open an existing world.
    pub async fn open(store: Arc<S>, world_id: WorldId, config: EditorConfig) -> EditResult<Self> {
        let outline = OutlineTree::load(store.as_ref(), world_id).await?;
        Ok(Self {
            store,
            config,
            outline,
            graph: None,
            selection: Selection::new(),
        })
    }

    /// The store this editor writes through to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The editor configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The open world.
    pub fn world_id(&self) -> WorldId {
        self.outline.world_id()
    }

    /// The outline projection.
    pub fn outline(&self) -> &OutlineTree {
        &self.outline
    }

    /// The flow graph of the open scene.
    pub fn graph(&self) -> Option<&SceneGraph> {
        self.graph.as_ref()
    }

    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Outline records for the view layer.
    pub fn outline_views(&self) -> Vec<OutlineItemView> {
        self.outline.views(self.selection.outline())
    }

    /// Selected and highlighted graph elements.
    pub fn highlight(&self) -> Highlight {
        match &self.graph {
            Some(graph) => Highlight::project(self.selection.state(), graph),
            None => Highlight::default(),
        }
    }

    /// Select an outline item.
    pub fn select(&mut self, item: ElementRef) -> EditResult<()> {
        if !self.outline.contains(item) {
            return Err(ContractError::UnknownItem(item).into());
        }
        self.selection.select_outline(item, self.graph.as_ref());
        Ok(())
    }

    /// Select nothing.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Expand or collapse an outline item.
    pub fn set_expanded(&mut self, item: ElementRef, expanded: bool) -> EditResult<()> {
        if self.outline.set_expanded(item, expanded) {
            Ok(())
        } else {
            Err(ContractError::UnknownItem(item).into())
        }
    }

    /// Patch the projections with `changes`, then persist them.
    ///
    /// On partial failure the projections are rebuilt from the store and the
    /// failed writes are reported.
    pub(crate) async fn commit(
        &mut self,
        operation: &'static str,
        changes: ChangeSet,
    ) -> EditResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        self.outline.apply(&changes);
        if let Some(graph) = self.graph.as_mut() {
            if !graph.apply(&changes) {
                debug!(scene = %graph.scene_id(), "open scene removed; closing graph");
                self.graph = None;
            }
        }
        self.prune_selection();

        let failed = changes.commit(self.store.as_ref()).await;
        if failed.is_empty() {
            debug!(operation, writes = changes.len(), "committed");
            return Ok(());
        }

        warn!(
            operation,
            failed = failed.len(),
            writes = changes.len(),
            "store writes failed; rebuilding projections"
        );
        if let Err(error) = self.resync().await {
            warn!(operation, %error, "could not rebuild projections after failed writes");
        }
        Err(EditError::PartialWrite { operation, failed })
    }

    /// Rebuild the outline and open graph from the store.
    pub async fn resync(&mut self) -> EditResult<()> {
        let mut outline = OutlineTree::load(self.store.as_ref(), self.world_id()).await?;
        outline.inherit_flags(&self.outline);
        self.outline = outline;

        if let Some(scene_id) = self.graph.as_ref().map(SceneGraph::scene_id) {
            self.graph = match SceneGraph::load(self.store.as_ref(), scene_id).await {
                Ok(graph) => Some(graph),
                Err(EditError::Contract(_)) => None,
                Err(e) => return Err(e),
            };
        }
        self.prune_selection();
        Ok(())
    }

    fn prune_selection(&mut self) {
        let outline = &self.outline;
        let graph = self.graph.as_ref();
        self.selection.retain(
            |item| outline.contains(item),
            |entity| graph.is_some_and(|graph| graph.contains(entity)),
        );
    }
}

impl<S: EntityStore + 'static> StoryEditor<S> {
    /// Start a debounced writer for event content bodies.
    pub fn content_saver(&self) -> ContentSaver {
        ContentSaver::spawn(Arc::clone(&self.store), self.config.content_debounce)
    }
}
