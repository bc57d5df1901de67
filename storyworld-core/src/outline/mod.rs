//! Outline tree: the World → Folder/Scene → Event/Jump containment hierarchy.
//!
//! The tree is an arena keyed by [`ElementRef`]. It owns no durable state:
//! it is rebuilt from the store on load and patched from each committed
//! [`ChangeSet`]. Only presentation flags (`expanded`, `renaming`) live here.

mod cascade;
mod ops;

pub(crate) use cascade::{stage_prune_dangling_jumps, stage_remove_event, stage_remove_jump};

use crate::error::{ContractError, EditResult};
use crate::id::WorldId;
use crate::model::{ElementRef, EntityRef, ItemKind, Record};
use crate::store::{ChangeSet, EntityStore, Write};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One node of the outline tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineItem {
    /// The item.
    pub id: ElementRef,
    /// Display title.
    pub title: String,
    /// Containing item; `None` only for the world root.
    pub parent: Option<ElementRef>,
    /// Ordered children.
    pub children: Vec<ElementRef>,
    /// Whether the item is expanded in the tree view.
    pub expanded: bool,
    /// Whether the item awaits a title after being added.
    pub renaming: bool,
}

impl OutlineItem {
    fn new(
        id: ElementRef,
        title: String,
        parent: Option<ElementRef>,
        children: Vec<ElementRef>,
    ) -> Self {
        Self {
            id,
            title,
            parent,
            children,
            expanded: false,
            renaming: false,
        }
    }

    /// The item kind.
    pub fn kind(&self) -> ItemKind {
        self.id.kind()
    }
}

/// Outline item as handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItemView {
    /// The item.
    pub id: ElementRef,
    /// Item kind.
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Display title.
    pub title: String,
    /// Containing item.
    pub parent_id: Option<ElementRef>,
    /// Ordered children.
    pub children: Vec<ElementRef>,
    /// Expanded in the tree view.
    pub expanded: bool,
    /// Currently selected.
    pub selected: bool,
    /// Awaiting a title.
    pub renaming: bool,
}

/// In-memory projection of one world's containment hierarchy.
#[derive(Debug, Clone)]
pub struct OutlineTree {
    world_id: WorldId,
    items: HashMap<ElementRef, OutlineItem>,
}

impl OutlineTree {
    /// Rebuild the tree for a world from the store.
    pub async fn load<S: EntityStore + ?Sized>(store: &S, world_id: WorldId) -> EditResult<Self> {
        let world = store
            .get_world(world_id)
            .await?
            .ok_or(ContractError::UnknownItem(ElementRef::World(world_id)))?;

        let mut changes = ChangeSet::new();
        changes.save(world);
        for folder in store.folders_by_world(world_id).await? {
            changes.save(folder);
        }
        for scene in store.scenes_by_world(world_id).await? {
            for event in store.events_by_scene(scene.id).await? {
                changes.save(event);
            }
            for jump in store.jumps_by_scene(scene.id).await? {
                changes.save(jump);
            }
            changes.save(scene);
        }

        let mut tree = Self {
            world_id,
            items: HashMap::new(),
        };
        tree.apply(&changes);
        tree.drop_dangling_children();
        tree.adopt_orphans();
        if let Some(root) = tree.items.get_mut(&ElementRef::World(world_id)) {
            root.expanded = true;
        }

        debug!(world = %world_id, items = tree.items.len(), "outline loaded");
        Ok(tree)
    }

    /// The world this tree mirrors.
    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// The root item reference.
    pub fn root(&self) -> ElementRef {
        ElementRef::World(self.world_id)
    }

    /// Look up an item.
    pub fn item(&self, id: ElementRef) -> Option<&OutlineItem> {
        self.items.get(&id)
    }

    /// Whether an item exists.
    pub fn contains(&self, id: ElementRef) -> bool {
        self.items.contains_key(&id)
    }

    /// Ordered children of an item; empty if unknown.
    pub fn children(&self, id: ElementRef) -> &[ElementRef] {
        self.items
            .get(&id)
            .map(|item| item.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parent of an item.
    pub fn parent(&self, id: ElementRef) -> Option<ElementRef> {
        self.items.get(&id).and_then(|item| item.parent)
    }

    /// Number of items, root included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `candidate` lies strictly below `ancestor`.
    pub fn is_descendant(&self, ancestor: ElementRef, candidate: ElementRef) -> bool {
        let mut current = self.parent(candidate);
        // Bounded walk; a corrupted parent cycle cannot hang the caller.
        for _ in 0..=self.items.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.parent(id),
                None => return false,
            }
        }
        false
    }

    /// All items below `id`, depth first.
    pub fn descendants(&self, id: ElementRef) -> Vec<ElementRef> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementRef> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Items in depth-first display order, as view records.
    pub fn views(&self, selected: Option<ElementRef>) -> Vec<OutlineItemView> {
        let root = self.root();
        std::iter::once(root)
            .chain(self.descendants(root))
            .filter_map(|id| self.items.get(&id))
            .map(|item| OutlineItemView {
                id: item.id,
                kind: item.kind(),
                title: item.title.clone(),
                parent_id: item.parent,
                children: item.children.clone(),
                expanded: item.expanded,
                selected: selected == Some(item.id),
                renaming: item.renaming,
            })
            .collect()
    }

    pub(crate) fn set_expanded(&mut self, id: ElementRef, expanded: bool) -> bool {
        match self.items.get_mut(&id) {
            Some(item) => {
                item.expanded = expanded;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_renaming(&mut self, id: ElementRef, renaming: bool) {
        if let Some(item) = self.items.get_mut(&id) {
            item.renaming = renaming;
        }
    }

    /// Carry presentation flags over from an older projection.
    pub(crate) fn inherit_flags(&mut self, previous: &OutlineTree) {
        for (id, item) in self.items.iter_mut() {
            if let Some(old) = previous.items.get(id) {
                item.expanded = old.expanded;
                item.renaming = old.renaming;
            }
        }
    }

    /// Patch the projection with committed (or about to be committed) writes.
    pub(crate) fn apply(&mut self, changes: &ChangeSet) {
        for write in changes.writes() {
            match write {
                Write::Save(record) => self.upsert(record),
                Write::Remove(entity) => {
                    let element = match *entity {
                        EntityRef::Folder(id) => ElementRef::Folder(id),
                        EntityRef::Scene(id) => ElementRef::Scene(id),
                        EntityRef::Event(id) => ElementRef::Event(id),
                        EntityRef::Jump(id) => ElementRef::Jump(id),
                        _ => continue,
                    };
                    self.items.remove(&element);
                }
            }
        }
    }

    fn upsert(&mut self, record: &Record) {
        let (id, title, parent, children) = match record {
            Record::World(w) if w.id == self.world_id => (
                ElementRef::World(w.id),
                &w.title,
                None,
                w.children.iter().map(|&c| ElementRef::from(c)).collect(),
            ),
            Record::Folder(f) if f.world_id == self.world_id => (
                ElementRef::Folder(f.id),
                &f.title,
                Some(ElementRef::from(f.parent)),
                f.children.iter().map(|&c| ElementRef::from(c)).collect(),
            ),
            Record::Scene(s) if s.world_id == self.world_id => (
                ElementRef::Scene(s.id),
                &s.title,
                Some(ElementRef::from(s.parent)),
                s.children.iter().map(|&c| ElementRef::from(c)).collect(),
            ),
            Record::Event(e) if e.world_id == self.world_id => (
                ElementRef::Event(e.id),
                &e.title,
                Some(ElementRef::Scene(e.scene_id)),
                Vec::new(),
            ),
            Record::Jump(j) if j.world_id == self.world_id => (
                ElementRef::Jump(j.id),
                &j.title,
                Some(ElementRef::Scene(j.scene_id)),
                Vec::new(),
            ),
            _ => return,
        };

        match self.items.get_mut(&id) {
            Some(item) => {
                item.title = title.clone();
                item.parent = parent;
                item.children = children;
            }
            None => {
                self.items
                    .insert(id, OutlineItem::new(id, title.clone(), parent, children));
            }
        }
    }

    /// Child refs whose record never loaded are referential gaps: drop them.
    fn drop_dangling_children(&mut self) {
        let known: HashSet<ElementRef> = self.items.keys().copied().collect();
        for item in self.items.values_mut() {
            let before = item.children.len();
            item.children.retain(|child| known.contains(child));
            if item.children.len() != before {
                warn!(
                    item = %item.id,
                    missing = before - item.children.len(),
                    "outline item lists children that do not exist"
                );
            }
        }
    }

    /// Reconcile items whose stored parent does not list them.
    ///
    /// A write that saved a child but not its parent's child list leaves one
    /// behind. Orphans are appended to their parent, or dropped with their
    /// subtree when the parent itself is gone.
    fn adopt_orphans(&mut self) {
        loop {
            let mut orphans: Vec<(ElementRef, Option<ElementRef>)> = self
                .items
                .values()
                .filter(|item| item.id != self.root())
                .filter_map(|item| match item.parent {
                    Some(parent) => match self.items.get(&parent) {
                        Some(p) if p.children.contains(&item.id) => None,
                        Some(_) => Some((item.id, Some(parent))),
                        None => Some((item.id, None)),
                    },
                    None => Some((item.id, None)),
                })
                .collect();
            if orphans.is_empty() {
                return;
            }
            orphans.sort();

            let mut dropped = false;
            for (id, parent) in orphans {
                match parent {
                    Some(parent) => {
                        warn!(
                            item = %id,
                            parent = %parent,
                            "adopting item its parent does not list"
                        );
                        if let Some(p) = self.items.get_mut(&parent) {
                            p.children.push(id);
                        }
                    }
                    None => {
                        warn!(item = %id, "dropping item whose parent does not exist");
                        self.items.remove(&id);
                        dropped = true;
                    }
                }
            }
            // Children of a dropped item are orphans on the next pass.
            if dropped {
                self.drop_dangling_children();
            } else {
                return;
            }
        }
    }

    /// Check that parent and child links agree in both directions.
    ///
    /// Returns one message per broken link; empty when consistent.
    pub fn containment_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for item in self.items.values() {
            if let Some(parent) = item.parent {
                let listed = self
                    .items
                    .get(&parent)
                    .map(|p| p.children.contains(&item.id))
                    .unwrap_or(false);
                if !listed {
                    issues.push(format!("{} is not listed by its parent {}", item.id, parent));
                }
            } else if item.id != self.root() {
                issues.push(format!("{} has no parent", item.id));
            }
            for child in &item.children {
                match self.items.get(child) {
                    Some(c) if c.parent == Some(item.id) => {}
                    Some(_) => {
                        issues.push(format!("{} names another parent than {}", child, item.id))
                    }
                    None => issues.push(format!("{} lists missing child {}", item.id, child)),
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::FolderId;
    use crate::model::{BranchRef, Event, EventType, Folder, ParentRef, Scene, World};
    use crate::store::MemoryStore;

    async fn seeded() -> (MemoryStore, World, Folder, Scene) {
        let store = MemoryStore::new();
        let mut world = World::new("Harbor");
        let mut folder = Folder::new(world.id, ParentRef::World(world.id), "Act I");
        let scene = Scene::new(world.id, ParentRef::Folder(folder.id), "Arrival");
        folder.children.push(BranchRef::Scene(scene.id));
        world.children.push(BranchRef::Folder(folder.id));
        store.save_world(world.clone()).await.unwrap();
        store.save_folder(folder.clone()).await.unwrap();
        store.save_scene(scene.clone()).await.unwrap();
        (store, world, folder, scene)
    }

    #[tokio::test]
    async fn test_load_builds_hierarchy() {
        let (store, world, folder, scene) = seeded().await;
        let tree = OutlineTree::load(&store, world.id).await.unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.children(tree.root()), &[ElementRef::Folder(folder.id)]);
        assert_eq!(
            tree.parent(ElementRef::Scene(scene.id)),
            Some(ElementRef::Folder(folder.id))
        );
        assert!(tree.is_descendant(tree.root(), ElementRef::Scene(scene.id)));
        assert!(!tree.is_descendant(ElementRef::Scene(scene.id), tree.root()));
        assert!(tree.containment_issues().is_empty());
    }

    #[tokio::test]
    async fn test_load_drops_missing_children() {
        let (store, mut world, _, _) = seeded().await;
        world.children.push(BranchRef::Scene(crate::id::SceneId::new()));
        store.save_world(world.clone()).await.unwrap();

        let tree = OutlineTree::load(&store, world.id).await.unwrap();
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[tokio::test]
    async fn test_load_adopts_unlisted_items() {
        let (store, world, _, scene) = seeded().await;
        let event = Event::new(world.id, scene.id, EventType::Choice, "Unlisted");
        store.save_event(event.clone()).await.unwrap();
        let lost = Folder::new(world.id, ParentRef::Folder(FolderId::new()), "Lost");
        store.save_folder(lost.clone()).await.unwrap();

        let tree = OutlineTree::load(&store, world.id).await.unwrap();
        assert_eq!(
            tree.children(ElementRef::Scene(scene.id)),
            &[ElementRef::Event(event.id)]
        );
        assert!(!tree.contains(ElementRef::Folder(lost.id)));
        assert!(tree.containment_issues().is_empty());
    }

    #[tokio::test]
    async fn test_views_are_depth_first() {
        let (store, world, folder, scene) = seeded().await;
        let tree = OutlineTree::load(&store, world.id).await.unwrap();
        let views = tree.views(Some(ElementRef::Scene(scene.id)));

        let order: Vec<_> = views.iter().map(|v| v.id).collect();
        assert_eq!(
            order,
            vec![
                ElementRef::World(world.id),
                ElementRef::Folder(folder.id),
                ElementRef::Scene(scene.id)
            ]
        );
        assert!(views[2].selected);
        assert!(views[0].expanded);
    }

    #[tokio::test]
    async fn test_apply_keeps_presentation_flags() {
        let (store, world, mut folder, _) = seeded().await;
        let mut tree = OutlineTree::load(&store, world.id).await.unwrap();
        tree.set_expanded(ElementRef::Folder(folder.id), true);

        folder.title = "Act One".to_string();
        let mut changes = ChangeSet::new();
        changes.save(folder.clone());
        tree.apply(&changes);

        let item = tree.item(ElementRef::Folder(folder.id)).unwrap();
        assert_eq!(item.title, "Act One");
        assert!(item.expanded);
    }
}
