//! Change sets: the writes of one logical edit.

use super::EntityStore;
use crate::error::{FailedWrite, StoreResult};
use crate::model::{EntityRef, Record};
use futures::future::join_all;

/// A single store write.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert or replace a record.
    Save(Record),
    /// Delete a record.
    Remove(EntityRef),
}

impl Write {
    /// The entity this write touches.
    pub fn entity(&self) -> EntityRef {
        match self {
            Write::Save(record) => record.entity_ref(),
            Write::Remove(entity) => *entity,
        }
    }
}

/// The ordered, de-duplicated writes of one logical edit.
///
/// At most one write is kept per entity; a later write replaces an earlier
/// one in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    writes: Vec<Write>,
}

impl ChangeSet {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a save.
    pub fn save(&mut self, record: impl Into<Record>) {
        self.push(Write::Save(record.into()));
    }

    /// Stage a removal.
    pub fn remove(&mut self, entity: EntityRef) {
        self.push(Write::Remove(entity));
    }

    fn push(&mut self, write: Write) {
        let entity = write.entity();
        match self.writes.iter_mut().find(|w| w.entity() == entity) {
            Some(slot) => *slot = write,
            None => self.writes.push(write),
        }
    }

    /// The staged write for an entity.
    pub fn get(&self, entity: EntityRef) -> Option<&Write> {
        self.writes.iter().find(|w| w.entity() == entity)
    }

    /// Whether the entity is staged for removal.
    pub fn is_removed(&self, entity: EntityRef) -> bool {
        matches!(self.get(entity), Some(Write::Remove(_)))
    }

    /// All staged writes in staging order.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Staged saves, in staging order.
    pub fn saved(&self) -> impl Iterator<Item = &Record> {
        self.writes.iter().filter_map(|w| match w {
            Write::Save(record) => Some(record),
            Write::Remove(_) => None,
        })
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Issue every write concurrently and wait for all of them.
    ///
    /// Returns the writes that failed; an empty list means the whole set
    /// persisted. Writes are unordered relative to each other.
    pub async fn commit<S: EntityStore + ?Sized>(&self, store: &S) -> Vec<FailedWrite> {
        let results = join_all(self.writes.iter().map(|write| async move {
            (write.entity(), apply(store, write.clone()).await)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(entity, result)| {
                result
                    .err()
                    .map(|error| FailedWrite { entity, error })
            })
            .collect()
    }
}

async fn apply<S: EntityStore + ?Sized>(store: &S, write: Write) -> StoreResult<()> {
    match write {
        Write::Save(record) => match record {
            Record::World(r) => store.save_world(r).await,
            Record::Folder(r) => store.save_folder(r).await,
            Record::Scene(r) => store.save_scene(r).await,
            Record::Event(r) => store.save_event(r).await,
            Record::Choice(r) => store.save_choice(r).await,
            Record::Jump(r) => store.save_jump(r).await,
            Record::Path(r) => store.save_path(r).await,
            Record::Variable(r) => store.save_variable(r).await,
        },
        Write::Remove(entity) => match entity {
            EntityRef::World(id) => store.remove_world(id).await,
            EntityRef::Folder(id) => store.remove_folder(id).await,
            EntityRef::Scene(id) => store.remove_scene(id).await,
            EntityRef::Event(id) => store.remove_event(id).await,
            EntityRef::Choice(id) => store.remove_choice(id).await,
            EntityRef::Jump(id) => store.remove_jump(id).await,
            EntityRef::Path(id) => store.remove_path(id).await,
            EntityRef::Variable(id) => store.remove_variable(id).await,
        },
    }
}
