//! Consistency engine for branching storyworlds.
//!
//! This crate provides:
//! - An outline tree (World → Folder/Scene → Event/Jump) with cascading edits
//! - Per-scene flow graphs of events, jumps and paths
//! - Connection validation for drawing paths
//! - Selection state and the highlight projection derived from it
//! - A pluggable async entity store, with an in-memory implementation
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use storyworld_core::{EditorConfig, ItemKind, MemoryStore, StoryEditor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let mut editor = StoryEditor::create(store, "Harbor Town", EditorConfig::new()).await?;
//!
//!     let root = editor.outline().root();
//!     let scene = editor.add_child(root, ItemKind::Scene).await?;
//!     editor.rename(scene, "The Docks").await?;
//!
//!     let event = editor.add_child(scene, ItemKind::Event).await?;
//!     println!("{:#?}", editor.outline_views());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod editor;
pub mod error;
pub mod graph;
pub mod id;
pub mod model;
pub mod outline;
pub mod selection;
pub mod store;
pub mod testing;

// Primary public API
pub use config::EditorConfig;
pub use content::ContentSaver;
pub use editor::StoryEditor;
pub use error::{
    ConfigError, ContractError, EditError, EditResult, FailedWrite, StoreError, StoreResult,
};
pub use graph::{
    is_connection_valid, validate_connection, ConnectionRejection, EdgeView, NodeData, NodeView,
    ProposedConnection, SceneGraph, SourceKind,
};
pub use id::{ChoiceId, EventId, FolderId, InputId, JumpId, PathId, SceneId, VariableId, WorldId};
pub use model::{
    BranchRef, Choice, ElementRef, EntityRef, Event, EventKind, EventType, Folder, ItemKind, Jump,
    JumpTarget, NodeKind, NodeRef, ParentRef, Path, PathHandle, Position, Scene, Variable,
    VariableValue, World,
};
pub use outline::{OutlineItem, OutlineItemView, OutlineTree};
pub use selection::{Highlight, Selection, SelectionState};
pub use store::{ChangeSet, EntityStore, MemoryStore};
