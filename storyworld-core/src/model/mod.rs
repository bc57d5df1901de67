//! Storyworld data model.
//!
//! ```text
//! World ─┬─ Folder ─┬─ Folder …
//!        │          └─ Scene ─┬─ Event ── Choice*
//!        └─ Scene …           ├─ Jump ──▶ (Scene, Event?)
//!                             └─ Path: Event[handle] ──▶ Event | Jump
//! ```

mod records;
mod refs;

pub use records::{
    Choice, Event, EventKind, EventType, Folder, Jump, JumpTarget, Path, PathHandle, Position,
    Record, Scene, Variable, VariableValue, World,
};
pub use refs::{BranchRef, ElementRef, EntityRef, ItemKind, NodeKind, NodeRef, ParentRef};
