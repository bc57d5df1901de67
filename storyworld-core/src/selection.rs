//! Selection state and the highlight projection derived from it.
//!
//! Selection is presentation state only. [`Highlight`] is recomputed from the
//! current [`SelectionState`] and graph on demand and never persisted.

use crate::graph::SceneGraph;
use crate::id::{ChoiceId, EventId, JumpId, PathId};
use crate::model::{ElementRef, EntityRef, NodeRef, PathHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Graph selection of the open scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    /// Nothing selected.
    #[default]
    None,
    /// Exactly one event, optionally narrowed to one of its choices.
    SingleEvent {
        /// The event.
        event: EventId,
        /// A choice of that event.
        choice: Option<ChoiceId>,
    },
    /// Exactly one jump.
    SingleJump {
        /// The jump.
        jump: JumpId,
    },
    /// Several nodes, or any selection that includes paths.
    Multi {
        /// Selected nodes.
        nodes: BTreeSet<NodeRef>,
        /// Selected paths.
        paths: BTreeSet<PathId>,
    },
}

impl SelectionState {
    /// State for a single selected node.
    pub fn single(node: NodeRef) -> Self {
        match node {
            NodeRef::Event(event) => SelectionState::SingleEvent {
                event,
                choice: None,
            },
            NodeRef::Jump(jump) => SelectionState::SingleJump { jump },
        }
    }

    /// State for an arbitrary graph selection.
    pub fn from_graph(nodes: BTreeSet<NodeRef>, paths: BTreeSet<PathId>) -> Self {
        if paths.is_empty() {
            match nodes.len() {
                0 => return SelectionState::None,
                1 => {
                    if let Some(&node) = nodes.iter().next() {
                        return SelectionState::single(node);
                    }
                }
                _ => {}
            }
        }
        SelectionState::Multi { nodes, paths }
    }

    /// Selected nodes.
    pub fn nodes(&self) -> BTreeSet<NodeRef> {
        match self {
            SelectionState::None => BTreeSet::new(),
            SelectionState::SingleEvent { event, .. } => BTreeSet::from([NodeRef::Event(*event)]),
            SelectionState::SingleJump { jump } => BTreeSet::from([NodeRef::Jump(*jump)]),
            SelectionState::Multi { nodes, .. } => nodes.clone(),
        }
    }

    /// Selected paths.
    pub fn paths(&self) -> BTreeSet<PathId> {
        match self {
            SelectionState::Multi { paths, .. } => paths.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// The selected choice, if narrowed to one.
    pub fn choice(&self) -> Option<ChoiceId> {
        match self {
            SelectionState::SingleEvent { choice, .. } => *choice,
            _ => None,
        }
    }
}

/// Outline and graph selection, kept in step with each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    outline: Option<ElementRef>,
    state: SelectionState,
}

impl Selection {
    /// Nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected outline item.
    pub fn outline(&self) -> Option<ElementRef> {
        self.outline
    }

    /// The graph selection state.
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Select an item in the outline.
    ///
    /// An event or jump of the open graph becomes the single graph selection.
    pub fn select_outline(&mut self, item: ElementRef, graph: Option<&SceneGraph>) {
        self.outline = Some(item);
        self.state = match (item.as_node(), graph) {
            (Some(node), Some(graph)) if graph.contains_node(node) => SelectionState::single(node),
            _ => SelectionState::None,
        };
    }

    /// Select nodes and paths on the canvas.
    ///
    /// A single node becomes the outline selection as well; anything else
    /// clears the outline selection.
    pub fn select_graph(
        &mut self,
        nodes: impl IntoIterator<Item = NodeRef>,
        paths: impl IntoIterator<Item = PathId>,
    ) {
        let state =
            SelectionState::from_graph(nodes.into_iter().collect(), paths.into_iter().collect());
        self.outline = match &state {
            SelectionState::SingleEvent { event, .. } => Some(ElementRef::Event(*event)),
            SelectionState::SingleJump { jump } => Some(ElementRef::Jump(*jump)),
            _ => None,
        };
        self.state = state;
    }

    /// Narrow a single-event selection to one of its choices, or widen it
    /// back with `None`. Returns `false` if `event` is not the sole selection.
    pub fn select_choice(&mut self, event: EventId, choice: Option<ChoiceId>) -> bool {
        match &mut self.state {
            SelectionState::SingleEvent {
                event: selected,
                choice: slot,
            } if *selected == event => {
                *slot = choice;
                true
            }
            _ => false,
        }
    }

    /// Drop the graph selection, keeping the outline selection.
    pub fn clear_graph(&mut self) {
        self.state = SelectionState::None;
    }

    /// Select nothing.
    pub fn clear(&mut self) {
        self.outline = None;
        self.state = SelectionState::None;
    }

    /// Forget selected items that no longer exist.
    ///
    /// `in_outline` checks the outline selection and `in_graph` checks the
    /// nodes, choices and paths of the graph selection.
    pub fn retain(
        &mut self,
        in_outline: impl Fn(ElementRef) -> bool,
        in_graph: impl Fn(EntityRef) -> bool,
    ) {
        if let Some(item) = self.outline {
            if !in_outline(item) {
                self.outline = None;
            }
        }

        self.state = match std::mem::take(&mut self.state) {
            SelectionState::SingleEvent { event, choice } if in_graph(EntityRef::Event(event)) => {
                SelectionState::SingleEvent {
                    event,
                    choice: choice.filter(|&c| in_graph(EntityRef::Choice(c))),
                }
            }
            SelectionState::SingleJump { jump } if in_graph(EntityRef::Jump(jump)) => {
                SelectionState::SingleJump { jump }
            }
            SelectionState::Multi { mut nodes, mut paths } => {
                nodes.retain(|&node| in_graph(EntityRef::from(ElementRef::from(node))));
                paths.retain(|&path| in_graph(EntityRef::Path(path)));
                SelectionState::from_graph(nodes, paths)
            }
            _ => SelectionState::None,
        };
    }
}

/// Which graph elements render as selected or highlighted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Nodes drawn as selected.
    pub selected_nodes: BTreeSet<NodeRef>,
    /// Paths drawn as selected.
    pub selected_paths: BTreeSet<PathId>,
    /// Nodes drawn as highlighted.
    pub highlighted_nodes: BTreeSet<NodeRef>,
    /// Paths drawn as highlighted.
    pub highlighted_paths: BTreeSet<PathId>,
}

impl Highlight {
    /// Project a selection onto a graph.
    ///
    /// With a choice selected only the paths leaving through that choice are
    /// highlighted. Otherwise every path touching a selected node is
    /// highlighted, along with the selected nodes.
    pub fn project(state: &SelectionState, graph: &SceneGraph) -> Self {
        let selected_nodes: BTreeSet<NodeRef> = state
            .nodes()
            .into_iter()
            .filter(|&node| graph.contains_node(node))
            .collect();
        let selected_paths: BTreeSet<PathId> = state
            .paths()
            .into_iter()
            .filter(|&path| graph.path(path).is_some())
            .collect();

        if let Some(choice) = state.choice() {
            let handle = Some(PathHandle::Choice(choice));
            return Self {
                highlighted_paths: graph
                    .paths()
                    .filter(|path| path.handle == handle)
                    .map(|path| path.id)
                    .collect(),
                selected_nodes,
                selected_paths,
                highlighted_nodes: BTreeSet::new(),
            };
        }

        let highlighted_paths = graph
            .paths()
            .filter(|path| selected_nodes.iter().any(|&node| path.touches(node)))
            .map(|path| path.id)
            .collect();

        Self {
            highlighted_nodes: selected_nodes.clone(),
            highlighted_paths,
            selected_nodes,
            selected_paths,
        }
    }

    /// Whether a node is drawn highlighted.
    pub fn is_node_highlighted(&self, node: NodeRef) -> bool {
        self.highlighted_nodes.contains(&node)
    }

    /// Whether a path is drawn highlighted.
    pub fn is_path_highlighted(&self, path: PathId) -> bool {
        self.highlighted_paths.contains(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_PATHS: [PathId; 0] = [];

    #[test]
    fn test_graph_selection_states() {
        let event = EventId::new();
        let jump = JumpId::new();
        let mut selection = Selection::new();

        selection.select_graph([NodeRef::Event(event)], NO_PATHS);
        assert_eq!(
            selection.state(),
            &SelectionState::SingleEvent {
                event,
                choice: None
            }
        );
        assert_eq!(selection.outline(), Some(ElementRef::Event(event)));

        selection.select_graph([NodeRef::Event(event), NodeRef::Jump(jump)], NO_PATHS);
        assert!(matches!(selection.state(), SelectionState::Multi { .. }));
        assert_eq!(selection.outline(), None);

        selection.select_graph([NodeRef::Jump(jump)], NO_PATHS);
        assert_eq!(selection.state(), &SelectionState::SingleJump { jump });

        selection.select_graph([] as [NodeRef; 0], NO_PATHS);
        assert_eq!(selection.state(), &SelectionState::None);
    }

    #[test]
    fn test_choice_substate_needs_single_event() {
        let event = EventId::new();
        let choice = ChoiceId::new();
        let mut selection = Selection::new();

        assert!(!selection.select_choice(event, Some(choice)));

        selection.select_graph([NodeRef::Event(event)], NO_PATHS);
        assert!(selection.select_choice(event, Some(choice)));
        assert_eq!(selection.state().choice(), Some(choice));
        assert!(!selection.select_choice(EventId::new(), None));
    }

    #[test]
    fn test_retain_collapses_multi() {
        let a = EventId::new();
        let b = EventId::new();
        let mut selection = Selection::new();
        selection.select_graph([NodeRef::Event(a), NodeRef::Event(b)], NO_PATHS);

        selection.retain(|_| true, |entity| entity != EntityRef::Event(b));
        assert_eq!(
            selection.state(),
            &SelectionState::SingleEvent {
                event: a,
                choice: None
            }
        );

        selection.retain(|_| false, |_| false);
        assert_eq!(selection.outline(), None);
        assert_eq!(selection.state(), &SelectionState::None);
    }
}
