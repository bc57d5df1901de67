//! End-to-end editing scenarios against the in-memory store.
//!
//! These tests drive the public editor API and then audit the stored world:
//! - Outline edits and their cascades
//! - Flow-graph connections, choices and conversions
//! - Selection and highlight projection
//! - Partial store failures and debounced content saves

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use storyworld_core::testing::{assert_consistent, consistency_issues, FlakyStore, StoryFixture};
use storyworld_core::{
    BranchRef, ConnectionRejection, ContractError, EditError, EditorConfig, ElementRef, EntityRef,
    EntityStore, EventKind, EventType, InputId, ItemKind, JumpTarget, MemoryStore, NodeRef,
    ParentRef, PathHandle, PathId, Position, ProposedConnection, StoryEditor, VariableValue,
};

fn contract(result: Result<impl std::fmt::Debug, EditError>) -> ContractError {
    match result {
        Err(EditError::Contract(e)) => e,
        other => panic!("expected a contract error, got {other:?}"),
    }
}

// =============================================================================
// OUTLINE SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_connect_through_choice_and_reject_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let c1 = fx.editor.add_choice(e1, None).await.unwrap();
    let e2 = fx.add_event().await.unwrap();

    let path = fx
        .editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Choice(c1)),
            NodeRef::Event(e2),
        )
        .await
        .unwrap();

    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].id, path);
    assert_eq!(paths[0].origin, e1);
    assert_eq!(paths[0].handle, Some(PathHandle::Choice(c1)));
    assert_eq!(paths[0].destination, NodeRef::Event(e2));

    fx.editor.open_scene(fx.scene).await.unwrap();
    let graph = fx.editor.graph().unwrap();
    let again = ProposedConnection::new(
        NodeRef::Event(e1),
        Some(PathHandle::Choice(c1)),
        NodeRef::Event(e2),
    );
    assert!(!graph.can_connect(&again));

    let err = contract(
        fx.editor
            .connect(
                NodeRef::Event(e1),
                Some(PathHandle::Choice(c1)),
                NodeRef::Event(e2),
            )
            .await,
    );
    assert_eq!(
        err,
        ContractError::ConnectionRejected(ConnectionRejection::Duplicate)
    );
    assert_eq!(store.paths_by_scene(fx.scene).await.unwrap().len(), 1);
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_first_choice_replaces_passthrough_and_clears_ending() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();

    let passthrough = fx
        .editor
        .connect(NodeRef::Event(e1), None, NodeRef::Event(e2))
        .await
        .unwrap();

    // An ending that still carries a passthrough edge, as older worlds may.
    let mut event = store.get_event(e1).await.unwrap().unwrap();
    event.ending = true;
    store.save_event(event).await.unwrap();
    fx.editor.resync().await.unwrap();

    let c1 = fx.editor.add_choice(e1, None).await.unwrap();
    assert!(store.get_path(passthrough).await.unwrap().is_none());

    fx.editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Choice(c1)),
            NodeRef::Event(e2),
        )
        .await
        .unwrap();

    let event = store.get_event(e1).await.unwrap().unwrap();
    assert!(!event.ending);
    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths.iter().all(|p| !p.is_passthrough()));
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_move_scene_out_of_folder_to_world() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let world = fx.editor.world_id();
    let root = fx.editor.outline().root();

    fx.editor
        .move_item(
            ElementRef::Scene(fx.scene),
            ElementRef::Folder(fx.folder),
            root,
            1,
        )
        .await
        .unwrap();

    let stored_world = store.get_world(world).await.unwrap().unwrap();
    assert_eq!(
        stored_world.children,
        vec![BranchRef::Folder(fx.folder), BranchRef::Scene(fx.scene)]
    );
    let folder = store.get_folder(fx.folder).await.unwrap().unwrap();
    assert!(folder.children.is_empty());
    let scene = store.get_scene(fx.scene).await.unwrap().unwrap();
    assert_eq!(scene.parent, ParentRef::World(world));

    assert_eq!(
        fx.editor.outline().parent(ElementRef::Scene(fx.scene)),
        Some(root)
    );
    assert!(fx.editor.outline().containment_issues().is_empty());
    assert_consistent(store.as_ref(), world).await;
}

#[tokio::test]
async fn test_remove_folder_cascades_to_contents_and_jumps() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let j1 = fx.add_jump().await.unwrap();
    fx.editor
        .set_jump_target(j1, JumpTarget::event(fx.scene, e1))
        .await
        .unwrap();

    // A jump in another scene aimed at the doomed one.
    let root = fx.editor.outline().root();
    let other = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let ElementRef::Scene(other_scene) = other else {
        panic!("expected a scene");
    };
    let j2 = match fx.editor.add_child(other, ItemKind::Jump).await.unwrap() {
        ElementRef::Jump(id) => id,
        item => panic!("expected a jump, got {item:?}"),
    };
    fx.editor
        .set_jump_target(j2, JumpTarget::scene(fx.scene))
        .await
        .unwrap();

    fx.editor
        .remove(ElementRef::Folder(fx.folder))
        .await
        .unwrap();

    assert!(store.get_folder(fx.folder).await.unwrap().is_none());
    assert!(store.get_scene(fx.scene).await.unwrap().is_none());
    assert!(store.get_event(e1).await.unwrap().is_none());
    assert!(store.get_jump(j1).await.unwrap().is_none());
    assert!(store.get_jump(j2).await.unwrap().is_none());

    let other = store.get_scene(other_scene).await.unwrap().unwrap();
    assert!(other.children.is_empty());
    assert!(!fx.editor.outline().contains(ElementRef::Jump(j2)));
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_remove_scene_clears_paths_and_choices() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    let c1 = fx.editor.add_choice(e1, None).await.unwrap();
    fx.editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Choice(c1)),
            NodeRef::Event(e2),
        )
        .await
        .unwrap();
    fx.editor.open_scene(fx.scene).await.unwrap();

    fx.editor
        .remove(ElementRef::Scene(fx.scene))
        .await
        .unwrap();

    assert!(store.paths_by_scene(fx.scene).await.unwrap().is_empty());
    assert!(store.events_by_scene(fx.scene).await.unwrap().is_empty());
    assert!(store.get_choice(c1).await.unwrap().is_none());
    assert!(fx.editor.graph().is_none());
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_move_event_across_scenes_rehomes_it() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let scene_a = fx.scene;
    let e = fx.add_event().await.unwrap();
    let neighbour = fx.add_event().await.unwrap();
    fx.editor
        .connect(NodeRef::Event(neighbour), None, NodeRef::Event(e))
        .await
        .unwrap();
    fx.editor
        .connect(NodeRef::Event(e), None, NodeRef::Event(neighbour))
        .await
        .unwrap();

    let root = fx.editor.outline().root();
    let b = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let ElementRef::Scene(scene_b) = b else {
        panic!("expected a scene");
    };
    let c = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let jump = match fx.editor.add_child(c, ItemKind::Jump).await.unwrap() {
        ElementRef::Jump(id) => id,
        item => panic!("expected a jump, got {item:?}"),
    };
    fx.editor
        .set_jump_target(jump, JumpTarget::event(scene_a, e))
        .await
        .unwrap();

    fx.editor
        .move_item(ElementRef::Event(e), ElementRef::Scene(scene_a), b, 0)
        .await
        .unwrap();

    assert!(store.paths_by_scene(scene_a).await.unwrap().is_empty());
    let moved = store.get_event(e).await.unwrap().unwrap();
    assert_eq!(moved.scene_id, scene_b);
    let stored_jump = store.get_jump(jump).await.unwrap().unwrap();
    assert_eq!(stored_jump.target, JumpTarget::scene(scene_a));
    assert_eq!(
        fx.editor.outline().children(b),
        &[ElementRef::Event(e)][..]
    );
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_move_jump_across_scenes_rehomes_it() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let scene_a = ElementRef::Scene(fx.scene);
    let e1 = fx.add_event().await.unwrap();
    let jump = fx.add_jump().await.unwrap();
    fx.editor
        .connect(NodeRef::Event(e1), None, NodeRef::Jump(jump))
        .await
        .unwrap();

    let root = fx.editor.outline().root();
    let b = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let ElementRef::Scene(scene_b) = b else {
        panic!("expected a scene");
    };
    fx.editor
        .move_item(ElementRef::Jump(jump), scene_a, b, 0)
        .await
        .unwrap();

    let moved = store.get_jump(jump).await.unwrap().unwrap();
    assert_eq!(moved.scene_id, scene_b);
    assert!(store.paths_by_scene(fx.scene).await.unwrap().is_empty());
    let old = store.get_scene(fx.scene).await.unwrap().unwrap();
    assert_eq!(old.children, vec![NodeRef::Event(e1)]);
    let new = store.get_scene(scene_b).await.unwrap().unwrap();
    assert_eq!(new.children, vec![NodeRef::Jump(jump)]);
    assert_eq!(fx.editor.outline().parent(ElementRef::Jump(jump)), Some(b));
    assert!(fx.editor.outline().containment_issues().is_empty());
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_reorder_within_parent() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let a = fx.add_event().await.unwrap();
    let b = fx.add_event().await.unwrap();
    let c = fx.add_jump().await.unwrap();
    let scene = ElementRef::Scene(fx.scene);

    fx.editor
        .move_item(ElementRef::Jump(c), scene, scene, 0)
        .await
        .unwrap();

    let stored = store.get_scene(fx.scene).await.unwrap().unwrap();
    assert_eq!(
        stored.children,
        vec![NodeRef::Jump(c), NodeRef::Event(a), NodeRef::Event(b)]
    );

    let err = contract(
        fx.editor
            .move_item(ElementRef::Event(a), scene, scene, 3)
            .await,
    );
    assert_eq!(err, ContractError::IndexOutOfRange { index: 3, len: 2 });
}

#[tokio::test]
async fn test_illegal_moves_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let root = fx.editor.outline().root();
    let folder = ElementRef::Folder(fx.folder);
    let inner = fx.editor.add_child(folder, ItemKind::Folder).await.unwrap();
    let event = fx.add_event().await.unwrap();

    let err = contract(fx.editor.move_item(folder, root, inner, 0).await);
    assert_eq!(
        err,
        ContractError::MoveIntoDescendant {
            item: folder,
            target: inner
        }
    );

    let err = contract(
        fx.editor
            .move_item(ElementRef::Event(event), ElementRef::Scene(fx.scene), folder, 0)
            .await,
    );
    assert_eq!(
        err,
        ContractError::IllegalChild {
            parent: ItemKind::Folder,
            child: ItemKind::Event
        }
    );

    let err = contract(
        fx.editor
            .move_item(ElementRef::Scene(fx.scene), root, root, 0)
            .await,
    );
    assert_eq!(
        err,
        ContractError::ParentMismatch {
            item: ElementRef::Scene(fx.scene),
            expected: root
        }
    );

    assert_eq!(contract(fx.editor.remove(root).await), ContractError::RootItem);
    assert_eq!(
        contract(fx.editor.add_child(folder, ItemKind::Event).await),
        ContractError::IllegalChild {
            parent: ItemKind::Folder,
            child: ItemKind::Event
        }
    );
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_add_child_awaits_title() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let event = fx.add_event().await.unwrap();
    let item = ElementRef::Event(event);

    let outline = fx.editor.outline();
    assert!(outline.item(item).unwrap().renaming);
    assert!(outline.item(ElementRef::Scene(fx.scene)).unwrap().expanded);

    fx.editor.rename(item, "Arrival").await.unwrap();
    let outline = fx.editor.outline();
    assert!(!outline.item(item).unwrap().renaming);
    assert_eq!(outline.item(item).unwrap().title, "Arrival");
    assert_eq!(store.get_event(event).await.unwrap().unwrap().title, "Arrival");
}

// =============================================================================
// FLOW GRAPH
// =============================================================================

#[tokio::test]
async fn test_connect_across_scenes_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let root = fx.editor.outline().root();
    let other = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let far = match fx.editor.add_child(other, ItemKind::Event).await.unwrap() {
        ElementRef::Event(id) => id,
        item => panic!("expected an event, got {item:?}"),
    };

    let err = contract(
        fx.editor
            .connect(NodeRef::Event(e1), None, NodeRef::Event(far))
            .await,
    );
    assert_eq!(
        err,
        ContractError::NotInScene {
            node: NodeRef::Event(far),
            scene: fx.scene
        }
    );
}

#[tokio::test]
async fn test_jumps_cannot_be_sources() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let j1 = fx.add_jump().await.unwrap();

    let err = contract(
        fx.editor
            .connect(NodeRef::Jump(j1), None, NodeRef::Jump(j1))
            .await,
    );
    assert_eq!(
        err,
        ContractError::ConnectionRejected(ConnectionRejection::JumpSelfLoop)
    );
    let err = contract(
        fx.editor
            .connect(NodeRef::Jump(j1), None, NodeRef::Event(e1))
            .await,
    );
    assert_eq!(
        err,
        ContractError::ConnectionRejected(ConnectionRejection::JumpHasNoOutgoing)
    );

    // Events may still lead into a jump.
    fx.editor
        .connect(NodeRef::Event(e1), None, NodeRef::Jump(j1))
        .await
        .unwrap();
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_input_event_connects_only_through_its_handle() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    fx.editor
        .switch_event_type(e1, EventType::Input)
        .await
        .unwrap();
    let input = store.get_event(e1).await.unwrap().unwrap().input_handle().unwrap();

    for handle in [None, Some(PathHandle::Input(InputId::new()))] {
        let err = contract(
            fx.editor
                .connect(NodeRef::Event(e1), handle, NodeRef::Event(e2))
                .await,
        );
        assert_eq!(
            err,
            ContractError::ConnectionRejected(ConnectionRejection::InputHandleMismatch)
        );
    }
    assert!(store.paths_by_scene(fx.scene).await.unwrap().is_empty());

    fx.editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Input(input)),
            NodeRef::Event(e2),
        )
        .await
        .unwrap();
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_removing_last_choice_allows_passthrough_again() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    let c1 = fx.editor.add_choice(e1, None).await.unwrap();

    let err = contract(
        fx.editor
            .connect(NodeRef::Event(e1), None, NodeRef::Event(e2))
            .await,
    );
    assert_eq!(
        err,
        ContractError::ConnectionRejected(ConnectionRejection::PassthroughNotAllowed)
    );

    fx.editor.remove_choice(e1, c1).await.unwrap();
    let path = fx
        .editor
        .connect(NodeRef::Event(e1), None, NodeRef::Event(e2))
        .await
        .unwrap();

    let stored = store.get_path(path).await.unwrap().unwrap();
    assert!(stored.is_passthrough());
    assert!(store.get_event(e1).await.unwrap().unwrap().choices().is_empty());
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_reposition_updates_graph_and_store() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let j1 = fx.add_jump().await.unwrap();
    fx.editor.open_scene(fx.scene).await.unwrap();

    let spot = Position::new(320.0, -40.0);
    fx.editor.reposition(NodeRef::Jump(j1), spot).await.unwrap();

    assert_eq!(store.get_jump(j1).await.unwrap().unwrap().position, spot);
    let graph = fx.editor.graph().unwrap();
    assert_eq!(graph.position(NodeRef::Jump(j1)), Some(spot));
    let view = graph
        .node_views()
        .into_iter()
        .find(|node| node.id == NodeRef::Jump(j1))
        .unwrap();
    assert_eq!(view.position, spot);
    assert_ne!(graph.position(NodeRef::Event(e1)), Some(spot));
}

#[tokio::test]
async fn test_choice_order_and_removal() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    let c1 = fx.editor.add_choice(e1, Some("Left".into())).await.unwrap();
    let c2 = fx.editor.add_choice(e1, Some("Right".into())).await.unwrap();
    let c3 = fx.editor.add_choice(e1, None).await.unwrap();

    fx.editor.reorder_choice(e1, c3, 0).await.unwrap();
    let event = store.get_event(e1).await.unwrap().unwrap();
    assert_eq!(event.choices(), &[c3, c1, c2][..]);
    assert_eq!(store.get_choice(c3).await.unwrap().unwrap().title, "Choice");

    let err = contract(fx.editor.reorder_choice(e1, c1, 3).await);
    assert_eq!(err, ContractError::IndexOutOfRange { index: 3, len: 3 });

    fx.editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Choice(c2)),
            NodeRef::Event(e2),
        )
        .await
        .unwrap();
    fx.editor.remove_choice(e1, c2).await.unwrap();

    let event = store.get_event(e1).await.unwrap().unwrap();
    assert_eq!(event.choices(), &[c3, c1][..]);
    assert!(store.paths_by_scene(fx.scene).await.unwrap().is_empty());
    assert!(store.get_choice(c2).await.unwrap().is_none());
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_switch_to_input_retags_and_dedupes_paths() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    let e3 = fx.add_event().await.unwrap();
    let c1 = fx.editor.add_choice(e1, None).await.unwrap();
    let c2 = fx.editor.add_choice(e1, None).await.unwrap();
    for (choice, target) in [(c1, e2), (c2, e2), (c1, e3)] {
        fx.editor
            .connect(
                NodeRef::Event(e1),
                Some(PathHandle::Choice(choice)),
                NodeRef::Event(target),
            )
            .await
            .unwrap();
    }

    fx.editor
        .switch_event_type(e1, EventType::Input)
        .await
        .unwrap();

    let event = store.get_event(e1).await.unwrap().unwrap();
    let input = event.input_handle().unwrap();
    assert!(matches!(event.kind, EventKind::Input { variable: None, .. }));
    assert!(store.choices_by_event(e1).await.unwrap().is_empty());

    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths
        .iter()
        .all(|p| p.handle == Some(PathHandle::Input(input)) && p.origin_type == EventType::Input));
    let mut targets: Vec<NodeRef> = paths.iter().map(|p| p.destination).collect();
    targets.sort();
    let mut expected = vec![NodeRef::Event(e2), NodeRef::Event(e3)];
    expected.sort();
    assert_eq!(targets, expected);

    fx.editor
        .switch_event_type(e1, EventType::Choice)
        .await
        .unwrap();
    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.is_passthrough()));
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_convert_event_to_jump_and_back() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e0 = fx.add_event().await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    fx.editor
        .connect(NodeRef::Event(e0), None, NodeRef::Event(e1))
        .await
        .unwrap();
    fx.editor
        .connect(NodeRef::Event(e1), None, NodeRef::Event(e2))
        .await
        .unwrap();
    fx.editor.open_scene(fx.scene).await.unwrap();
    fx.editor.select(ElementRef::Event(e1)).unwrap();

    let jump = fx.editor.convert_to_jump(e1).await.unwrap();

    assert!(store.get_event(e1).await.unwrap().is_none());
    let scene = store.get_scene(fx.scene).await.unwrap().unwrap();
    assert_eq!(
        scene.children,
        vec![NodeRef::Event(e0), NodeRef::Jump(jump), NodeRef::Event(e2)]
    );
    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].origin, e0);
    assert_eq!(paths[0].destination, NodeRef::Jump(jump));
    assert_eq!(fx.editor.selection().outline(), Some(ElementRef::Jump(jump)));
    assert!(fx.editor.graph().unwrap().contains_node(NodeRef::Jump(jump)));
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;

    let event = fx
        .editor
        .convert_from_jump(jump, EventType::Input)
        .await
        .unwrap();
    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].destination, NodeRef::Event(event));
    assert_eq!(
        store.get_event(event).await.unwrap().unwrap().event_type(),
        EventType::Input
    );
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_convert_to_jump_prunes_jumps_aimed_at_event() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let aimed = fx.add_jump().await.unwrap();
    let by_scene = fx.add_jump().await.unwrap();
    fx.editor
        .set_jump_target(aimed, JumpTarget::event(fx.scene, e1))
        .await
        .unwrap();
    fx.editor
        .set_jump_target(by_scene, JumpTarget::scene(fx.scene))
        .await
        .unwrap();

    let jump = fx.editor.convert_to_jump(e1).await.unwrap();

    assert!(store.get_jump(aimed).await.unwrap().is_none());
    assert!(!fx.editor.outline().contains(ElementRef::Jump(aimed)));
    let kept = store.get_jump(by_scene).await.unwrap().unwrap();
    assert_eq!(kept.target, JumpTarget::scene(fx.scene));
    let scene = store.get_scene(fx.scene).await.unwrap().unwrap();
    assert_eq!(
        scene.children,
        vec![NodeRef::Jump(jump), NodeRef::Jump(by_scene)]
    );
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_set_ending_drops_outgoing_paths() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    fx.editor
        .connect(NodeRef::Event(e1), None, NodeRef::Event(e2))
        .await
        .unwrap();
    fx.editor
        .connect(NodeRef::Event(e2), None, NodeRef::Event(e1))
        .await
        .unwrap();

    fx.editor.set_ending(e1, true).await.unwrap();

    let paths = store.paths_by_scene(fx.scene).await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].origin, e2);
    assert!(store.get_event(e1).await.unwrap().unwrap().ending);
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_invalid_jump_targets() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let jump = fx.add_jump().await.unwrap();
    let root = fx.editor.outline().root();
    let other = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let ElementRef::Scene(other) = other else {
        panic!("expected a scene");
    };
    let event = fx.add_event().await.unwrap();

    let err = contract(
        fx.editor
            .set_jump_target(jump, JumpTarget::event(other, event))
            .await,
    );
    assert!(matches!(err, ContractError::InvalidJumpTarget { .. }));

    fx.editor
        .set_jump_target(jump, JumpTarget::event(fx.scene, event))
        .await
        .unwrap();
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;
}

#[tokio::test]
async fn test_input_variable_binding() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let variable = fx
        .editor
        .create_variable("courage", VariableValue::Number(3.0))
        .await
        .unwrap();

    let err = contract(fx.editor.set_input_variable(e1, Some(variable)).await);
    assert_eq!(
        err,
        ContractError::WrongEventType {
            event: e1,
            expected: EventType::Input
        }
    );

    fx.editor
        .switch_event_type(e1, EventType::Input)
        .await
        .unwrap();
    fx.editor
        .set_input_variable(e1, Some(variable))
        .await
        .unwrap();
    fx.editor.remove_variable(variable).await.unwrap();

    let event = store.get_event(e1).await.unwrap().unwrap();
    assert!(matches!(event.kind, EventKind::Input { variable: None, .. }));
    assert!(fx.editor.variables().await.unwrap().is_empty());
}

// =============================================================================
// SELECTION
// =============================================================================

#[tokio::test]
async fn test_highlight_follows_selection() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let e2 = fx.add_event().await.unwrap();
    let e3 = fx.add_event().await.unwrap();
    let c1 = fx.editor.add_choice(e1, None).await.unwrap();
    let c2 = fx.editor.add_choice(e1, None).await.unwrap();
    let p1 = fx
        .editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Choice(c1)),
            NodeRef::Event(e2),
        )
        .await
        .unwrap();
    let p2 = fx
        .editor
        .connect(
            NodeRef::Event(e1),
            Some(PathHandle::Choice(c2)),
            NodeRef::Event(e3),
        )
        .await
        .unwrap();

    fx.editor.open_scene(fx.scene).await.unwrap();
    fx.editor.select(ElementRef::Event(e1)).unwrap();
    let highlight = fx.editor.highlight();
    assert!(highlight.is_node_highlighted(NodeRef::Event(e1)));
    assert!(highlight.is_path_highlighted(p1));
    assert!(highlight.is_path_highlighted(p2));

    assert!(fx.editor.select_choice(e1, Some(c1)).unwrap());
    let highlight = fx.editor.highlight();
    assert!(highlight.is_path_highlighted(p1));
    assert!(!highlight.is_path_highlighted(p2));

    let err = contract(fx.editor.select_choice(e2, Some(c1)));
    assert_eq!(
        err,
        ContractError::ChoiceNotOnEvent {
            event: e2,
            choice: c1
        }
    );

    fx.editor
        .select_nodes([NodeRef::Event(e2), NodeRef::Event(e3)], Vec::<PathId>::new())
        .unwrap();
    assert_eq!(fx.editor.selection().outline(), None);
    let highlight = fx.editor.highlight();
    assert!(highlight.is_path_highlighted(p1));
    assert!(highlight.is_path_highlighted(p2));
    assert!(!highlight.is_node_highlighted(NodeRef::Event(e1)));

    fx.editor.select(ElementRef::Event(e1)).unwrap();
    fx.editor.remove(ElementRef::Event(e1)).await.unwrap();
    assert_eq!(fx.editor.selection().outline(), None);
    assert!(fx.editor.highlight().highlighted_paths.is_empty());
}

// =============================================================================
// STORE FAILURES
// =============================================================================

#[tokio::test]
async fn test_partial_write_is_reported_and_projections_resync() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let scene = ElementRef::Scene(fx.scene);
    store.fail_writes_to(EntityRef::Scene(fx.scene));

    let err = fx
        .editor
        .add_child(scene, ItemKind::Event)
        .await
        .unwrap_err();
    match &err {
        EditError::PartialWrite { operation, failed } => {
            assert_eq!(*operation, "add_child");
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].entity, EntityRef::Scene(fx.scene));
        }
        other => panic!("expected a partial write, got {other:?}"),
    }
    assert_eq!(err.failed_writes().len(), 1);

    // The projection mirrors the stored records, including the event its
    // scene failed to list.
    let stored: Vec<ElementRef> = store
        .events_by_scene(fx.scene)
        .await
        .unwrap()
        .into_iter()
        .map(|event| ElementRef::Event(event.id))
        .collect();
    assert_eq!(fx.editor.outline().children(scene), stored.as_slice());
    assert!(fx.editor.outline().containment_issues().is_empty());

    store.heal();
    let event = fx.add_event().await.unwrap();
    assert!(fx
        .editor
        .outline()
        .children(scene)
        .contains(&ElementRef::Event(event)));
}

#[tokio::test]
async fn test_item_missing_from_stored_child_list_can_be_moved() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let scene = ElementRef::Scene(fx.scene);
    store.fail_writes_to(EntityRef::Scene(fx.scene));

    // The event record lands but the scene never lists it.
    let result = fx.editor.add_child(scene, ItemKind::Event).await;
    assert!(matches!(result, Err(EditError::PartialWrite { .. })));
    store.heal();
    let events = store.events_by_scene(fx.scene).await.unwrap();
    assert_eq!(events.len(), 1);
    let orphan = ElementRef::Event(events[0].id);
    assert!(store.get_scene(fx.scene).await.unwrap().unwrap().children.is_empty());

    assert_eq!(fx.editor.outline().children(scene), &[orphan][..]);
    assert!(fx.editor.outline().containment_issues().is_empty());

    fx.editor.move_item(orphan, scene, scene, 0).await.unwrap();
    let stored = store.get_scene(fx.scene).await.unwrap().unwrap();
    assert_eq!(stored.children, vec![NodeRef::Event(events[0].id)]);
    assert_consistent(store.as_ref(), fx.editor.world_id()).await;

    let err = contract(fx.editor.move_item(orphan, scene, scene, 1).await);
    assert_eq!(err, ContractError::IndexOutOfRange { index: 1, len: 0 });
}

#[tokio::test]
async fn test_failed_rename_keeps_stored_title() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    store.fail_all_writes(true);
    let before = store.write_count();

    let result = fx.editor.rename(ElementRef::Folder(fx.folder), "Act I").await;
    assert!(matches!(result, Err(EditError::PartialWrite { .. })));
    assert_eq!(store.write_count(), before + 1);
    assert_eq!(
        fx.editor
            .outline()
            .item(ElementRef::Folder(fx.folder))
            .unwrap()
            .title,
        store.get_folder(fx.folder).await.unwrap().unwrap().title
    );
}

// =============================================================================
// CONTENT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_content_edits_are_debounced() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let config = EditorConfig::new().with_content_debounce(Duration::from_millis(500));
    let mut editor = StoryEditor::create(Arc::clone(&store), "Debounce", config)
        .await
        .unwrap();
    let root = editor.outline().root();
    let scene = editor.add_child(root, ItemKind::Scene).await.unwrap();
    let event = match editor.add_child(scene, ItemKind::Event).await.unwrap() {
        ElementRef::Event(id) => id,
        item => panic!("expected an event, got {item:?}"),
    };

    let saver = editor.content_saver();
    let before = store.write_count();
    saver.save(event, json!({"text": "It"})).unwrap();
    saver.save(event, json!({"text": "It was"})).unwrap();
    saver.save(event, json!({"text": "It was dark"})).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.write_count(), before);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.write_count(), before + 1);
    let stored = store.get_event(event).await.unwrap().unwrap();
    assert_eq!(stored.content, Some(json!({"text": "It was dark"})));

    assert!(saver.close().await.is_empty());
}

#[tokio::test]
async fn test_structural_edits_keep_saved_content() {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let e1 = fx.add_event().await.unwrap();
    let saver = fx.editor.content_saver();
    saver.save(e1, json!({"text": "The tide turns"})).unwrap();
    assert!(saver.flush().await.is_empty());

    fx.editor.rename(ElementRef::Event(e1), "Low Tide").await.unwrap();
    fx.editor.set_ending(e1, true).await.unwrap();
    fx.editor
        .switch_event_type(e1, EventType::Input)
        .await
        .unwrap();

    let stored = store.get_event(e1).await.unwrap().unwrap();
    assert_eq!(stored.title, "Low Tide");
    assert!(stored.ending);
    assert_eq!(stored.content, Some(json!({"text": "The tide turns"})));
    assert!(saver.close().await.is_empty());
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[derive(Debug, Clone)]
enum Step {
    AddEvent,
    AddJump,
    AddChoice(usize),
    Connect(usize, usize, usize),
    RemoveNode(usize),
    SetEnding(usize, bool),
    SwitchType(usize),
    MoveNode(usize, usize),
    RemoveChoice(usize, usize),
    ReorderChoice(usize, usize, usize),
    Rename(usize),
    ConvertToJump(usize),
    ConvertFromJump(usize, bool),
    SetJumpTarget(usize, usize, usize),
}

fn structure_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::AddEvent),
        1 => Just(Step::AddJump),
        2 => any::<usize>().prop_map(Step::AddChoice),
        4 => (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(a, b, c)| Step::Connect(a, b, c)),
        1 => any::<usize>().prop_map(Step::RemoveNode),
        1 => (any::<usize>(), any::<bool>()).prop_map(|(a, b)| Step::SetEnding(a, b)),
        1 => any::<usize>().prop_map(Step::SwitchType),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::MoveNode(a, b)),
    ]
}

fn detail_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::RemoveChoice(a, b)),
        1 => (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(a, b, c)| Step::ReorderChoice(a, b, c)),
        1 => any::<usize>().prop_map(Step::Rename),
        2 => any::<usize>().prop_map(Step::ConvertToJump),
        2 => (any::<usize>(), any::<bool>()).prop_map(|(a, b)| Step::ConvertFromJump(a, b)),
        2 => (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(a, b, c)| Step::SetJumpTarget(a, b, c)),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => structure_step(),
        2 => detail_step(),
    ]
}

async fn run_steps(steps: Vec<Step>) -> Vec<String> {
    let store = Arc::new(MemoryStore::new());
    let mut fx = StoryFixture::build(Arc::clone(&store)).await.unwrap();
    let root = fx.editor.outline().root();
    let second = fx.editor.add_child(root, ItemKind::Scene).await.unwrap();
    let scenes = [ElementRef::Scene(fx.scene), second];

    for step in steps {
        let nodes: Vec<NodeRef> = scenes
            .iter()
            .flat_map(|&s| fx.editor.outline().children(s).to_vec())
            .filter_map(|item| item.as_node())
            .collect();
        let pick = |i: usize| nodes.get(i % nodes.len().max(1)).copied();
        let event_at = |i: usize| match pick(i) {
            Some(NodeRef::Event(id)) => Some(id),
            _ => None,
        };

        // Contract errors are expected; only the stored state matters.
        match step {
            Step::AddEvent => {
                let _ = fx.add_event().await;
            }
            Step::AddJump => {
                let _ = fx.add_jump().await;
            }
            Step::AddChoice(i) => {
                if let Some(event) = event_at(i) {
                    let _ = fx.editor.add_choice(event, None).await;
                }
            }
            Step::Connect(a, b, h) => {
                if let (Some(source), Some(target)) = (pick(a), pick(b)) {
                    let handle = match source {
                        NodeRef::Event(id) => {
                            let event = store.get_event(id).await.unwrap().unwrap();
                            let choices = event.choices();
                            if choices.is_empty() {
                                event.input_handle().map(PathHandle::Input)
                            } else {
                                Some(PathHandle::Choice(choices[h % choices.len()]))
                            }
                        }
                        NodeRef::Jump(_) => None,
                    };
                    let _ = fx.editor.connect(source, handle, target).await;
                }
            }
            Step::RemoveNode(i) => {
                if let Some(node) = pick(i) {
                    let _ = fx.editor.remove(ElementRef::from(node)).await;
                }
            }
            Step::SetEnding(i, ending) => {
                if let Some(event) = event_at(i) {
                    let _ = fx.editor.set_ending(event, ending).await;
                }
            }
            Step::SwitchType(i) => {
                if let Some(event) = event_at(i) {
                    let to = match store.get_event(event).await.unwrap().unwrap().event_type() {
                        EventType::Choice => EventType::Input,
                        EventType::Input => EventType::Choice,
                    };
                    let _ = fx.editor.switch_event_type(event, to).await;
                }
            }
            Step::MoveNode(i, s) => {
                if let Some(node) = pick(i) {
                    let item = ElementRef::from(node);
                    if let Some(from) = fx.editor.outline().parent(item) {
                        let to = scenes[s % scenes.len()];
                        let _ = fx.editor.move_item(item, from, to, 0).await;
                    }
                }
            }
            Step::RemoveChoice(i, c) => {
                if let Some(event) = event_at(i) {
                    let record = store.get_event(event).await.unwrap().unwrap();
                    let choices = record.choices();
                    if !choices.is_empty() {
                        let choice = choices[c % choices.len()];
                        let _ = fx.editor.remove_choice(event, choice).await;
                    }
                }
            }
            Step::ReorderChoice(i, c, to) => {
                if let Some(event) = event_at(i) {
                    let record = store.get_event(event).await.unwrap().unwrap();
                    let choices = record.choices();
                    if !choices.is_empty() {
                        let choice = choices[c % choices.len()];
                        let index = to % choices.len();
                        let _ = fx.editor.reorder_choice(event, choice, index).await;
                    }
                }
            }
            Step::Rename(i) => {
                if let Some(node) = pick(i) {
                    let _ = fx.editor.rename(ElementRef::from(node), format!("Node {i}")).await;
                }
            }
            Step::ConvertToJump(i) => {
                if let Some(event) = event_at(i) {
                    let _ = fx.editor.convert_to_jump(event).await;
                }
            }
            Step::ConvertFromJump(i, input) => {
                if let Some(NodeRef::Jump(jump)) = pick(i) {
                    let to = if input {
                        EventType::Input
                    } else {
                        EventType::Choice
                    };
                    let _ = fx.editor.convert_from_jump(jump, to).await;
                }
            }
            Step::SetJumpTarget(i, s, e) => {
                let ElementRef::Scene(scene) = scenes[s % scenes.len()] else {
                    continue;
                };
                if let Some(NodeRef::Jump(jump)) = pick(i) {
                    let target = match event_at(e) {
                        Some(event) if e % 2 == 0 => JumpTarget::event(scene, event),
                        _ => JumpTarget::scene(scene),
                    };
                    let _ = fx.editor.set_jump_target(jump, target).await;
                }
            }
        }
    }

    let mut issues = consistency_issues(store.as_ref(), fx.editor.world_id())
        .await
        .unwrap();
    issues.extend(fx.editor.outline().containment_issues());
    issues
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_random_edits_keep_world_consistent(steps in prop::collection::vec(step(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let issues = runtime.block_on(run_steps(steps));
        prop_assert!(issues.is_empty(), "inconsistencies: {:?}", issues);
    }
}
