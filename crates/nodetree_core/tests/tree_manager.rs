use nodetree_core::{
    generate_node_id, MemoryKeyValueStore, NodeHandle, TreeManager, TreeState, DEFAULT_ROOT_NAME,
    TREE_STORE_KEY,
};

fn setup() -> TreeManager {
    TreeManager::open_blocking(MemoryKeyValueStore::new()).unwrap()
}

fn child_names(state: &TreeState) -> Vec<String> {
    state
        .current_children()
        .into_iter()
        .map(|(_, node)| node.name().to_string())
        .collect()
}

fn children_of(state: &TreeState, handle: NodeHandle) -> Vec<String> {
    state
        .tree()
        .get(handle)
        .unwrap()
        .children()
        .iter()
        .map(|child| state.tree().get(*child).unwrap().name().to_string())
        .collect()
}

#[test]
fn fresh_store_starts_at_hashed_root() {
    let manager = setup();
    let state = manager.state();
    let root = state.current().unwrap();

    assert!(manager.is_loaded());
    assert_eq!(root.name(), DEFAULT_ROOT_NAME);
    assert_eq!(root.id(), generate_node_id("Root"));
    assert_eq!(state.root_node(), Some(state.current_node()));
    assert!(child_names(&state).is_empty());
}

#[test]
fn add_navigate_and_remove_walkthrough() {
    let manager = setup();
    let root = manager.state().current_node();

    let docs = manager.add_node("Docs").unwrap();
    assert_eq!(child_names(&manager.state()), vec!["Docs"]);

    assert!(manager.navigate_to(docs));
    assert_eq!(manager.state().current().unwrap().name(), "Docs");

    manager.add_node("Notes").unwrap();
    assert_eq!(children_of(&manager.state(), docs), vec!["Notes"]);

    assert!(manager.navigate_up());
    assert_eq!(manager.state().current().unwrap().name(), "Root");
    assert_eq!(manager.state().current_node(), root);

    assert!(manager.remove_node(docs));
    let state = manager.state();
    assert!(child_names(&state).is_empty());
    assert_eq!(state.tree().len(), 1);
}

#[test]
fn children_keep_insertion_order() {
    let manager = setup();
    for name in ["Gamma", "Alpha", "Beta", "Alpha"] {
        manager.add_node(name).unwrap();
    }
    assert_eq!(
        child_names(&manager.state()),
        vec!["Gamma", "Alpha", "Beta", "Alpha"]
    );
}

#[test]
fn removing_displayed_node_moves_view_to_parent() {
    let manager = setup();
    let docs = manager.add_node("Docs").unwrap();
    manager.navigate_to(docs);
    let notes = manager.add_node("Notes").unwrap();
    manager.navigate_to(notes);

    assert!(manager.remove_node(notes));
    let state = manager.state();
    assert_eq!(state.current_node(), docs);
    assert!(child_names(&state).is_empty());
}

#[test]
fn removing_ancestor_of_displayed_node_moves_view_to_its_parent() {
    let manager = setup();
    let root = manager.state().current_node();
    let docs = manager.add_node("Docs").unwrap();
    manager.navigate_to(docs);
    let notes = manager.add_node("Notes").unwrap();
    manager.navigate_to(notes);

    assert!(manager.remove_node(docs));
    let state = manager.state();
    assert_eq!(state.current_node(), root);
    assert!(!state.tree().contains(notes));
}

#[test]
fn removing_parentless_root_keeps_view_on_root() {
    let manager = setup();
    let root = manager.state().current_node();
    let docs = manager.add_node("Docs").unwrap();
    manager.navigate_to(docs);

    assert!(!manager.remove_node(root));
    let state = manager.state();
    assert_eq!(state.current_node(), root);
    assert_eq!(child_names(&state), vec!["Docs"]);
}

#[test]
fn navigate_up_at_root_is_noop() {
    let manager = setup();
    let before = manager.state().current_node();
    assert!(!manager.navigate_up());
    assert_eq!(manager.state().current_node(), before);
}

#[test]
fn stale_handles_are_ignored() {
    let manager = setup();
    let docs = manager.add_node("Docs").unwrap();
    assert!(manager.remove_node(docs));

    assert!(!manager.navigate_to(docs));
    assert!(!manager.remove_node(docs));
    assert!(manager.rename_node(docs, "Renamed").is_err());

    let reused = manager.add_node("Music").unwrap();
    assert_ne!(reused, docs);
    assert_eq!(child_names(&manager.state()), vec!["Music"]);
}

#[test]
fn same_named_nodes_stay_distinct() {
    let manager = setup();
    let first = manager.add_node("Inbox").unwrap();
    let second = manager.add_node("Inbox").unwrap();
    let state = manager.state();
    assert_eq!(
        state.tree().get(first).unwrap().id(),
        state.tree().get(second).unwrap().id()
    );

    assert!(manager.remove_node(second));
    let state = manager.state();
    assert!(state.tree().contains(first));
    assert_eq!(child_names(&state), vec!["Inbox"]);
}

#[test]
fn rename_keeps_id() {
    let manager = setup();
    let docs = manager.add_node("Docs").unwrap();
    manager.rename_node(docs, "Documents").unwrap();

    let state = manager.state();
    let node = state.tree().get(docs).unwrap();
    assert_eq!(node.name(), "Documents");
    assert_eq!(node.id(), generate_node_id("Docs"));
}

#[test]
fn adding_flag_only_toggles_flag() {
    let manager = setup();
    let before = manager.state().current_node();
    manager.set_adding_node(true);
    assert!(manager.state().is_adding_node());
    manager.set_adding_node(false);
    let state = manager.state();
    assert!(!state.is_adding_node());
    assert_eq!(state.current_node(), before);
}

#[test]
fn old_snapshots_are_not_mutated() {
    let manager = setup();
    let before = manager.state();
    manager.add_node("Docs").unwrap();

    assert!(child_names(&before).is_empty());
    assert_eq!(child_names(&manager.state()), vec!["Docs"]);
}

#[test]
fn subscribers_receive_each_transition() {
    let manager = setup();
    let updates = manager.subscribe();
    assert!(child_names(&updates.recv().unwrap()).is_empty());

    let docs = manager.add_node("Docs").unwrap();
    assert_eq!(child_names(&updates.recv().unwrap()), vec!["Docs"]);

    manager.navigate_to(docs);
    assert_eq!(updates.recv().unwrap().current_node(), docs);

    manager.set_adding_node(true);
    assert!(updates.recv().unwrap().is_adding_node());
    assert!(updates.try_recv().is_err());
}

#[test]
fn mutations_persist_whole_tree() {
    let store = MemoryKeyValueStore::new();
    let manager = TreeManager::open_blocking(store.clone()).unwrap();
    let docs = manager.add_node("Docs").unwrap();
    manager.navigate_to(docs);
    manager.add_node("Notes").unwrap();
    manager.flush().unwrap();

    let blob: serde_json::Value =
        serde_json::from_str(&store.snapshot(TREE_STORE_KEY).unwrap()).unwrap();
    assert_eq!(blob["name"], "Root");
    assert_eq!(blob["id"], generate_node_id("Root"));
    assert_eq!(blob["children"][0]["name"], "Docs");
    assert_eq!(blob["children"][0]["children"][0]["name"], "Notes");
    assert!(blob["children"][0].get("parent").is_none());
    assert_eq!(manager.save_counts(), (2, 0));
}

#[test]
fn navigation_does_not_persist() {
    let store = MemoryKeyValueStore::new();
    let manager = TreeManager::open_blocking(store.clone()).unwrap();
    manager.set_adding_node(true);
    manager.navigate_up();
    manager.flush().unwrap();
    assert_eq!(store.snapshot(TREE_STORE_KEY), None);
}
