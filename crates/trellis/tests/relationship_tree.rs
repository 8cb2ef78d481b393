//! Integration tests for the relationship tree editor over the in-memory
//! backend.

use std::sync::Arc;

use trellis::backend::{DataType, MemoryBackend, PropertyType, StagedWrite, TransactionState, Value};
use trellis::config::TreeConfig;
use trellis::{
    BackendOperation, Binding, Control, ControlRef, Item, ItemFormatter, PropertyValue,
    RelationshipTree, RelationshipTreeNode, ViewModelError,
};

const BOM: &str = "Part BOM";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn part(backend: &MemoryBackend, id: &str) -> Arc<dyn Item> {
    backend.add_item("Part", id, [("keyed_name", Value::from(format!("Part {id}")))])
}

/// A -> B -> C.
fn chain() -> (MemoryBackend, Arc<RelationshipTree>) {
    init_tracing();
    let backend = MemoryBackend::new();
    let a = part(&backend, "A");
    part(&backend, "B");
    part(&backend, "C");
    backend.relate(BOM, "A", "B");
    backend.relate(BOM, "B", "C");

    let tree = RelationshipTree::new(BOM);
    tree.set_binding(Some(Binding::Item(a))).unwrap();
    (backend, tree)
}

/// A with children B and C.
fn siblings() -> (MemoryBackend, Arc<RelationshipTree>) {
    init_tracing();
    let backend = MemoryBackend::new();
    let a = part(&backend, "A");
    part(&backend, "B");
    part(&backend, "C");
    backend.relate(BOM, "A", "B");
    backend.relate(BOM, "A", "C");

    let tree = RelationshipTree::new(BOM);
    tree.set_binding(Some(Binding::Item(a))).unwrap();
    (backend, tree)
}

/// Follow item ids down from the root, loading children on the way.
fn node(tree: &RelationshipTree, path: &[&str]) -> Arc<RelationshipTreeNode> {
    let mut current = tree.node().unwrap();
    for id in path {
        current = current
            .children()
            .unwrap()
            .into_iter()
            .find(|child| child.item().is_some_and(|item| item.id() == *id))
            .unwrap_or_else(|| panic!("no child {id}"));
    }
    current
}

fn select(tree: &RelationshipTree, node: &Arc<RelationshipTreeNode>) {
    let parameter: ControlRef = node.clone();
    tree.get_command("Select").unwrap().execute(&[parameter]).unwrap();
}

fn run(tree: &RelationshipTree, command: &str) -> trellis::Result<()> {
    tree.get_command(command).unwrap().execute(&[])
}

fn enabled(tree: &RelationshipTree, command: &str) -> bool {
    tree.get_command(command).unwrap().can_execute()
}

fn selected_item(tree: &RelationshipTree) -> Option<String> {
    tree.selected()
        .and_then(|node| node.item())
        .map(|item| item.id().to_string())
}

#[test]
fn test_binding_builds_root_and_children() {
    let (_backend, tree) = chain();
    let root = tree.node().unwrap();
    assert_eq!(root.name().as_deref(), Some("Part A"));
    assert!(root.is_expanded());
    assert!(root.relationship().is_none());

    let b = node(&tree, &["B"]);
    assert_eq!(b.name().as_deref(), Some("Part B"));
    assert!(!b.is_expanded());
    assert_eq!(b.parent().unwrap().id(), root.id());
    assert!(b.loaded_children().is_empty());

    let c = node(&tree, &["B", "C"]);
    assert!(b.is_expanded());
    assert_eq!(c.name().as_deref(), Some("Part C"));
    assert_eq!(tree.node_count(), 3);
}

#[test]
fn test_binding_requires_item() {
    let (backend, tree) = chain();
    let relationship = backend.relationship("R1").unwrap();
    let err = tree.set_binding(Some(Binding::Relationship(relationship))).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
    assert_eq!(tree.node().unwrap().item().unwrap().id(), "A");
}

#[test]
fn test_unsearchable_item_type_rejected_before_binding() {
    init_tracing();
    let backend = MemoryBackend::new();
    backend.define_property_types(
        "Part",
        vec![
            PropertyType::new("item_number", DataType::String),
            PropertyType::new("thumbnail", DataType::Image),
        ],
    );
    let a = part(&backend, "A");
    part(&backend, "B");
    backend.relate(BOM, "A", "B");

    let tree = RelationshipTree::new(BOM);
    let err = tree.set_binding(Some(Binding::Item(a.clone()))).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
    assert!(tree.binding().is_none());
    assert!(tree.node().is_none());
    assert!(tree.search().binding().is_none());

    let err = tree.set_binding(Some(Binding::Item(a))).unwrap_err();
    assert!(matches!(err, ViewModelError::Argument(_)));
    assert!(tree.binding().is_none());
}

#[test]
fn test_rebinding_same_item_reuses_node() {
    let (backend, tree) = chain();
    let first = tree.node().unwrap();

    tree.set_binding(None).unwrap();
    assert!(tree.node().is_none());

    tree.set_binding(Some(Binding::Item(backend.item("A").unwrap()))).unwrap();
    let second = tree.node().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &tree.cached_item_node("A").unwrap()));
}

#[test]
fn test_initial_gates() {
    let (_backend, tree) = chain();
    assert!(enabled(&tree, "Select"));
    assert!(enabled(&tree, "SearchClosed"));
    for command in ["Add", "Cut", "Copy", "Paste", "Delete", "Indent", "Outdent", "Save", "Undo"] {
        assert!(!enabled(&tree, command), "{command} should start disabled");
    }
}

#[test]
fn test_root_selection_gates() {
    let (_backend, tree) = chain();
    select(&tree, &tree.node().unwrap());

    assert!(enabled(&tree, "Add"));
    assert!(enabled(&tree, "Copy"));
    assert!(!enabled(&tree, "Cut"));
    assert!(!enabled(&tree, "Delete"));
    assert!(!enabled(&tree, "Indent"));
    assert!(!enabled(&tree, "Outdent"));
}

#[test]
fn test_select_ignores_foreign_node() {
    let (backend, tree) = chain();
    let other = RelationshipTree::new(BOM);
    other.set_binding(Some(Binding::Item(backend.item("B").unwrap()))).unwrap();

    select(&tree, &other.node().unwrap());
    assert!(tree.selected().is_none());
    assert!(!tree.select(&other.node().unwrap()));
}

#[test]
fn test_locked_parent_disables_structural_commands() {
    let (backend, tree) = siblings();
    backend.set_can_update("A", false);
    select(&tree, &node(&tree, &["C"]));

    assert!(enabled(&tree, "Copy"));
    assert!(!enabled(&tree, "Cut"));
    assert!(!enabled(&tree, "Delete"));
    assert!(!enabled(&tree, "Indent"));
}

#[test]
fn test_cut_then_paste_restores_relationship() {
    let (backend, tree) = chain();
    select(&tree, &node(&tree, &["B", "C"]));
    assert!(enabled(&tree, "Cut"));

    run(&tree, "Cut").unwrap();
    assert_eq!(selected_item(&tree).as_deref(), Some("B"));
    assert_eq!(tree.copy_paste_buffer().unwrap().id(), "C");
    assert!(backend.related_ids(BOM, "B").is_empty());
    assert!(node(&tree, &["B"]).loaded_children().is_empty());
    assert!(enabled(&tree, "Paste"));
    assert!(enabled(&tree, "Save"));
    assert!(enabled(&tree, "Undo"));

    run(&tree, "Paste").unwrap();
    assert_eq!(backend.related_ids(BOM, "B"), ["C"]);
    let children = node(&tree, &["B"]).loaded_children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name().as_deref(), Some("Part C"));

    let transaction = tree.transaction_id().unwrap();
    let staged = backend.staged(&transaction);
    assert_eq!(staged.len(), 4);
    assert!(matches!(&staged[1], StagedWrite::DeleteRelationship { relationship_id } if relationship_id == "R2"));
    assert!(matches!(&staged[3], StagedWrite::CreateRelationship { related_id, .. } if related_id == "C"));
}

#[test]
fn test_copy_fills_buffer_without_transaction() {
    let (_backend, tree) = chain();
    select(&tree, &node(&tree, &["B"]));
    run(&tree, "Copy").unwrap();

    assert_eq!(tree.copy_paste_buffer().unwrap().id(), "B");
    assert!(!tree.has_transaction());
    assert!(enabled(&tree, "Paste"));
}

#[test]
fn test_delete_selects_parent() {
    let (backend, tree) = siblings();
    select(&tree, &node(&tree, &["B"]));
    run(&tree, "Delete").unwrap();

    assert_eq!(selected_item(&tree).as_deref(), Some("A"));
    assert_eq!(backend.related_ids(BOM, "A"), ["C"]);
    assert_eq!(tree.node().unwrap().loaded_children().len(), 1);
    assert!(tree.copy_paste_buffer().is_none());
}

#[test]
fn test_indent_guards_and_effect() {
    let (backend, tree) = siblings();

    select(&tree, &node(&tree, &["B"]));
    assert!(!enabled(&tree, "Indent"), "first child cannot indent");
    assert!(!enabled(&tree, "Outdent"), "child of the root cannot outdent");

    select(&tree, &node(&tree, &["C"]));
    assert!(enabled(&tree, "Indent"));

    run(&tree, "Indent").unwrap();
    assert_eq!(backend.related_ids(BOM, "A"), ["B"]);
    assert_eq!(backend.related_ids(BOM, "B"), ["C"]);
    assert_eq!(selected_item(&tree).as_deref(), Some("B"));
    assert_eq!(node(&tree, &["B"]).loaded_children().len(), 1);
}

#[test]
fn test_outdent_moves_to_grandparent() {
    let (backend, tree) = chain();
    select(&tree, &node(&tree, &["B", "C"]));
    assert!(enabled(&tree, "Outdent"));

    run(&tree, "Outdent").unwrap();
    assert_eq!(backend.related_ids(BOM, "A"), ["B", "C"]);
    assert!(backend.related_ids(BOM, "B").is_empty());
    assert_eq!(selected_item(&tree).as_deref(), Some("A"));
    assert!(!enabled(&tree, "Outdent"));

    let names: Vec<_> = tree
        .node()
        .unwrap()
        .loaded_children()
        .iter()
        .filter_map(|child| child.name())
        .collect();
    assert_eq!(names, ["Part B", "Part C"]);
}

#[test]
fn test_save_commits_and_closes_gates() {
    let (backend, tree) = chain();
    select(&tree, &node(&tree, &["B", "C"]));
    run(&tree, "Cut").unwrap();
    let transaction = tree.transaction_id().unwrap();

    run(&tree, "Save").unwrap();
    assert_eq!(backend.transaction_state(&transaction), Some(TransactionState::Committed));
    assert!(!tree.has_transaction());
    assert!(!enabled(&tree, "Save"));
    assert!(!enabled(&tree, "Undo"));
    assert!(backend.related_ids(BOM, "B").is_empty());
}

#[test]
fn test_undo_restores_same_nodes() {
    let (backend, tree) = chain();
    let c = node(&tree, &["B", "C"]);
    select(&tree, &c);
    run(&tree, "Cut").unwrap();
    let transaction = tree.transaction_id().unwrap();

    run(&tree, "Undo").unwrap();
    assert_eq!(backend.transaction_state(&transaction), Some(TransactionState::RolledBack));
    assert!(!tree.has_transaction());
    assert_eq!(backend.related_ids(BOM, "B"), ["C"]);

    let restored = node(&tree, &["B", "C"]);
    assert!(Arc::ptr_eq(&c, &restored));
    assert_eq!(selected_item(&tree).as_deref(), Some("B"));
    assert!(!enabled(&tree, "Undo"));
}

#[test]
fn test_multiple_edits_share_transaction() {
    let (backend, tree) = siblings();
    select(&tree, &node(&tree, &["C"]));
    run(&tree, "Indent").unwrap();
    let transaction = tree.transaction_id().unwrap();

    select(&tree, &node(&tree, &["B", "C"]));
    run(&tree, "Outdent").unwrap();
    assert_eq!(tree.transaction_id(), Some(transaction.clone()));
    assert_eq!(backend.transaction_ids(), [transaction]);
}

#[test]
fn test_backend_failure_propagates_and_gates_refresh() {
    let (backend, tree) = chain();
    select(&tree, &node(&tree, &["B", "C"]));
    backend.fail_next(BackendOperation::Delete);

    let err = run(&tree, "Cut").unwrap_err();
    assert!(err.is_backend());
    assert!(!tree.base().in_error());
    assert!(tree.has_transaction());
    assert!(enabled(&tree, "Undo"));
    assert_eq!(backend.related_ids(BOM, "B"), ["C"]);

    let staged = backend.staged(&tree.transaction_id().unwrap());
    assert_eq!(staged, [StagedWrite::Update { item_id: "B".to_string() }]);
    assert!(tree.copy_paste_buffer().is_none());
}

#[test]
fn test_failed_transaction_open_leaves_no_transaction() {
    let (backend, tree) = chain();
    select(&tree, &node(&tree, &["B", "C"]));
    backend.fail_next(BackendOperation::BeginTransaction);

    assert!(run(&tree, "Cut").unwrap_err().is_backend());
    assert!(!tree.has_transaction());
    assert!(!enabled(&tree, "Undo"));
    assert!(tree.copy_paste_buffer().is_none());
    assert!(!enabled(&tree, "Paste"));
}

#[test]
fn test_add_from_search() {
    init_tracing();
    let backend = MemoryBackend::new();
    let a = part(&backend, "A");
    part(&backend, "X");
    let tree = RelationshipTree::new(BOM);
    tree.set_binding(Some(Binding::Item(a))).unwrap();
    assert!(tree.node().unwrap().loaded_children().is_empty());

    select(&tree, &tree.node().unwrap());
    assert!(enabled(&tree, "Add"));
    run(&tree, "Add").unwrap();
    assert!(tree.show_search());

    let search = tree.search();
    assert_eq!(search.store().unwrap().item_type(), "Part");
    search.base().refresh_command().execute(&[]).unwrap();
    assert_eq!(search.result_count(), 2);
    search.select_results(&["X"]).unwrap();

    assert!(!tree.show_search());
    let staged = backend.staged(&tree.transaction_id().unwrap());
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0], StagedWrite::Update { item_id: "A".to_string() });
    assert!(matches!(&staged[1], StagedWrite::CreateRelationship { source_id, related_id, .. }
        if source_id == "A" && related_id == "X"));

    let children = tree.node().unwrap().loaded_children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name().as_deref(), Some("Part X"));
    assert!(enabled(&tree, "Save"));
}

#[test]
fn test_search_failure_sets_error_state() {
    let (backend, tree) = chain();
    select(&tree, &tree.node().unwrap());
    run(&tree, "Add").unwrap();
    tree.search().search().unwrap();
    backend.fail_next(BackendOperation::CreateRelationship);

    tree.search().select_results(&["C"]).unwrap();
    assert!(tree.base().in_error());
    assert!(tree.base().error_message().unwrap().contains("create relationship"));
    assert!(!tree.show_search());
}

#[test]
fn test_search_closed_hides_panel() {
    let (_backend, tree) = chain();
    select(&tree, &tree.node().unwrap());
    run(&tree, "Add").unwrap();
    run(&tree, "SearchClosed").unwrap();
    assert!(!tree.show_search());
}

#[test]
fn test_refresh_picks_up_backend_changes() {
    let (backend, tree) = chain();
    node(&tree, &["B", "C"]);
    part(&backend, "D");
    backend.relate(BOM, "B", "D");

    tree.base().refresh_command().execute(&[]).unwrap();
    let names: Vec<_> = node(&tree, &["B"])
        .loaded_children()
        .iter()
        .filter_map(|child| child.name())
        .collect();
    assert_eq!(names, ["Part C", "Part D"]);
    assert!(tree.base().refresh_command().can_execute());
}

#[test]
fn test_eviction_clears_selection() {
    let (backend, tree) = chain();
    select(&tree, &node(&tree, &["B", "C"]));

    let transaction = backend.session().begin_transaction().unwrap();
    backend.relationship("R2").unwrap().delete(transaction.as_ref()).unwrap();
    tree.base().refresh_command().execute(&[]).unwrap();

    assert!(tree.selected().is_none());
    assert!(!enabled(&tree, "Copy"));
}

#[test]
fn test_relationship_type_change_reloads() {
    let (backend, tree) = chain();
    backend.relate("Part Alternate", "A", "C");

    tree.set_property_value("RelationshipType", "Part Alternate".into()).unwrap();
    assert_eq!(tree.relationship_type().as_deref(), Some("Part Alternate"));
    let children = tree.node().unwrap().loaded_children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name().as_deref(), Some("Part C"));
}

struct IdFormatter;

impl ItemFormatter for IdFormatter {
    fn display(&self, item: &dyn Item) -> String {
        format!("{}:{}", item.item_type(), item.id())
    }
}

#[test]
fn test_formatter_change_relabels() {
    let (_backend, tree) = chain();
    let b = node(&tree, &["B"]);
    tree.set_item_formatter(Arc::new(IdFormatter)).unwrap();

    assert_eq!(tree.node().unwrap().name().as_deref(), Some("Part:A"));
    assert_eq!(b.name().as_deref(), Some("Part:B"));
}

#[test]
fn test_from_config_without_type_shows_root_only() {
    init_tracing();
    let backend = MemoryBackend::new();
    let a = part(&backend, "A");
    part(&backend, "B");
    backend.relate(BOM, "A", "B");

    let tree = RelationshipTree::from_config(&TreeConfig::default());
    tree.set_binding(Some(Binding::Item(a))).unwrap();
    assert!(tree.node().unwrap().loaded_children().is_empty());

    let tree = RelationshipTree::from_config(&TreeConfig {
        relationship_type: Some(BOM.to_string()),
    });
    tree.set_binding(Some(Binding::Item(backend.item("A").unwrap()))).unwrap();
    assert_eq!(tree.node().unwrap().loaded_children().len(), 1);
}

#[test]
fn test_metadata_surface() {
    let (_backend, tree) = chain();
    assert_eq!(
        tree.commands(),
        [
            "Refresh", "Close", "Select", "Add", "Cut", "Copy", "Paste", "Delete", "Indent", "Outdent",
            "Save", "Undo", "SearchClosed",
        ]
    );
    assert!(tree.get_property_read_only("Selected").unwrap());
    assert!(!tree.get_property_read_only("RelationshipType").unwrap());
    assert_eq!(tree.get_property_value("Selected").unwrap(), PropertyValue::Null);

    let root = tree.node().unwrap();
    select(&tree, &root);
    let selected = tree.get_property_value("Selected").unwrap();
    assert_eq!(selected.as_control().unwrap().id(), root.id());

    // Node and Selected are the same control; Search is the other child.
    assert_eq!(tree.controls().len(), 2);
}

#[test]
fn test_node_metadata() {
    let (_backend, tree) = chain();
    let root = tree.node().unwrap();
    assert_eq!(root.get_property_value("Name").unwrap(), PropertyValue::from("Part A"));
    assert_eq!(root.get_property_value("Expanded").unwrap(), PropertyValue::Boolean(true));

    let b = node(&tree, &["B"]);
    assert!(b.controls().is_empty());
    b.get_command("Expand").unwrap().execute(&[]).unwrap();
    assert!(b.is_expanded());
    assert_eq!(b.controls().len(), 1);
}

#[test]
fn test_selection_notifies() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let (_backend, tree) = chain();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    tree.base().property_changed().connect(move |change| {
        if change.name == "Selected" {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let root = tree.node().unwrap();
    select(&tree, &root);
    select(&tree, &root);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
