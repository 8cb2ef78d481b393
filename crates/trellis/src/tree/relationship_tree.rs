//! Hierarchical editor over one relationship type.
//!
//! Structural edits share a single lazily opened transaction that `Save`
//! commits and `Undo` rolls back. Command gates are recomputed after every
//! edit and selection change.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use trellis_core::backend::{Item, Relationship, Transaction};
use trellis_core::logging::targets;
use trellis_core::{
    Binding, Command, Control, ControlBase, ControlId, ControlRef, MetaObject, MetaObjectBuilder,
    Property, PropertyKind, PropertyValue, Region, Result, ViewModelError, control_downcast,
};

use super::{Tree, TreeNode};
use super::formatter::{DefaultItemFormatter, DefaultRelationshipFormatter, ItemFormatter, RelationshipFormatter};
use super::relationship_node::RelationshipTreeNode;
use crate::config::TreeConfig;
use crate::controls::SearchPanel;

type Node = RelationshipTreeNode;

struct TreeState {
    hierarchy: Tree<Node>,
    /// Node identity by backend entity. Never evicted, so an entity that
    /// comes back (after Undo, or a rebind) maps to the same node.
    cache: HashMap<String, Arc<Node>>,
}

/// The selected node with the neighbours the command guards look at.
struct SelectionContext {
    node: Arc<Node>,
    parent: Option<Arc<Node>>,
    grandparent: Option<Arc<Node>>,
    previous_sibling: Option<Arc<Node>>,
}

/// An editable hierarchy over backend relationships of one type.
///
/// Bind it to a root item. Structural commands (`Cut`, `Paste`, `Delete`,
/// `Indent`, `Outdent`, and attaching items picked in the embedded search
/// panel) stage their writes in one transaction, opened on first use and
/// shared until `Save` commits it or `Undo` rolls it back. Nothing is ever
/// committed implicitly.
///
/// Command gates are recomputed after every structural command, even a
/// failed one, and after every selection change.
pub struct RelationshipTree {
    base: ControlBase,
    this: Weak<RelationshipTree>,
    relationship_type: Property<Option<String>>,
    item_formatter: RwLock<Arc<dyn ItemFormatter>>,
    relationship_formatter: RwLock<Arc<dyn RelationshipFormatter>>,
    state: RwLock<TreeState>,
    selected: RwLock<Option<Arc<Node>>>,
    copy_paste_buffer: RwLock<Option<Arc<dyn Item>>>,
    transaction: RwLock<Option<Arc<dyn Transaction>>>,
    show_search: Property<bool>,
    search: Arc<SearchPanel>,
    select: Command,
    add: Command,
    cut: Command,
    copy: Command,
    paste: Command,
    delete: Command,
    indent: Command,
    outdent: Command,
    save: Command,
    undo: Command,
    search_closed: Command,
}

impl RelationshipTree {
    /// Create a tree expanding relationships of `relationship_type`.
    pub fn new(relationship_type: impl Into<String>) -> Arc<Self> {
        Self::build(
            Some(relationship_type.into()),
            Arc::new(DefaultItemFormatter),
            Arc::new(DefaultRelationshipFormatter),
        )
    }

    /// Create a tree with custom node label formatters.
    pub fn with_formatters(
        relationship_type: impl Into<String>,
        item_formatter: Arc<dyn ItemFormatter>,
        relationship_formatter: Arc<dyn RelationshipFormatter>,
    ) -> Arc<Self> {
        Self::build(Some(relationship_type.into()), item_formatter, relationship_formatter)
    }

    pub fn from_config(config: &TreeConfig) -> Arc<Self> {
        Self::build(
            config.relationship_type.clone(),
            Arc::new(DefaultItemFormatter),
            Arc::new(DefaultRelationshipFormatter),
        )
    }

    fn build(
        relationship_type: Option<String>,
        item_formatter: Arc<dyn ItemFormatter>,
        relationship_formatter: Arc<dyn RelationshipFormatter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let base = ControlBase::new(this);
            let search = SearchPanel::new();
            search.base().set_region(Region::Right);
            let owner = this.clone();
            search.selection_changed().connect(move |_| {
                if let Some(tree) = owner.upgrade() {
                    tree.on_search_selection();
                }
            });

            Self {
                state: RwLock::new(TreeState {
                    hierarchy: Tree::new(base.id()),
                    cache: HashMap::new(),
                }),
                base,
                this: this.clone(),
                relationship_type: Property::new(relationship_type),
                item_formatter: RwLock::new(item_formatter),
                relationship_formatter: RwLock::new(relationship_formatter),
                selected: RwLock::new(None),
                copy_paste_buffer: RwLock::new(None),
                transaction: RwLock::new(None),
                show_search: Property::new(false),
                search,
                select: Command::for_owner("Select", true, this, |tree: &Self, _, parameters| {
                    for parameter in parameters {
                        if let Some(node) = control_downcast::<Node>(parameter.clone()) {
                            tree.select(&node);
                        }
                    }
                    Ok(())
                }),
                add: Command::for_owner("Add", false, this, |tree: &Self, _, _| {
                    tree.set_show_search(true);
                    Ok(())
                }),
                cut: Command::for_owner("Cut", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Cut", Self::cut)
                }),
                copy: Command::for_owner("Copy", false, this, |tree: &Self, _, _| {
                    tree.copy_selected();
                    Ok(())
                }),
                paste: Command::for_owner("Paste", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Paste", Self::paste)
                }),
                delete: Command::for_owner("Delete", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Delete", Self::delete)
                }),
                indent: Command::for_owner("Indent", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Indent", Self::indent)
                }),
                outdent: Command::for_owner("Outdent", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Outdent", Self::outdent)
                }),
                save: Command::for_owner("Save", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Save", Self::save)
                }),
                undo: Command::for_owner("Undo", false, this, |tree: &Self, _, _| {
                    tree.run_edit("Undo", Self::undo)
                }),
                search_closed: Command::for_owner("SearchClosed", true, this, |tree: &Self, _, _| {
                    tree.set_show_search(false);
                    Ok(())
                }),
            }
        })
    }

    /// The root node.
    pub fn node(&self) -> Option<Arc<Node>> {
        self.state.read().hierarchy.root()
    }

    pub fn selected(&self) -> Option<Arc<Node>> {
        self.selected.read().clone()
    }

    /// The item held for the next paste.
    pub fn copy_paste_buffer(&self) -> Option<Arc<dyn Item>> {
        self.copy_paste_buffer.read().clone()
    }

    pub fn show_search(&self) -> bool {
        self.show_search.get()
    }

    /// The embedded search panel used by `Add`.
    pub fn search(&self) -> &Arc<SearchPanel> {
        &self.search
    }

    pub fn relationship_type(&self) -> Option<String> {
        self.relationship_type.get()
    }

    /// Change the relationship type and reload the tree.
    pub fn set_relationship_type(&self, relationship_type: Option<String>) -> Result<()> {
        if self.base.update(&self.relationship_type, relationship_type, "RelationshipType") {
            return self.base.refresh_command().execute(&[]);
        }
        Ok(())
    }

    pub fn item_formatter(&self) -> Arc<dyn ItemFormatter> {
        self.item_formatter.read().clone()
    }

    pub fn relationship_formatter(&self) -> Arc<dyn RelationshipFormatter> {
        self.relationship_formatter.read().clone()
    }

    /// Replace the item formatter, relabel and reload.
    pub fn set_item_formatter(&self, formatter: Arc<dyn ItemFormatter>) -> Result<()> {
        {
            let mut current = self.item_formatter.write();
            if Arc::ptr_eq(&current, &formatter) {
                return Ok(());
            }
            *current = formatter;
        }
        self.relabel_and_refresh()
    }

    /// Replace the relationship formatter, relabel and reload.
    pub fn set_relationship_formatter(&self, formatter: Arc<dyn RelationshipFormatter>) -> Result<()> {
        {
            let mut current = self.relationship_formatter.write();
            if Arc::ptr_eq(&current, &formatter) {
                return Ok(());
            }
            *current = formatter;
        }
        self.relabel_and_refresh()
    }

    /// Whether a transaction is open.
    pub fn has_transaction(&self) -> bool {
        self.transaction.read().is_some()
    }

    /// Backend id of the open transaction.
    pub fn transaction_id(&self) -> Option<String> {
        self.transaction.read().as_ref().map(|tx| tx.id().to_string())
    }

    /// Number of nodes currently in the hierarchy.
    pub fn node_count(&self) -> usize {
        self.state.read().hierarchy.len()
    }

    /// The cached node for an item shown as the root.
    pub fn cached_item_node(&self, item_id: &str) -> Option<Arc<Node>> {
        self.state.read().cache.get(&item_key(item_id)).cloned()
    }

    /// The cached node for a relationship.
    pub fn cached_relationship_node(&self, relationship_id: &str) -> Option<Arc<Node>> {
        self.state.read().cache.get(&relationship_key(relationship_id)).cloned()
    }

    pub fn parent_of(&self, id: ControlId) -> Option<Arc<Node>> {
        self.state.read().hierarchy.parent(id)
    }

    /// Loaded children of a node.
    pub fn children_of(&self, id: ControlId) -> Vec<Arc<Node>> {
        self.state.read().hierarchy.children(id)
    }

    pub fn is_expanded(&self, id: ControlId) -> bool {
        self.state.read().hierarchy.is_expanded(id)
    }

    /// Load a node's children unless they are already loaded.
    pub fn expand_node(&self, id: ControlId) -> Result<()> {
        if self.is_expanded(id) {
            return Ok(());
        }
        let node = self.hierarchy_node(id)?;
        self.load_children(&node)
    }

    /// Reload a node's children and every expanded subtree below it.
    pub fn refresh_node(&self, id: ControlId) -> Result<()> {
        let node = self.hierarchy_node(id)?;
        self.load_children(&node)?;
        for child in self.children_of(id) {
            if self.is_expanded(child.id()) {
                self.refresh_node(child.id())?;
            }
        }
        Ok(())
    }

    /// Select a node of this tree. Returns `false`, changing nothing, for
    /// nodes that are not part of it.
    pub fn select(&self, node: &Arc<Node>) -> bool {
        let belongs = node.tree_id() == self.id() && self.state.read().hierarchy.contains(node.id());
        if belongs {
            self.set_selected(Some(node.clone()));
        }
        self.refresh_commands();
        belongs
    }

    /// Recompute every command gate from the current state.
    pub fn refresh_commands(&self) {
        let context = self.selection_context();
        let has_transaction = self.has_transaction();
        let has_buffer = self.copy_paste_buffer.read().is_some();

        let mut add = false;
        let mut cut = false;
        let mut copy = false;
        let mut paste = false;
        let mut indent = false;
        let mut outdent = false;
        if let Some(context) = &context {
            let parent_updatable = updatable(context.parent.as_ref());
            add = updatable(Some(&context.node));
            cut = parent_updatable;
            copy = true;
            paste = parent_updatable && has_buffer;
            indent = parent_updatable && updatable(context.previous_sibling.as_ref());
            outdent = parent_updatable && updatable(context.grandparent.as_ref());
        }

        self.add.set_can_execute(add);
        self.cut.set_can_execute(cut);
        self.copy.set_can_execute(copy);
        self.paste.set_can_execute(paste);
        self.delete.set_can_execute(cut);
        self.indent.set_can_execute(indent);
        self.outdent.set_can_execute(outdent);
        self.save.set_can_execute(has_transaction);
        self.undo.set_can_execute(has_transaction);
    }

    fn run_edit(&self, command: &'static str, edit: fn(&Self) -> Result<()>) -> Result<()> {
        let _span = tracing::debug_span!(target: targets::TREE, "tree_edit", command).entered();
        let result = edit(self);
        match &result {
            Ok(()) => tracing::debug!(target: targets::TREE, command, "tree edit applied"),
            Err(err) => tracing::warn!(target: targets::TREE, command, error = %err, "tree edit failed"),
        }
        self.refresh_commands();
        result
    }

    fn cut(&self) -> Result<()> {
        let Some(context) = self.selection_context() else {
            return Ok(());
        };
        let Some(parent) = context.parent else {
            return Ok(());
        };
        let relationship = require_relationship(&context.node)?;

        let transaction = self.transaction()?;
        require_item(&parent)?.update(transaction.as_ref())?;
        relationship.delete(transaction.as_ref())?;
        *self.copy_paste_buffer.write() = context.node.item();
        self.load_children(&parent)?;
        self.set_selected(Some(parent));
        Ok(())
    }

    fn copy_selected(&self) {
        if let Some(node) = self.selected() {
            *self.copy_paste_buffer.write() = node.item();
        }
        self.refresh_commands();
    }

    fn paste(&self) -> Result<()> {
        let Some(node) = self.selected() else {
            return Ok(());
        };
        let Some(buffered) = self.copy_paste_buffer() else {
            return Ok(());
        };
        let relationship_type = self.require_relationship_type()?;
        let target = require_item(&node)?;

        let transaction = self.transaction()?;
        target.update(transaction.as_ref())?;
        target.create_relationship(&relationship_type, &buffered, transaction.as_ref())?;
        self.load_children(&node)
    }

    fn delete(&self) -> Result<()> {
        let Some(context) = self.selection_context() else {
            return Ok(());
        };
        let Some(parent) = context.parent else {
            return Ok(());
        };
        let relationship = require_relationship(&context.node)?;

        let transaction = self.transaction()?;
        require_item(&parent)?.update(transaction.as_ref())?;
        relationship.delete(transaction.as_ref())?;
        self.set_selected(Some(parent.clone()));
        self.load_children(&parent)
    }

    fn indent(&self) -> Result<()> {
        let Some(context) = self.selection_context() else {
            return Ok(());
        };
        let (Some(parent), Some(new_parent)) = (context.parent, context.previous_sibling) else {
            return Ok(());
        };
        self.move_selected(&context.node, &parent, new_parent)
    }

    fn outdent(&self) -> Result<()> {
        let Some(context) = self.selection_context() else {
            return Ok(());
        };
        let (Some(parent), Some(grandparent)) = (context.parent, context.grandparent) else {
            return Ok(());
        };
        self.move_selected(&context.node, &parent, grandparent)
    }

    /// Move `node` from under `parent` to the end of `new_parent`'s children.
    fn move_selected(&self, node: &Arc<Node>, parent: &Arc<Node>, new_parent: Arc<Node>) -> Result<()> {
        let relationship_type = self.require_relationship_type()?;
        let relationship = require_relationship(node)?;
        let child_item = require_item(node)?;
        let new_parent_item = require_item(&new_parent)?;

        let transaction = self.transaction()?;
        require_item(parent)?.update(transaction.as_ref())?;
        relationship.delete(transaction.as_ref())?;
        self.load_children(parent)?;

        new_parent_item.update(transaction.as_ref())?;
        new_parent_item.create_relationship(&relationship_type, &child_item, transaction.as_ref())?;
        self.load_children(&new_parent)?;
        self.set_selected(Some(new_parent));
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let Some(transaction) = self.transaction.read().clone() else {
            return Ok(());
        };
        transaction.commit(false)?;
        *self.transaction.write() = None;
        tracing::debug!(target: targets::TREE, transaction = transaction.id(), "tree changes saved");
        Ok(())
    }

    fn undo(&self) -> Result<()> {
        let Some(transaction) = self.transaction.read().clone() else {
            return Ok(());
        };
        transaction.rollback()?;
        *self.transaction.write() = None;
        tracing::debug!(target: targets::TREE, transaction = transaction.id(), "tree changes rolled back");
        self.base.refresh_command().execute(&[])
    }

    /// Attach the items picked in the search panel under the selected node.
    fn on_search_selection(&self) {
        let items = self.search.selected_items();
        if !items.is_empty() && self.selected().is_some() {
            let result = self.run_edit("AddFromSearch", |tree| {
                let Some(node) = tree.selected() else {
                    return Ok(());
                };
                tree.attach_items(&node, &tree.search.selected_items())
            });
            if let Err(err) = result {
                self.base.set_error(err.to_string());
            }
        }
        self.set_show_search(false);
    }

    fn attach_items(&self, node: &Arc<Node>, items: &[Arc<dyn Item>]) -> Result<()> {
        let relationship_type = self.require_relationship_type()?;
        let target = require_item(node)?;

        let transaction = self.transaction()?;
        target.update(transaction.as_ref())?;
        for item in items {
            target.create_relationship(&relationship_type, item, transaction.as_ref())?;
        }
        self.load_children(node)
    }

    /// The shared transaction, opened on first use.
    fn transaction(&self) -> Result<Arc<dyn Transaction>> {
        if let Some(transaction) = self.transaction.read().clone() {
            return Ok(transaction);
        }
        let item = self
            .bound_item()
            .ok_or_else(|| ViewModelError::argument("RelationshipTree is not bound"))?;
        let transaction = item.session().begin_transaction()?;
        tracing::debug!(target: targets::TREE, transaction = transaction.id(), "tree transaction opened");
        *self.transaction.write() = Some(transaction.clone());
        Ok(transaction)
    }

    fn bound_item(&self) -> Option<Arc<dyn Item>> {
        self.binding().and_then(|binding| binding.as_item().cloned())
    }

    fn require_relationship_type(&self) -> Result<String> {
        self.relationship_type()
            .ok_or_else(|| ViewModelError::argument("RelationshipTree has no relationship type"))
    }

    fn hierarchy_node(&self, id: ControlId) -> Result<Arc<Node>> {
        self.state
            .read()
            .hierarchy
            .get(id)
            .ok_or_else(|| ViewModelError::argument(format!("node {id} is not in this tree")))
    }

    /// Reuse the cached node for `key`, or create one, and bind it.
    fn cached_node(&self, key: String, binding: Binding) -> Result<Arc<Node>> {
        let existing = self.state.read().cache.get(&key).cloned();
        let node = match existing {
            Some(node) => node,
            None => {
                let node = Node::new(self.this.clone(), self.id());
                self.state.write().cache.insert(key, node.clone());
                node
            }
        };
        node.set_binding(Some(binding))?;
        Ok(node)
    }

    /// Replace a node's children with the backend's current relationships.
    fn load_children(&self, parent: &Arc<Node>) -> Result<()> {
        let mut children = Vec::new();
        if let Some(relationship_type) = self.relationship_type() {
            let item = require_item(parent)?;
            for relationship in item.relationships(&relationship_type)? {
                let key = relationship_key(relationship.id());
                children.push(self.cached_node(key, Binding::Relationship(relationship))?);
            }
        }

        let evicted = self
            .state
            .write()
            .hierarchy
            .replace_children(parent.id(), children)?;
        self.drop_selection_if_evicted(&evicted);
        Ok(())
    }

    fn drop_selection_if_evicted(&self, evicted: &[Arc<Node>]) {
        let selected = self.selected.read().as_ref().map(|node| node.id());
        if let Some(selected) = selected {
            if evicted.iter().any(|node| node.id() == selected) {
                self.set_selected(None);
            }
        }
    }

    fn selection_context(&self) -> Option<SelectionContext> {
        let node = self.selected()?;
        let state = self.state.read();
        let id = node.id();
        let parent = state.hierarchy.parent(id);
        let grandparent = parent.as_ref().and_then(|p| state.hierarchy.parent(p.id()));
        let previous_sibling = state.hierarchy.previous_sibling(id);
        Some(SelectionContext {
            node,
            parent,
            grandparent,
            previous_sibling,
        })
    }

    fn set_selected(&self, node: Option<Arc<Node>>) {
        let changed = {
            let mut selected = self.selected.write();
            let changed = selected.as_ref().map(|n| n.id()) != node.as_ref().map(|n| n.id());
            if changed {
                *selected = node;
            }
            changed
        };
        if changed {
            self.base.notify("Selected");
        }
    }

    fn set_show_search(&self, show: bool) {
        self.base.update(&self.show_search, show, "ShowSearch");
    }

    fn relabel_and_refresh(&self) -> Result<()> {
        let nodes: Vec<Arc<Node>> = self.state.read().cache.values().cloned().collect();
        for node in nodes {
            node.update_label();
        }
        self.base.refresh_command().execute(&[])
    }
}

fn item_key(item_id: &str) -> String {
    format!("item:{item_id}")
}

fn relationship_key(relationship_id: &str) -> String {
    format!("relationship:{relationship_id}")
}

fn updatable(node: Option<&Arc<Node>>) -> bool {
    node.and_then(|node| node.item())
        .is_some_and(|item| item.can_update())
}

fn require_item(node: &Node) -> Result<Arc<dyn Item>> {
    node.item()
        .ok_or_else(|| ViewModelError::argument(format!("node {} has no item", node.id())))
}

fn require_relationship(node: &Node) -> Result<Arc<dyn Relationship>> {
    node.relationship()
        .ok_or_else(|| ViewModelError::argument(format!("node {} has no relationship", node.id())))
}

impl Control for RelationshipTree {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("RelationshipTree")
                .with_control_base()
                .property("Node", PropertyKind::Control, |tree| {
                    tree.node().map(|node| node as ControlRef).into()
                })
                .property("Selected", PropertyKind::Control, |tree| {
                    tree.selected().map(|node| node as ControlRef).into()
                })
                .property("ShowSearch", PropertyKind::Boolean, |tree| tree.show_search().into())
                .labelled("Show Search")
                .property("Search", PropertyKind::Control, |tree| {
                    PropertyValue::Control(tree.search.clone())
                })
                .property_rw(
                    "RelationshipType",
                    PropertyKind::String,
                    |tree| tree.relationship_type().into(),
                    |tree, value| match value {
                        PropertyValue::Null => tree.set_relationship_type(None),
                        PropertyValue::String(name) => tree.set_relationship_type(Some(name)),
                        _ => Err(ViewModelError::argument("RelationshipType expects a string")),
                    },
                )
                .labelled("Relationship Type")
                .command("Select", |tree| &tree.select)
                .command("Add", |tree| &tree.add)
                .command("Cut", |tree| &tree.cut)
                .command("Copy", |tree| &tree.copy)
                .command("Paste", |tree| &tree.paste)
                .command("Delete", |tree| &tree.delete)
                .command("Indent", |tree| &tree.indent)
                .command("Outdent", |tree| &tree.outdent)
                .command("Save", |tree| &tree.save)
                .command("Undo", |tree| &tree.undo)
                .command("SearchClosed", |tree| &tree.search_closed)
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn check_binding(&self, binding: &Binding) -> Result<()> {
        let Binding::Item(item) = binding else {
            return Err(ViewModelError::argument(format!(
                "RelationshipTree binding must be an item, got {}",
                binding.kind()
            )));
        };
        // The search panel is bound to the item's store in the after-hook.
        let store = item.session().item_store(item.item_type())?;
        self.search.check_binding(&Binding::Store(store))
    }

    fn after_binding_changed(&self) -> Result<()> {
        match self.bound_item() {
            Some(item) => {
                let root = self.cached_node(item_key(item.id()), Binding::Item(item.clone()))?;
                let evicted = self.state.write().hierarchy.set_root(Some(root.clone()))?;
                self.drop_selection_if_evicted(&evicted);
                self.base.notify("Node");

                let store = item.session().item_store(item.item_type())?;
                self.search.set_binding(Some(Binding::Store(store)))?;
                self.expand_node(root.id())?;
            }
            None => {
                let evicted = self.state.write().hierarchy.set_root(None)?;
                self.drop_selection_if_evicted(&evicted);
                self.base.notify("Node");
                self.search.set_binding(None)?;
            }
        }
        self.refresh_commands();
        Ok(())
    }

    fn refresh_control(&self) -> Result<()> {
        if let Some(root) = self.node() {
            self.refresh_node(root.id())?;
        }
        self.refresh_commands();
        Ok(())
    }
}

static_assertions::assert_impl_all!(RelationshipTree: Send, Sync);
