//! Nodes of the relationship tree.

use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use trellis_core::backend::{Item, Relationship};
use trellis_core::{
    Binding, Command, Control, ControlBase, ControlId, ControlRef, MetaObject, MetaObjectBuilder,
    Property, PropertyKind, PropertyValue, Result, ViewModelError,
};

use super::TreeNode;
use super::formatter::{DefaultItemFormatter, DefaultRelationshipFormatter, ItemFormatter, RelationshipFormatter};
use super::relationship_tree::RelationshipTree;

/// A node of a [`RelationshipTree`].
///
/// The root node is bound to an item; every other node is bound to the
/// relationship linking it to its parent's item. Children load on first
/// expansion.
pub struct RelationshipTreeNode {
    base: ControlBase,
    tree: Weak<RelationshipTree>,
    tree_id: ControlId,
    item: RwLock<Option<Arc<dyn Item>>>,
    name: Property<Option<String>>,
    expand: Command,
}

impl RelationshipTreeNode {
    pub(crate) fn new(tree: Weak<RelationshipTree>, tree_id: ControlId) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            base: ControlBase::new(this),
            tree,
            tree_id,
            item: RwLock::new(None),
            name: Property::new(None),
            expand: Command::for_owner("Expand", true, this, |node: &Self, _, _| {
                node.children().map(|_| ())
            }),
        })
    }

    /// The item this node shows: the bound item for the root, the related
    /// item otherwise.
    pub fn item(&self) -> Option<Arc<dyn Item>> {
        self.item.read().clone()
    }

    /// The relationship to the parent's item, `None` for the root.
    pub fn relationship(&self) -> Option<Arc<dyn Relationship>> {
        self.binding().and_then(|binding| binding.as_relationship().cloned())
    }

    /// Formatted label.
    pub fn name(&self) -> Option<String> {
        self.name.get()
    }

    pub fn tree(&self) -> Option<Arc<RelationshipTree>> {
        self.tree.upgrade()
    }

    pub fn parent(&self) -> Option<Arc<RelationshipTreeNode>> {
        self.tree()?.parent_of(self.id())
    }

    /// Children, loading them from the backend on first access.
    pub fn children(&self) -> Result<Vec<Arc<RelationshipTreeNode>>> {
        let tree = self
            .tree()
            .ok_or_else(|| ViewModelError::argument("node outlived its tree"))?;
        tree.expand_node(self.id())?;
        Ok(tree.children_of(self.id()))
    }

    /// Children loaded so far, without touching the backend.
    pub fn loaded_children(&self) -> Vec<Arc<RelationshipTreeNode>> {
        self.tree()
            .map(|tree| tree.children_of(self.id()))
            .unwrap_or_default()
    }

    pub fn is_expanded(&self) -> bool {
        self.tree().is_some_and(|tree| tree.is_expanded(self.id()))
    }

    /// Recompute the label with the tree's current formatters.
    pub(crate) fn update_label(&self) {
        let label = match self.binding() {
            None => None,
            Some(binding) => Some(match self.tree() {
                Some(tree) => {
                    let items = tree.item_formatter();
                    format_label(&binding, items.as_ref(), tree.relationship_formatter().as_ref())
                }
                None => format_label(&binding, &DefaultItemFormatter, &DefaultRelationshipFormatter),
            }),
        };
        self.base.update(&self.name, label, "Name");
    }
}

fn format_label(binding: &Binding, items: &dyn ItemFormatter, relationships: &dyn RelationshipFormatter) -> String {
    match binding {
        Binding::Relationship(relationship) => relationships.display(relationship.as_ref(), items),
        Binding::Item(item) => items.display(item.as_ref()),
        other => other.identity(),
    }
}

impl Control for RelationshipTreeNode {
    fn base(&self) -> &ControlBase {
        &self.base
    }

    fn meta_object(&self) -> &'static MetaObject {
        static META: OnceLock<MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::<Self>::new("RelationshipTreeNode")
                .with_control_base()
                .property("Name", PropertyKind::String, |node| node.name().into())
                .property("Expanded", PropertyKind::Boolean, |node| node.is_expanded().into())
                .property("Children", PropertyKind::ControlList, |node| {
                    PropertyValue::ControlList(
                        node.loaded_children()
                            .into_iter()
                            .map(|child| child as ControlRef)
                            .collect(),
                    )
                })
                .command("Expand", |node| &node.expand)
                .build()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn check_binding(&self, binding: &Binding) -> Result<()> {
        match binding {
            Binding::Item(_) | Binding::Relationship(_) => Ok(()),
            other => Err(ViewModelError::argument(format!(
                "RelationshipTreeNode binding must be an item or a relationship, got {}",
                other.kind()
            ))),
        }
    }

    fn after_binding_changed(&self) -> Result<()> {
        let item = match self.binding() {
            Some(Binding::Item(item)) => Some(item),
            Some(Binding::Relationship(relationship)) => relationship.related(),
            _ => None,
        };
        *self.item.write() = item;
        self.update_label();
        Ok(())
    }

    fn refresh_control(&self) -> Result<()> {
        match self.tree() {
            Some(tree) => tree.refresh_node(self.id()),
            None => Ok(()),
        }
    }
}

impl TreeNode for RelationshipTreeNode {
    fn tree_id(&self) -> ControlId {
        self.tree_id
    }
}

static_assertions::assert_impl_all!(RelationshipTreeNode: Send, Sync);
