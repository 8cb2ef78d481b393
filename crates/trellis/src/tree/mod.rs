//! Hierarchies of controls.
//!
//! [`Tree`] is a flat table of nodes keyed by [`ControlId`]. Parent and child
//! links are ids into that table, so nodes never own each other and the
//! table can be edited without reference cycles. Children are ordered;
//! insertion order is display order.
//!
//! [`RelationshipTree`] builds an editable hierarchy over backend
//! relationships on top of it.

mod formatter;
mod relationship_node;
mod relationship_tree;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use trellis_core::{Control, ControlId, Result, ViewModelError};

pub use formatter::{DefaultItemFormatter, DefaultRelationshipFormatter, ItemFormatter, RelationshipFormatter};
pub use relationship_node::RelationshipTreeNode;
pub use relationship_tree::RelationshipTree;

/// A control that lives in exactly one [`Tree`].
pub trait TreeNode: Control {
    /// Identity of the owning tree. Never changes after construction.
    fn tree_id(&self) -> ControlId;
}

struct Slot<N> {
    node: Arc<N>,
    parent: Option<ControlId>,
    children: Vec<ControlId>,
    expanded: bool,
}

impl<N> Slot<N> {
    fn new(node: Arc<N>, parent: Option<ControlId>) -> Self {
        Self {
            node,
            parent,
            children: Vec::new(),
            expanded: false,
        }
    }
}

/// Ordered hierarchy of nodes owned by one tree control.
pub struct Tree<N> {
    owner: ControlId,
    slots: HashMap<ControlId, Slot<N>>,
    root: Option<ControlId>,
}

impl<N: TreeNode> Tree<N> {
    /// Create an empty hierarchy owned by the tree control `owner`.
    pub fn new(owner: ControlId) -> Self {
        Self {
            owner,
            slots: HashMap::new(),
            root: None,
        }
    }

    pub fn owner(&self) -> ControlId {
        self.owner
    }

    /// Number of nodes in the hierarchy.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn root(&self) -> Option<Arc<N>> {
        self.root.and_then(|id| self.get(id))
    }

    pub fn root_id(&self) -> Option<ControlId> {
        self.root
    }

    /// Replace the root. Returns every node that left the hierarchy.
    pub fn set_root(&mut self, node: Option<Arc<N>>) -> Result<Vec<Arc<N>>> {
        if let Some(node) = &node {
            self.check_owner(node.as_ref())?;
            if self.root == Some(node.id()) {
                return Ok(Vec::new());
            }
        }

        let evicted = self.slots.drain().map(|(_, slot)| slot.node).collect();
        self.root = node.map(|node| {
            let id = node.id();
            self.slots.insert(id, Slot::new(node, None));
            id
        });
        Ok(evicted)
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn get(&self, id: ControlId) -> Option<Arc<N>> {
        self.slots.get(&id).map(|slot| slot.node.clone())
    }

    pub fn parent_id(&self, id: ControlId) -> Option<ControlId> {
        self.slots.get(&id)?.parent
    }

    pub fn parent(&self, id: ControlId) -> Option<Arc<N>> {
        self.parent_id(id).and_then(|parent| self.get(parent))
    }

    pub fn child_ids(&self, id: ControlId) -> &[ControlId] {
        self.slots.get(&id).map_or(&[], |slot| slot.children.as_slice())
    }

    pub fn children(&self, id: ControlId) -> Vec<Arc<N>> {
        self.child_ids(id)
            .iter()
            .filter_map(|&child| self.get(child))
            .collect()
    }

    /// Index of a node among its siblings.
    pub fn position(&self, id: ControlId) -> Option<usize> {
        let parent = self.parent_id(id)?;
        self.child_ids(parent).iter().position(|&child| child == id)
    }

    /// The sibling immediately before `id`, if any.
    pub fn previous_sibling(&self, id: ControlId) -> Option<Arc<N>> {
        let parent = self.parent_id(id)?;
        let siblings = self.child_ids(parent);
        let index = siblings.iter().position(|&child| child == id)?;
        index.checked_sub(1).and_then(|prev| self.get(siblings[prev]))
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ControlId) -> Vec<ControlId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_id(id);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.parent_id(parent);
        }
        ancestors
    }

    pub fn is_ancestor_of(&self, ancestor: ControlId, id: ControlId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Distance from the root, `None` for nodes outside the hierarchy.
    pub fn depth(&self, id: ControlId) -> Option<usize> {
        self.contains(id).then(|| self.ancestors(id).len())
    }

    /// Whether the node's children have been loaded.
    pub fn is_expanded(&self, id: ControlId) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.expanded)
    }

    pub fn set_expanded(&mut self, id: ControlId, expanded: bool) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.expanded = expanded;
        }
    }

    /// Descendants of `id` in depth-first pre-order, excluding `id`.
    pub fn descendants(&self, id: ControlId) -> Vec<ControlId> {
        let mut result = Vec::new();
        let mut stack: Vec<ControlId> = self.child_ids(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.child_ids(current).iter().rev());
        }
        result
    }

    /// Make `children` the ordered children of `parent`.
    ///
    /// Nodes already elsewhere in the hierarchy are re-parented. Previous
    /// children that are not in `children` leave the hierarchy together with
    /// their subtrees and are returned. The call is validated up front and
    /// changes nothing on error.
    pub fn replace_children(&mut self, parent: ControlId, children: Vec<Arc<N>>) -> Result<Vec<Arc<N>>> {
        if !self.contains(parent) {
            return Err(ViewModelError::argument(format!("node {parent} is not in this tree")));
        }
        let ancestors: HashSet<ControlId> = self.ancestors(parent).into_iter().collect();
        let mut seen = HashSet::new();
        for child in &children {
            self.check_owner(child.as_ref())?;
            let id = child.id();
            if id == parent || ancestors.contains(&id) || Some(id) == self.root {
                return Err(ViewModelError::argument(format!(
                    "node {id} cannot become a child of its own descendant {parent}"
                )));
            }
            if !seen.insert(id) {
                return Err(ViewModelError::argument(format!("node {id} listed twice")));
            }
        }

        let new_ids: Vec<ControlId> = children.iter().map(|child| child.id()).collect();
        let removed: Vec<ControlId> = self
            .child_ids(parent)
            .iter()
            .copied()
            .filter(|id| !seen.contains(id))
            .collect();

        for child in children {
            let id = child.id();
            match self.slots.get(&id).map(|slot| slot.parent) {
                Some(Some(old_parent)) if old_parent != parent => {
                    if let Some(old) = self.slots.get_mut(&old_parent) {
                        old.children.retain(|&c| c != id);
                    }
                    if let Some(slot) = self.slots.get_mut(&id) {
                        slot.parent = Some(parent);
                    }
                }
                Some(_) => {}
                None => {
                    self.slots.insert(id, Slot::new(child, Some(parent)));
                }
            }
        }
        if let Some(slot) = self.slots.get_mut(&parent) {
            slot.children = new_ids;
            slot.expanded = true;
        }

        let mut evicted = Vec::new();
        for id in removed {
            evicted.extend(self.remove_subtree(id));
        }
        Ok(evicted)
    }

    /// Remove a node and its subtree, returning the removed nodes.
    pub fn detach(&mut self, id: ControlId) -> Vec<Arc<N>> {
        if let Some(parent) = self.parent_id(id) {
            if let Some(slot) = self.slots.get_mut(&parent) {
                slot.children.retain(|&c| c != id);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.remove_subtree(id)
    }

    fn remove_subtree(&mut self, id: ControlId) -> Vec<Arc<N>> {
        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        ids.into_iter()
            .filter_map(|id| self.slots.remove(&id).map(|slot| slot.node))
            .collect()
    }

    fn check_owner(&self, node: &N) -> Result<()> {
        if node.tree_id() == self.owner {
            Ok(())
        } else {
            Err(ViewModelError::argument(format!(
                "node {} belongs to another tree",
                node.id()
            )))
        }
    }
}
