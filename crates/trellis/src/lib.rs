//! Trellis - server-side view models over a product-data backend.
//!
//! This crate re-exports the [`trellis_core`] runtime and adds the controls
//! built on it, chiefly the transactional [`RelationshipTree`] editor.
//!
//! # Example
//!
//! ```
//! use trellis::backend::{MemoryBackend, Value};
//! use trellis::prelude::*;
//!
//! let backend = MemoryBackend::new();
//! let root = backend.add_item("Part", "A", [("keyed_name", Value::from("Assembly"))]);
//! let child = backend.add_item("Part", "B", [("keyed_name", Value::from("Bracket"))]);
//! backend.relate("Part BOM", "A", "B");
//!
//! let tree = RelationshipTree::new("Part BOM");
//! tree.set_binding(Some(Binding::Item(root))).unwrap();
//!
//! let node = tree.node().unwrap();
//! assert_eq!(node.name().as_deref(), Some("Assembly"));
//! assert_eq!(node.children().unwrap()[0].name().as_deref(), Some("Bracket"));
//! # drop(child);
//! ```

pub use trellis_core::*;

pub mod backend;
pub mod config;
pub mod controls;
pub mod prelude;
pub mod tree;

pub use config::{ConfigError, FilterLayout, NotificationConfig, TreeConfig, ViewModelConfig};
pub use controls::{DecimalCell, FieldEditor, FilterField, Filters, ListValue, SearchPanel};
pub use tree::{
    DefaultItemFormatter, DefaultRelationshipFormatter, ItemFormatter, RelationshipFormatter, RelationshipTree,
    RelationshipTreeNode, Tree, TreeNode,
};
