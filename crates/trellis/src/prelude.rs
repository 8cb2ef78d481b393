//! Prelude module for Trellis.
//!
//! ```ignore
//! use trellis::prelude::*;
//! ```

// ============================================================================
// Runtime
// ============================================================================

pub use trellis_core::{
    Binding, Command, Control, ControlId, ControlRef, Property, PropertyKind, PropertyValue, Region,
    Result, Signal, ViewModelError, control_downcast,
};

// ============================================================================
// Controls
// ============================================================================

pub use crate::controls::{DecimalCell, Filters, ListValue, SearchPanel};
pub use crate::tree::{RelationshipTree, RelationshipTreeNode};

// ============================================================================
// Configuration
// ============================================================================

pub use crate::config::ViewModelConfig;
