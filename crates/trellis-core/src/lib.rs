//! Core runtime for Trellis view models.
//!
//! This crate provides the pieces every Trellis control is built from:
//!
//! - **Control**: identity, enabled/error state, a validated binding lifecycle
//!   and a generic property/command surface ([`Control`], [`ControlBase`])
//! - **Metadata registry**: per-type name tables built once by explicit
//!   registration ([`MetaObject`], [`MetaObjectBuilder`])
//! - **Signals and properties**: synchronous change notification with
//!   bounded re-entrancy ([`Signal`], [`Property`])
//! - **Commands**: gated actions owned by a control ([`Command`])
//! - **Backend interfaces**: the items, relationships, stores and
//!   transactions controls bind to ([`backend`])
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use std::sync::{Arc, OnceLock};
//! use trellis_core::{Control, ControlBase, MetaObject, MetaObjectBuilder, PropertyKind};
//!
//! struct Label {
//!     base: ControlBase,
//! }
//!
//! impl Control for Label {
//!     fn base(&self) -> &ControlBase {
//!         &self.base
//!     }
//!
//!     fn meta_object(&self) -> &'static MetaObject {
//!         static META: OnceLock<MetaObject> = OnceLock::new();
//!         META.get_or_init(|| MetaObjectBuilder::<Self>::new("Label").with_control_base().build())
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let label = Arc::new_cyclic(|this| Label { base: ControlBase::new(this) });
//! assert!(label.has_property("Enabled"));
//! assert_eq!(label.get_property_type("Tooltip").unwrap(), PropertyKind::String);
//! ```

pub mod backend;
pub mod binding;
pub mod command;
pub mod control;
pub mod error;
pub mod logging;
pub mod meta;
pub mod property;
pub mod signal;

pub use backend::{Condition, DataType, Item, ItemStore, PropertyType, Relationship, Session, Transaction, Value};
pub use binding::{Binding, BindingKind, PropertyBinding};
pub use command::Command;
pub use control::{
    Control, ControlBase, ControlId, ControlRef, PropertyChanged, Region, control_cast,
    control_downcast,
};
pub use error::{
    BackendError, BackendOperation, BackendResult, MemberKind, Result, ViewModelError,
};
pub use meta::{MetaObject, MetaObjectBuilder, MetaProperty, PropertyDescriptor, PropertyKind, PropertyValue};
pub use property::Property;
pub use signal::{ConnectionId, Signal};
