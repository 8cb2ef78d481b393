//! The external reference a control observes.

use std::fmt;
use std::sync::Arc;

use crate::backend::{Item, ItemStore, PropertyType, Relationship};

/// Which shape of backend object a binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Item,
    Relationship,
    Property,
    Store,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Item => "Item",
            Self::Relationship => "Relationship",
            Self::Property => "Property",
            Self::Store => "Store",
        };
        f.write_str(name)
    }
}

/// One property of one item.
#[derive(Clone)]
pub struct PropertyBinding {
    pub item: Arc<dyn Item>,
    pub property: PropertyType,
}

/// The single backend object a control is bound to.
///
/// Two bindings are equal when they refer to the same backend entity,
/// whatever Rust object represents it.
#[derive(Clone)]
pub enum Binding {
    Item(Arc<dyn Item>),
    Relationship(Arc<dyn Relationship>),
    Property(PropertyBinding),
    Store(Arc<dyn ItemStore>),
}

impl Binding {
    /// Bind one property of an item.
    pub fn property(item: Arc<dyn Item>, property: PropertyType) -> Self {
        Self::Property(PropertyBinding { item, property })
    }

    pub fn kind(&self) -> BindingKind {
        match self {
            Self::Item(_) => BindingKind::Item,
            Self::Relationship(_) => BindingKind::Relationship,
            Self::Property(_) => BindingKind::Property,
            Self::Store(_) => BindingKind::Store,
        }
    }

    pub fn as_item(&self) -> Option<&Arc<dyn Item>> {
        match self {
            Self::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Arc<dyn Relationship>> {
        match self {
            Self::Relationship(relationship) => Some(relationship),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyBinding> {
        match self {
            Self::Property(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<&Arc<dyn ItemStore>> {
        match self {
            Self::Store(store) => Some(store),
            _ => None,
        }
    }

    /// Backend identity used for equality and cache keys.
    pub fn identity(&self) -> String {
        match self {
            Self::Item(item) => item.id().to_string(),
            Self::Relationship(relationship) => relationship.id().to_string(),
            Self::Property(binding) => format!("{}.{}", binding.item.id(), binding.property.name),
            Self::Store(store) => store.item_type().to_string(),
        }
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Item(a), Self::Item(b)) => a.id() == b.id(),
            (Self::Relationship(a), Self::Relationship(b)) => a.id() == b.id(),
            (Self::Property(a), Self::Property(b)) => {
                a.item.id() == b.item.id() && a.property.name == b.property.name
            }
            (Self::Store(a), Self::Store(b)) => a.item_type() == b.item_type(),
            _ => false,
        }
    }
}

impl Eq for Binding {}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.identity())
    }
}
