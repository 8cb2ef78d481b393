//! Node labels for relationship trees.

use trellis_core::backend::{Item, Relationship};

/// Formats the label of a node bound to an item.
pub trait ItemFormatter: Send + Sync {
    fn display(&self, item: &dyn Item) -> String;
}

/// Formats the label of a node bound to a relationship.
pub trait RelationshipFormatter: Send + Sync {
    fn display(&self, relationship: &dyn Relationship, items: &dyn ItemFormatter) -> String;
}

/// Shows the item's `keyed_name`, or its id when it has none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultItemFormatter;

impl ItemFormatter for DefaultItemFormatter {
    fn display(&self, item: &dyn Item) -> String {
        match item.property("keyed_name") {
            Some(name) if !name.is_null() => name.to_string(),
            _ => item.id().to_string(),
        }
    }
}

/// Shows the related item, or the relationship id when there is none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRelationshipFormatter;

impl RelationshipFormatter for DefaultRelationshipFormatter {
    fn display(&self, relationship: &dyn Relationship, items: &dyn ItemFormatter) -> String {
        match relationship.related() {
            Some(related) => items.display(related.as_ref()),
            None => relationship.id().to_string(),
        }
    }
}
