//! Backend collaborator interfaces.
//!
//! Controls observe a product-data backend through these traits: items,
//! the relationships between them, item stores that can be queried, and
//! transactions that stage writes until committed or rolled back. The
//! runtime never implements persistence itself.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::BackendResult;

/// A scalar property value as stored by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Decimal(f64),
    String(String),
    Date(NaiveDateTime),
    /// Reference to another item, by id.
    Item(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow string and item-reference values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Item(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of integer, float and decimal values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) | Self::Decimal(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) | Self::Decimal(v) => write!(f, "{v}"),
            Self::String(s) | Self::Item(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Storage type of a backend property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Date,
    Decimal,
    Federated,
    Float,
    Integer,
    Item,
    List,
    Sequence,
    String,
    Text,
    Image,
    Color,
    Md5,
}

/// Name, label and type metadata for one backend property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyType {
    pub name: String,
    pub label: String,
    pub data_type: DataType,
    pub read_only: bool,
}

impl PropertyType {
    /// Create a writable property type labelled with its name.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            data_type,
            read_only: false,
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Mark the property read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// A query condition over item properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Matches every item.
    All,
    /// Property equals the value.
    Eq { property: String, value: Value },
    /// Property matches a wildcard pattern (`%` or `*`), ignoring case.
    Like { property: String, pattern: String },
    /// Every inner condition holds.
    And(Vec<Condition>),
}

impl Condition {
    /// Equality condition.
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Wildcard condition.
    pub fn like(property: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            property: property.into(),
            pattern: pattern.into(),
        }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        let mut terms = match self {
            Self::And(terms) => terms,
            single => vec![single],
        };
        match other {
            Self::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        Self::And(terms)
    }

    /// Evaluate against an item's properties.
    pub fn matches(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
        match self {
            Self::All => true,
            Self::Eq { property, value } => match lookup(property) {
                Some(actual) => actual == *value || actual.to_string() == value.to_string(),
                None => value.is_null(),
            },
            Self::Like { property, pattern } => lookup(property)
                .is_some_and(|actual| wildcard_match(pattern, &actual.to_string())),
            Self::And(terms) => terms.iter().all(|term| term.matches(lookup)),
        }
    }
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    // Greedy matcher with backtracking to the last wildcard.
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && matches!(pattern[p], '%' | '*') {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| matches!(c, '%' | '*'))
}

/// A unit of staged writes.
pub trait Transaction: Send + Sync {
    /// Backend identifier of the transaction.
    fn id(&self) -> &str;

    /// Make staged writes durable. With `keep_open` the transaction
    /// remains usable afterwards.
    fn commit(&self, keep_open: bool) -> BackendResult<()>;

    /// Discard staged writes and close the transaction.
    fn rollback(&self) -> BackendResult<()>;
}

/// A connection to the backend.
pub trait Session: Send + Sync {
    /// Open a new transaction.
    fn begin_transaction(&self) -> BackendResult<Arc<dyn Transaction>>;

    /// Queryable store for one item type.
    fn item_store(&self, item_type: &str) -> BackendResult<Arc<dyn ItemStore>>;
}

/// A backend item.
pub trait Item: Send + Sync {
    fn id(&self) -> &str;

    fn item_type(&self) -> &str;

    /// Whether the current user may update the item.
    fn can_update(&self) -> bool;

    /// Stage an update of this item inside `transaction`.
    fn update(&self, transaction: &dyn Transaction) -> BackendResult<()>;

    /// Read a property value.
    fn property(&self, name: &str) -> Option<Value>;

    /// Relationships of the given type whose source is this item, in
    /// backend order.
    fn relationships(&self, relationship_type: &str) -> BackendResult<Vec<Arc<dyn Relationship>>>;

    /// Stage a new relationship from this item to `related`.
    fn create_relationship(
        &self,
        relationship_type: &str,
        related: &Arc<dyn Item>,
        transaction: &dyn Transaction,
    ) -> BackendResult<Arc<dyn Relationship>>;

    /// The session this item was loaded through.
    fn session(&self) -> Arc<dyn Session>;
}

/// A typed link from a source item to a related item.
pub trait Relationship: Send + Sync {
    fn id(&self) -> &str;

    fn relationship_type(&self) -> &str;

    fn source_id(&self) -> &str;

    /// The related item, if the relationship has one.
    fn related(&self) -> Option<Arc<dyn Item>>;

    /// Read a property of the relationship record itself.
    fn property(&self, name: &str) -> Option<Value>;

    /// Stage deletion of this relationship inside `transaction`.
    fn delete(&self, transaction: &dyn Transaction) -> BackendResult<()>;
}

/// A queryable collection of items of one type.
pub trait ItemStore: Send + Sync {
    fn item_type(&self) -> &str;

    /// Property types defined for the store's item type.
    fn property_types(&self) -> Vec<PropertyType>;

    /// Items matching `condition`, in backend order.
    fn query(&self, condition: &Condition) -> BackendResult<Vec<Arc<dyn Item>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<Value> {
        match name {
            "item_number" => Some(Value::from("P-1001")),
            "is_current" => Some(Value::Boolean(true)),
            "cost" => Some(Value::Decimal(12.5)),
            _ => None,
        }
    }

    #[test]
    fn test_like_wildcards() {
        assert!(Condition::like("item_number", "p-10%").matches(&lookup));
        assert!(Condition::like("item_number", "*1001").matches(&lookup));
        assert!(Condition::like("item_number", "%").matches(&lookup));
        assert!(!Condition::like("item_number", "Q%").matches(&lookup));
        assert!(!Condition::like("name", "%").matches(&lookup));
    }

    #[test]
    fn test_eq_compares_text_form() {
        assert!(Condition::eq("is_current", "1").matches(&lookup));
        assert!(Condition::eq("cost", Value::Decimal(12.5)).matches(&lookup));
        assert!(!Condition::eq("cost", Value::Decimal(3.0)).matches(&lookup));
    }

    #[test]
    fn test_and_flattens() {
        let condition = Condition::eq("a", "1")
            .and(Condition::eq("b", "2"))
            .and(Condition::eq("c", "3").and(Condition::All));
        match &condition {
            Condition::And(terms) => assert_eq!(terms.len(), 4),
            other => panic!("expected And, got {other:?}"),
        }
    }
}
