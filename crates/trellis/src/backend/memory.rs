//! In-memory backend.
//!
//! Writes apply to the shared state immediately, so a refresh inside an open
//! transaction sees them, and are journaled per transaction. Rolling back
//! reverts the journal in reverse order; committing discards it.
//!
//! The helpers on [`MemoryBackend`] seed data and inspect staged writes,
//! which makes it the fixture for tree and control tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::backend::{
    Condition, Item, ItemStore, PropertyType, Relationship, Session, Transaction, Value,
};
use trellis_core::error::{BackendError, BackendOperation, BackendResult};
use trellis_core::logging::targets;

/// A write recorded inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedWrite {
    Update {
        item_id: String,
    },
    CreateRelationship {
        relationship_id: String,
        source_id: String,
        related_id: String,
    },
    DeleteRelationship {
        relationship_id: String,
    },
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

struct ItemRecord {
    item_type: String,
    properties: HashMap<String, Value>,
    can_update: bool,
}

struct RelationshipRecord {
    id: String,
    relationship_type: String,
    source_id: String,
    related_id: Option<String>,
    properties: HashMap<String, Value>,
    deleted: bool,
}

struct TransactionRecord {
    state: TransactionState,
    journal: Vec<StagedWrite>,
}

#[derive(Default)]
struct State {
    items: HashMap<String, ItemRecord>,
    item_order: Vec<String>,
    relationships: Vec<RelationshipRecord>,
    property_types: HashMap<String, Vec<PropertyType>>,
    transactions: HashMap<String, TransactionRecord>,
    next_id: u64,
    failures: Vec<BackendOperation>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn take_failure(&mut self, operation: BackendOperation) -> BackendResult<()> {
        match self.failures.iter().position(|&op| op == operation) {
            Some(index) => {
                self.failures.remove(index);
                Err(BackendError::new(operation, "injected failure"))
            }
            None => Ok(()),
        }
    }

    fn journal(&mut self, transaction: &str, operation: BackendOperation) -> BackendResult<&mut Vec<StagedWrite>> {
        match self.transactions.get_mut(transaction) {
            Some(record) if record.state == TransactionState::Open => Ok(&mut record.journal),
            Some(_) => Err(BackendError::new(operation, format!("transaction {transaction} is closed"))),
            None => Err(BackendError::new(operation, format!("unknown transaction {transaction}"))),
        }
    }

    fn live_relationship(&mut self, id: &str) -> Option<&mut RelationshipRecord> {
        self.relationships.iter_mut().find(|r| r.id == id && !r.deleted)
    }
}

type SharedState = Arc<Mutex<State>>;

/// Handle to an in-memory backend. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: SharedState,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session over this backend.
    pub fn session(&self) -> Arc<dyn Session> {
        Arc::new(MemorySession {
            state: self.state.clone(),
        })
    }

    /// Add an updatable item.
    pub fn add_item<'a>(
        &self,
        item_type: &str,
        id: &str,
        properties: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Arc<dyn Item> {
        let mut state = self.state.lock();
        state.items.insert(
            id.to_string(),
            ItemRecord {
                item_type: item_type.to_string(),
                properties: properties
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
                can_update: true,
            },
        );
        if !state.item_order.iter().any(|existing| existing == id) {
            state.item_order.push(id.to_string());
        }
        drop(state);
        self.item_handle(id, item_type)
    }

    /// Look up an item by id.
    pub fn item(&self, id: &str) -> Option<Arc<dyn Item>> {
        let item_type = self.state.lock().items.get(id)?.item_type.clone();
        Some(self.item_handle(id, &item_type))
    }

    /// Add a committed relationship, returning its id.
    pub fn relate(&self, relationship_type: &str, source_id: &str, related_id: &str) -> String {
        self.relate_with(relationship_type, source_id, related_id, [])
    }

    /// Add a committed relationship carrying its own properties.
    pub fn relate_with<'a>(
        &self,
        relationship_type: &str,
        source_id: &str,
        related_id: &str,
        properties: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> String {
        let mut state = self.state.lock();
        let id = state.next_id("R");
        state.relationships.push(RelationshipRecord {
            id: id.clone(),
            relationship_type: relationship_type.to_string(),
            source_id: source_id.to_string(),
            related_id: Some(related_id.to_string()),
            properties: properties
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            deleted: false,
        });
        id
    }

    /// Look up a live relationship by id.
    pub fn relationship(&self, id: &str) -> Option<Arc<dyn Relationship>> {
        let mut state = self.state.lock();
        let record = state.live_relationship(id)?;
        Some(Arc::new(MemoryRelationship {
            id: record.id.clone(),
            relationship_type: record.relationship_type.clone(),
            source_id: record.source_id.clone(),
            state: self.state.clone(),
        }))
    }

    pub fn set_can_update(&self, id: &str, can_update: bool) {
        if let Some(record) = self.state.lock().items.get_mut(id) {
            record.can_update = can_update;
        }
    }

    /// Define the property types reported by the store for `item_type`.
    pub fn define_property_types(&self, item_type: &str, property_types: Vec<PropertyType>) {
        self.state
            .lock()
            .property_types
            .insert(item_type.to_string(), property_types);
    }

    /// Ids of the items related to `source_id`, in order.
    pub fn related_ids(&self, relationship_type: &str, source_id: &str) -> Vec<String> {
        self.state
            .lock()
            .relationships
            .iter()
            .filter(|r| !r.deleted && r.relationship_type == relationship_type && r.source_id == source_id)
            .filter_map(|r| r.related_id.clone())
            .collect()
    }

    /// Writes staged in a transaction and not yet committed or rolled back.
    pub fn staged(&self, transaction: &str) -> Vec<StagedWrite> {
        self.state
            .lock()
            .transactions
            .get(transaction)
            .map(|record| record.journal.clone())
            .unwrap_or_default()
    }

    pub fn transaction_state(&self, transaction: &str) -> Option<TransactionState> {
        self.state.lock().transactions.get(transaction).map(|r| r.state)
    }

    /// Ids of every transaction ever opened.
    pub fn transaction_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().transactions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Make the next call of `operation` fail.
    pub fn fail_next(&self, operation: BackendOperation) {
        self.state.lock().failures.push(operation);
    }

    fn item_handle(&self, id: &str, item_type: &str) -> Arc<dyn Item> {
        Arc::new(MemoryItem {
            id: id.to_string(),
            item_type: item_type.to_string(),
            state: self.state.clone(),
        })
    }
}

struct MemorySession {
    state: SharedState,
}

impl Session for MemorySession {
    fn begin_transaction(&self) -> BackendResult<Arc<dyn Transaction>> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::BeginTransaction)?;
        let id = state.next_id("T");
        state.transactions.insert(
            id.clone(),
            TransactionRecord {
                state: TransactionState::Open,
                journal: Vec::new(),
            },
        );
        tracing::debug!(target: targets::BACKEND, transaction = %id, "transaction opened");
        Ok(Arc::new(MemoryTransaction {
            id,
            state: self.state.clone(),
        }))
    }

    fn item_store(&self, item_type: &str) -> BackendResult<Arc<dyn ItemStore>> {
        Ok(Arc::new(MemoryStore {
            item_type: item_type.to_string(),
            state: self.state.clone(),
        }))
    }
}

struct MemoryItem {
    id: String,
    item_type: String,
    state: SharedState,
}

impl Item for MemoryItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn can_update(&self) -> bool {
        self.state
            .lock()
            .items
            .get(&self.id)
            .is_some_and(|record| record.can_update)
    }

    fn update(&self, transaction: &dyn Transaction) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::Update)?;
        match state.items.get(&self.id) {
            Some(record) if record.can_update => {}
            Some(_) => {
                return Err(BackendError::new(
                    BackendOperation::Update,
                    format!("item {} is locked", self.id),
                ));
            }
            None => {
                return Err(BackendError::new(
                    BackendOperation::Update,
                    format!("unknown item {}", self.id),
                ));
            }
        }
        state
            .journal(transaction.id(), BackendOperation::Update)?
            .push(StagedWrite::Update {
                item_id: self.id.clone(),
            });
        Ok(())
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.state
            .lock()
            .items
            .get(&self.id)?
            .properties
            .get(name)
            .cloned()
    }

    fn relationships(&self, relationship_type: &str) -> BackendResult<Vec<Arc<dyn Relationship>>> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::Relationships)?;
        Ok(state
            .relationships
            .iter()
            .filter(|r| !r.deleted && r.relationship_type == relationship_type && r.source_id == self.id)
            .map(|r| -> Arc<dyn Relationship> {
                Arc::new(MemoryRelationship {
                    id: r.id.clone(),
                    relationship_type: r.relationship_type.clone(),
                    source_id: r.source_id.clone(),
                    state: self.state.clone(),
                })
            })
            .collect())
    }

    fn create_relationship(
        &self,
        relationship_type: &str,
        related: &Arc<dyn Item>,
        transaction: &dyn Transaction,
    ) -> BackendResult<Arc<dyn Relationship>> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::CreateRelationship)?;
        state.journal(transaction.id(), BackendOperation::CreateRelationship)?;

        let id = state.next_id("R");
        state.relationships.push(RelationshipRecord {
            id: id.clone(),
            relationship_type: relationship_type.to_string(),
            source_id: self.id.clone(),
            related_id: Some(related.id().to_string()),
            properties: HashMap::new(),
            deleted: false,
        });
        state
            .journal(transaction.id(), BackendOperation::CreateRelationship)?
            .push(StagedWrite::CreateRelationship {
                relationship_id: id.clone(),
                source_id: self.id.clone(),
                related_id: related.id().to_string(),
            });

        Ok(Arc::new(MemoryRelationship {
            id,
            relationship_type: relationship_type.to_string(),
            source_id: self.id.clone(),
            state: self.state.clone(),
        }))
    }

    fn session(&self) -> Arc<dyn Session> {
        Arc::new(MemorySession {
            state: self.state.clone(),
        })
    }
}

struct MemoryRelationship {
    id: String,
    relationship_type: String,
    source_id: String,
    state: SharedState,
}

impl Relationship for MemoryRelationship {
    fn id(&self) -> &str {
        &self.id
    }

    fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn related(&self) -> Option<Arc<dyn Item>> {
        let state = self.state.lock();
        let related_id = state
            .relationships
            .iter()
            .find(|r| r.id == self.id)?
            .related_id
            .clone()?;
        let item_type = state.items.get(&related_id)?.item_type.clone();
        Some(Arc::new(MemoryItem {
            id: related_id,
            item_type,
            state: self.state.clone(),
        }))
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.state
            .lock()
            .relationships
            .iter()
            .find(|r| r.id == self.id)?
            .properties
            .get(name)
            .cloned()
    }

    fn delete(&self, transaction: &dyn Transaction) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::Delete)?;
        state.journal(transaction.id(), BackendOperation::Delete)?;
        let record = state.live_relationship(&self.id).ok_or_else(|| {
            BackendError::new(
                BackendOperation::Delete,
                format!("relationship {} does not exist", self.id),
            )
        })?;
        record.deleted = true;
        state
            .journal(transaction.id(), BackendOperation::Delete)?
            .push(StagedWrite::DeleteRelationship {
                relationship_id: self.id.clone(),
            });
        Ok(())
    }
}

struct MemoryTransaction {
    id: String,
    state: SharedState,
}

impl Transaction for MemoryTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn commit(&self, keep_open: bool) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::Commit)?;
        let journal = state.journal(&self.id, BackendOperation::Commit)?;
        let writes = journal.len();
        journal.clear();
        if !keep_open {
            if let Some(record) = state.transactions.get_mut(&self.id) {
                record.state = TransactionState::Committed;
            }
        }
        tracing::debug!(target: targets::BACKEND, transaction = %self.id, writes, keep_open, "transaction committed");
        Ok(())
    }

    fn rollback(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::Rollback)?;
        let journal = std::mem::take(state.journal(&self.id, BackendOperation::Rollback)?);
        let writes = journal.len();

        for write in journal.into_iter().rev() {
            match write {
                StagedWrite::Update { .. } => {}
                StagedWrite::CreateRelationship { relationship_id, .. } => {
                    state.relationships.retain(|r| r.id != relationship_id);
                }
                StagedWrite::DeleteRelationship { relationship_id } => {
                    if let Some(record) = state.relationships.iter_mut().find(|r| r.id == relationship_id) {
                        record.deleted = false;
                    }
                }
            }
        }
        if let Some(record) = state.transactions.get_mut(&self.id) {
            record.state = TransactionState::RolledBack;
        }
        tracing::debug!(target: targets::BACKEND, transaction = %self.id, writes, "transaction rolled back");
        Ok(())
    }
}

struct MemoryStore {
    item_type: String,
    state: SharedState,
}

impl ItemStore for MemoryStore {
    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn property_types(&self) -> Vec<PropertyType> {
        self.state
            .lock()
            .property_types
            .get(&self.item_type)
            .cloned()
            .unwrap_or_default()
    }

    fn query(&self, condition: &Condition) -> BackendResult<Vec<Arc<dyn Item>>> {
        let mut state = self.state.lock();
        state.take_failure(BackendOperation::Query)?;
        let mut found: Vec<Arc<dyn Item>> = Vec::new();
        for id in &state.item_order {
            let Some(record) = state.items.get(id) else {
                continue;
            };
            if record.item_type != self.item_type {
                continue;
            }
            let lookup = |name: &str| record.properties.get(name).cloned();
            if condition.matches(&lookup) {
                found.push(Arc::new(MemoryItem {
                    id: id.clone(),
                    item_type: record.item_type.clone(),
                    state: self.state.clone(),
                }));
            }
        }
        Ok(found)
    }
}

static_assertions::assert_impl_all!(MemoryBackend: Send, Sync);
