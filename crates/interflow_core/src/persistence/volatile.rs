//! In-process persistence backend.
//!
//! # Responsibility
//! - Keep ordered record sequences per collection, partitioned by scope key
//!   and scope value.
//! - Satisfy the full capability set without external storage.
//!
//! # Invariants
//! - Records live in a caller-owned [`VolatileStore`]; nothing is global.
//! - Transactions are pass-through and rollback is a no-op: writes are
//!   never externally durable.
//! - The store is `!Sync` (interior `RefCell`), so sharing it across threads
//!   is rejected at compile time instead of racing at run time.

use super::{
    AttributeMapper, BackendKind, Data, Page, Persistence, RecordMapper, Scope, Transactional,
    DEFAULT_IDENTIFIER_FIELD,
};
use crate::db::DbResult;
use crate::model::entity::{merge_attributes, Attributes, Entity};
use crate::repo::error::{QueryError, RepoResult};
use log::{debug, info};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

/// Scope key plus the JSON rendering of its value, so `1` and `"1"` differ.
type PartitionKey = Option<(String, String)>;

/// Record store shared by every volatile repository built from it.
///
/// Lifetime is owned by the caller (typically one instance per test or per
/// process), and it must be reset explicitly with [`VolatileStore::reset`].
#[derive(Debug, Default)]
pub struct VolatileStore {
    collections: RefCell<HashMap<String, HashMap<PartitionKey, Vec<Attributes>>>>,
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for the usual shared handle.
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// Drops every record of every collection.
    pub fn reset(&self) {
        self.collections.borrow_mut().clear();
        info!("event=volatile_reset module=persistence status=ok scope=all");
    }

    /// Drops every record of one collection, across all partitions.
    pub fn reset_collection(&self, collection: &str) {
        self.collections.borrow_mut().remove(collection);
        info!("event=volatile_reset module=persistence status=ok scope=collection collection={collection}");
    }

    fn read<R>(
        &self,
        collection: &str,
        partition: &PartitionKey,
        f: impl FnOnce(&[Attributes]) -> R,
    ) -> R {
        let collections = self.collections.borrow();
        let records = collections
            .get(collection)
            .and_then(|partitions| partitions.get(partition))
            .map(Vec::as_slice)
            .unwrap_or_default();
        f(records)
    }

    fn write<R>(
        &self,
        collection: &str,
        partition: &PartitionKey,
        f: impl FnOnce(&mut Vec<Attributes>) -> R,
    ) -> R {
        let mut collections = self.collections.borrow_mut();
        let records = collections
            .entry(collection.to_string())
            .or_default()
            .entry(partition.clone())
            .or_default();
        f(records)
    }
}

/// Volatile backend bound to one collection of a [`VolatileStore`].
pub struct VolatilePersistence<E: Entity> {
    store: Rc<VolatileStore>,
    collection: String,
    identifier_field: String,
    scope: Option<Scope>,
    mapper: Rc<dyn RecordMapper<E>>,
}

impl<E: Entity> VolatilePersistence<E> {
    pub fn new(store: Rc<VolatileStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            scope: None,
            mapper: Rc::new(AttributeMapper),
        }
    }

    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn identified_by(mut self, identifier_field: impl Into<String>) -> Self {
        self.identifier_field = identifier_field.into();
        self
    }

    pub fn mapped_with(mut self, mapper: Rc<dyn RecordMapper<E>>) -> Self {
        self.mapper = mapper;
        self
    }

    fn partition(&self) -> PartitionKey {
        self.scope
            .as_ref()
            .map(|scope| (scope.key.clone(), scope.value.to_string()))
    }

    fn read<R>(&self, f: impl FnOnce(&[Attributes]) -> R) -> R {
        self.store.read(&self.collection, &self.partition(), f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Vec<Attributes>) -> R) -> R {
        self.store.write(&self.collection, &self.partition(), f)
    }

    fn matches_id(&self, record: &Attributes, id: &Value) -> bool {
        record.get(&self.identifier_field) == Some(id)
    }

    fn to_entities(&self, records: Vec<Attributes>) -> RepoResult<Vec<E>> {
        records
            .into_iter()
            .map(|record| Ok(self.mapper.to_entity(record)?))
            .collect()
    }

    fn to_entity(&self, record: Option<Attributes>) -> RepoResult<Option<E>> {
        record
            .map(|record| Ok(self.mapper.to_entity(record)?))
            .transpose()
    }

    fn not_found(&self, id: &Value) -> QueryError {
        QueryError::record_not_found(&self.identifier_field, id)
    }
}

impl<E: Entity> Transactional for VolatilePersistence<E> {
    fn kind(&self) -> BackendKind {
        BackendKind::of::<VolatileStore>()
    }

    fn begin(&self) -> DbResult<()> {
        debug!("event=tx_begin module=persistence backend=volatile status=ok");
        Ok(())
    }

    fn commit(&self) -> DbResult<()> {
        Ok(())
    }

    fn rollback(&self) -> DbResult<()> {
        debug!("event=tx_rollback module=persistence backend=volatile status=noop");
        Ok(())
    }
}

impl<E: Entity> Persistence<E> for VolatilePersistence<E> {
    fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    fn create(&self, data: Data<E>) -> RepoResult<E> {
        let mut record = data.into_record(self.mapper.as_ref())?;
        if let Some(scope) = &self.scope {
            scope.stamp(&mut record);
        }
        if record
            .get(&self.identifier_field)
            .map_or(true, Value::is_null)
        {
            record.insert(
                self.identifier_field.clone(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        let entity = self.mapper.to_entity(record.clone())?;
        self.write(|records| records.push(record));
        Ok(entity)
    }

    fn update(&self, id: &Value, data: Data<E>) -> RepoResult<E> {
        let changes = data.into_record(self.mapper.as_ref())?;
        let merged = self.read(|records| {
            records
                .iter()
                .find(|record| self.matches_id(record, id))
                .cloned()
        });
        let Some(mut merged) = merged else {
            return Err(self.not_found(id).into());
        };
        merge_attributes(&mut merged, changes);

        let entity = self.mapper.to_entity(merged.clone())?;
        self.write(|records| {
            if let Some(slot) = records
                .iter_mut()
                .find(|record| self.matches_id(record, id))
            {
                *slot = merged;
            }
        });
        Ok(entity)
    }

    fn delete(&self, id: &Value) -> RepoResult<bool> {
        let removed = self.write(|records| {
            let position = records
                .iter()
                .position(|record| self.matches_id(record, id))?;
            Some(records.remove(position))
        });
        match removed {
            Some(_) => Ok(true),
            None => Err(self.not_found(id).into()),
        }
    }

    fn soft_delete(&self, id: &Value) -> RepoResult<bool> {
        self.delete(id)
    }

    fn delete_all(&self) -> RepoResult<()> {
        self.write(Vec::clear);
        Ok(())
    }

    fn soft_delete_all(&self) -> RepoResult<()> {
        self.delete_all()
    }

    fn all(&self) -> RepoResult<Vec<E>> {
        self.to_entities(self.read(<[Attributes]>::to_vec))
    }

    fn paginate(&self, page: Page) -> RepoResult<Vec<E>> {
        let records = self.read(|records| {
            records
                .iter()
                .skip(page.offset())
                .take(page.size)
                .cloned()
                .collect()
        });
        self.to_entities(records)
    }

    fn find(&self, id: &Value) -> RepoResult<Option<E>> {
        let record = self.read(|records| {
            records
                .iter()
                .find(|record| self.matches_id(record, id))
                .cloned()
        });
        self.to_entity(record)
    }

    fn find_by(&self, attributes: &Attributes) -> RepoResult<Option<E>> {
        let record = self.read(|records| {
            records
                .iter()
                .find(|record| {
                    attributes
                        .iter()
                        .all(|(key, value)| record.get(key).unwrap_or(&Value::Null) == value)
                })
                .cloned()
        });
        self.to_entity(record)
    }

    fn first(&self) -> RepoResult<Option<E>> {
        self.to_entity(self.read(|records| records.first().cloned()))
    }

    fn last(&self) -> RepoResult<Option<E>> {
        self.to_entity(self.read(|records| records.last().cloned()))
    }

    fn count(&self) -> RepoResult<usize> {
        Ok(self.read(<[Attributes]>::len))
    }
}
