//! Persistence capability contract and backend implementations.
//!
//! # Responsibility
//! - Define the fixed CRUD + query + transaction capability set every
//!   backend implements.
//! - Identify backends by kind (type identity) for transaction coordination.
//!
//! # Invariants
//! - Conformance is checked by the compiler: a repository can only wrap a
//!   type implementing [`Persistence`].
//! - A rollback discards the backend's pending writes and nothing else.
//!
//! # See also
//! - `crate::interactor::transaction` for nesting order.

use crate::db::DbResult;
use crate::model::entity::{Attributes, Entity, EntityError};
use crate::repo::error::{RepoError, RepoResult};
use serde_json::Value;
use std::any::{type_name, TypeId};
use std::hash::{Hash, Hasher};

pub mod relational;
pub mod volatile;

pub use relational::{RelationalConfig, RelationalPersistence};
pub use volatile::{VolatilePersistence, VolatileStore};

/// Default identifier attribute name.
pub const DEFAULT_IDENTIFIER_FIELD: &str = "id";

/// Type identity of a persistence implementation.
///
/// Two backend instances share a kind when they share the native store type,
/// regardless of entity type, scope, or table.
#[derive(Debug, Clone, Copy)]
pub struct BackendKind {
    id: TypeId,
    name: &'static str,
}

impl BackendKind {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for BackendKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BackendKind {}

impl Hash for BackendKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Native transaction primitives of one backend kind.
///
/// `begin`/`commit`/`rollback` bracket exactly one pipeline run; rollback is
/// the signal that discards pending writes.
pub trait Transactional {
    fn kind(&self) -> BackendKind;
    fn begin(&self) -> DbResult<()>;
    fn commit(&self) -> DbResult<()>;
    fn rollback(&self) -> DbResult<()>;

    /// Identity of the underlying store when one kind can wrap several.
    ///
    /// Repositories of one kind share a single transaction layer, so they
    /// must agree on this value.
    fn store_identity(&self) -> Option<usize> {
        None
    }
}

/// Partition restricting every repository call to `key = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub key: String,
    pub value: Value,
}

impl Scope {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a scope whose value must be informed (present and non-null).
    pub fn required(key: impl Into<String>, value: Option<Value>) -> RepoResult<Self> {
        let key = key.into();
        match value {
            Some(value) if !value.is_null() => Ok(Self { key, value }),
            _ => Err(RepoError::MissingScope(key)),
        }
    }

    /// Stamps the scope pair into a record about to be written.
    pub fn stamp(&self, record: &mut Attributes) {
        record.insert(self.key.clone(), self.value.clone());
    }
}

/// Pagination window, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn new(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    /// Records skipped before this page; page 0 is treated as page 1.
    pub fn offset(&self) -> usize {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }
}

/// Write payload: a raw attribute mapping or a typed entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Data<E> {
    Attributes(Attributes),
    Entity(E),
}

impl<E> From<Attributes> for Data<E> {
    fn from(value: Attributes) -> Self {
        Self::Attributes(value)
    }
}

impl<E: Entity> Data<E> {
    /// Resolves the payload to backend-native attributes.
    pub fn into_record(self, mapper: &dyn RecordMapper<E>) -> Result<Attributes, EntityError> {
        match self {
            Self::Attributes(attributes) => Ok(attributes),
            Self::Entity(entity) => mapper.to_record(&entity),
        }
    }
}

/// Conversion hooks between backend-native records and entities.
///
/// The defaults treat an entity's exported attribute mapping as the native
/// record, as-is.
pub trait RecordMapper<E: Entity> {
    fn to_entity(&self, record: Attributes) -> Result<E, EntityError> {
        E::from_attributes(record)
    }

    fn to_record(&self, entity: &E) -> Result<Attributes, EntityError> {
        entity.attributes()
    }
}

/// Identity mapping between entity attributes and native records.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeMapper;

impl<E: Entity> RecordMapper<E> for AttributeMapper {}

/// Full persistence capability set, identical across backends.
pub trait Persistence<E: Entity>: Transactional {
    fn identifier_field(&self) -> &str;
    fn scope(&self) -> Option<&Scope>;

    fn create(&self, data: Data<E>) -> RepoResult<E>;
    fn update(&self, id: &Value, data: Data<E>) -> RepoResult<E>;
    fn delete(&self, id: &Value) -> RepoResult<bool>;
    fn soft_delete(&self, id: &Value) -> RepoResult<bool>;
    fn delete_all(&self) -> RepoResult<()>;
    fn soft_delete_all(&self) -> RepoResult<()>;
    fn all(&self) -> RepoResult<Vec<E>>;
    fn paginate(&self, page: Page) -> RepoResult<Vec<E>>;
    fn find(&self, id: &Value) -> RepoResult<Option<E>>;
    fn find_by(&self, attributes: &Attributes) -> RepoResult<Option<E>>;
    fn first(&self) -> RepoResult<Option<E>>;
    fn last(&self) -> RepoResult<Option<E>>;
    fn count(&self) -> RepoResult<usize>;
}
