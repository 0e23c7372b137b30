#![allow(dead_code)]

use interflow_core::db::{DbError, DbResult};
use interflow_core::persistence::{Data, Page};
use interflow_core::{
    Attributes, BackendKind, Entity, Persistence, RepoResult, Repository, Scope, Transactional,
    VolatilePersistence, VolatileStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: Option<Value>,
    pub name: String,
    pub age: i64,
}

impl Entity for Person {}

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be a JSON object, got {other}"),
    }
}

pub fn person(name: &str, age: i64) -> Person {
    Person {
        id: None,
        name: name.to_string(),
        age,
    }
}

/// Ordered begin/commit/rollback events across mock backends.
#[derive(Debug, Default)]
pub struct Journal {
    events: RefCell<Vec<String>>,
}

impl Journal {
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn count(&self, suffix: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.ends_with(suffix))
            .count()
    }
}

/// Marker types giving mock backends distinct kinds.
pub struct KindA;
pub struct KindB;
pub struct KindC;

/// Volatile-backed persistence reporting its own kind and journaling
/// transaction calls.
pub struct Counting<K> {
    label: String,
    inner: VolatilePersistence<Person>,
    journal: Rc<Journal>,
    refuse: Option<&'static str>,
    kind: PhantomData<K>,
}

impl<K: 'static> Counting<K> {
    pub fn new(label: &str, store: Rc<VolatileStore>, journal: Rc<Journal>) -> Self {
        Self {
            label: label.to_string(),
            inner: VolatilePersistence::new(store, label),
            journal,
            refuse: None,
            kind: PhantomData,
        }
    }

    /// Makes `begin` or `commit` fail after journaling the attempt.
    pub fn refusing(mut self, event: &'static str) -> Self {
        self.refuse = Some(event);
        self
    }

    pub fn scoped(mut self, scope: Scope) -> Self {
        self.inner = self.inner.scoped(scope);
        self
    }

    fn note(&self, event: &str) -> DbResult<()> {
        self.journal.record(format!("{}:{event}", self.label));
        if self.refuse == Some(event) {
            return Err(DbError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some(format!("{} refused {event}", self.label)),
            )));
        }
        Ok(())
    }
}

pub type CountingRepository<K> = Repository<Person, Counting<K>>;

pub fn counting_repository<K: 'static>(
    label: &str,
    store: &Rc<VolatileStore>,
    journal: &Rc<Journal>,
) -> CountingRepository<K> {
    Repository::new(Counting::new(label, Rc::clone(store), Rc::clone(journal)))
}

impl<K: 'static> Transactional for Counting<K> {
    fn kind(&self) -> BackendKind {
        BackendKind::of::<K>()
    }

    fn begin(&self) -> DbResult<()> {
        self.note("begin")
    }

    fn commit(&self) -> DbResult<()> {
        self.note("commit")
    }

    fn rollback(&self) -> DbResult<()> {
        self.note("rollback")
    }
}

impl<K: 'static> Persistence<Person> for Counting<K> {
    fn identifier_field(&self) -> &str {
        self.inner.identifier_field()
    }

    fn scope(&self) -> Option<&Scope> {
        self.inner.scope()
    }

    fn create(&self, data: Data<Person>) -> RepoResult<Person> {
        self.inner.create(data)
    }

    fn update(&self, id: &Value, data: Data<Person>) -> RepoResult<Person> {
        self.inner.update(id, data)
    }

    fn delete(&self, id: &Value) -> RepoResult<bool> {
        self.inner.delete(id)
    }

    fn soft_delete(&self, id: &Value) -> RepoResult<bool> {
        self.inner.soft_delete(id)
    }

    fn delete_all(&self) -> RepoResult<()> {
        self.inner.delete_all()
    }

    fn soft_delete_all(&self) -> RepoResult<()> {
        self.inner.soft_delete_all()
    }

    fn all(&self) -> RepoResult<Vec<Person>> {
        self.inner.all()
    }

    fn paginate(&self, page: Page) -> RepoResult<Vec<Person>> {
        self.inner.paginate(page)
    }

    fn find(&self, id: &Value) -> RepoResult<Option<Person>> {
        self.inner.find(id)
    }

    fn find_by(&self, attributes: &Attributes) -> RepoResult<Option<Person>> {
        self.inner.find_by(attributes)
    }

    fn first(&self) -> RepoResult<Option<Person>> {
        self.inner.first()
    }

    fn last(&self) -> RepoResult<Option<Person>> {
        self.inner.last()
    }

    fn count(&self) -> RepoResult<usize> {
        self.inner.count()
    }
}
