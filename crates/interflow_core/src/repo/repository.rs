//! Typed repository and its type-erased handle.
//!
//! # Responsibility
//! - Delegate every capability to the wrapped backend.
//! - Let the interactor reach a repository's transaction primitives and
//!   downcast it back to its concrete type for steps.

use crate::model::entity::{Attributes, Entity};
use crate::persistence::{Data, Page, Persistence, Scope, Transactional};
use crate::repo::error::RepoResult;
use serde_json::Value;
use std::any::Any;
use std::marker::PhantomData;

/// Reserved suffix every bound repository name must carry.
pub const REPOSITORY_SUFFIX: &str = "_repository";

/// Repository over one persistence backend.
///
/// Scope restriction lives in the backend; the repository only forwards.
pub struct Repository<E: Entity, P: Persistence<E>> {
    persistence: P,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, P: Persistence<E>> Repository<E, P> {
    pub fn new(persistence: P) -> Self {
        Self {
            persistence,
            _entity: PhantomData,
        }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.persistence.scope()
    }

    /// Creates a record from attributes or an entity.
    pub fn create(&self, data: impl Into<Data<E>>) -> RepoResult<E> {
        self.persistence.create(data.into())
    }

    /// Creates a record from an entity.
    pub fn create_entity(&self, entity: E) -> RepoResult<E> {
        self.persistence.create(Data::Entity(entity))
    }

    pub fn update(&self, id: &Value, data: impl Into<Data<E>>) -> RepoResult<E> {
        self.persistence.update(id, data.into())
    }

    pub fn update_entity(&self, id: &Value, entity: E) -> RepoResult<E> {
        self.persistence.update(id, Data::Entity(entity))
    }

    pub fn delete(&self, id: &Value) -> RepoResult<bool> {
        self.persistence.delete(id)
    }

    pub fn soft_delete(&self, id: &Value) -> RepoResult<bool> {
        self.persistence.soft_delete(id)
    }

    pub fn delete_all(&self) -> RepoResult<()> {
        self.persistence.delete_all()
    }

    pub fn soft_delete_all(&self) -> RepoResult<()> {
        self.persistence.soft_delete_all()
    }

    pub fn all(&self) -> RepoResult<Vec<E>> {
        self.persistence.all()
    }

    pub fn paginate(&self, page: usize, page_size: usize) -> RepoResult<Vec<E>> {
        self.persistence.paginate(Page::new(page, page_size))
    }

    pub fn find(&self, id: &Value) -> RepoResult<Option<E>> {
        self.persistence.find(id)
    }

    pub fn find_by(&self, attributes: &Attributes) -> RepoResult<Option<E>> {
        self.persistence.find_by(attributes)
    }

    pub fn first(&self) -> RepoResult<Option<E>> {
        self.persistence.first()
    }

    pub fn last(&self) -> RepoResult<Option<E>> {
        self.persistence.last()
    }

    pub fn count(&self) -> RepoResult<usize> {
        self.persistence.count()
    }
}

/// Type-erased view of a repository bound into an interactor.
pub trait RepositoryHandle {
    fn transactional(&self) -> &dyn Transactional;
    fn as_any(&self) -> &dyn Any;
}

impl<E, P> RepositoryHandle for Repository<E, P>
where
    E: Entity,
    P: Persistence<E> + 'static,
{
    fn transactional(&self) -> &dyn Transactional {
        &self.persistence
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
