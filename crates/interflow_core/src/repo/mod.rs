//! Repository layer: scoped adapters between entities and one backend.
//!
//! # Responsibility
//! - Expose the persistence capability set to business steps.
//! - Carry the naming convention and type erasure used by the interactor.
//!
//! # Invariants
//! - A repository delegates to exactly one persistence backend instance.
//! - Bound repository names end with [`REPOSITORY_SUFFIX`].

pub mod error;
pub mod repository;

pub use repository::{Repository, RepositoryHandle, REPOSITORY_SUFFIX};
