//! Business-logic execution engine.
//!
//! Runs ordered validation and business steps over a request input, persists
//! through pluggable backends, and discards backend writes made by a failed
//! run.

pub mod config;
pub mod contract;
pub mod db;
pub mod interactor;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod repo;
pub mod response;

pub use config::{ConfigError, CoreConfig};
pub use contract::{
    Catalog, Contract, ErrorMap, Field, RuleContext, RuleMessage, Translator, Validation,
};
pub use interactor::{Context, Interactor, InteractorBuilder, InteractorError, Outcome};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::entity::{Attributes, Entity, EntityError};
pub use persistence::{
    BackendKind, Persistence, RelationalConfig, RelationalPersistence, Scope, Transactional,
    VolatilePersistence, VolatileStore,
};
pub use repo::error::{PersistenceError, QueryError, RepoError, RepoResult};
pub use repo::{Repository, RepositoryHandle};
pub use response::{Response, Status};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
