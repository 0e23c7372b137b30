//! Repository error types shared by every persistence backend.
//!
//! # Responsibility
//! - Separate business-visible write failures (`Persistence`, `Query`) from
//!   storage transport failures (`Storage`).
//! - Render structured failure detail for pipeline failure content.

use crate::db::DbError;
use crate::model::entity::{Attributes, EntityError};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Field-keyed error messages produced by a rejected write.
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// Generic repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Storage(#[from] DbError),
    #[error("invalid persisted record: {0}")]
    InvalidData(String),
    #[error("{0} scope need to be informed")]
    MissingScope(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

impl From<EntityError> for RepoError {
    fn from(value: EntityError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl RepoError {
    /// Structured detail suitable for merging into pipeline failure content.
    pub fn to_attributes(&self) -> Attributes {
        let detail = match self {
            Self::Persistence(err) => return err.to_attributes(),
            other => json!({ "errors": { "base": [other.to_string()] } }),
        };
        match detail {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }
}

/// Write rejected by the backend (constraint violation).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceError {
    /// Field-keyed messages; record-level failures use the `base` key.
    pub errors: FieldErrors,
    /// Attributes of the entity that was being written, when it could be built.
    pub entity: Option<Attributes>,
    /// Backend-native record that was rejected.
    pub record: Attributes,
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "record is invalid:")?;
        for (field, messages) in &self.errors {
            write!(f, " {field} {}", messages.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for PersistenceError {}

impl PersistenceError {
    pub fn to_attributes(&self) -> Attributes {
        let mut detail = Attributes::new();
        detail.insert("errors".to_string(), json!(self.errors));
        detail.insert(
            "entity".to_string(),
            self.entity.clone().map_or(Value::Null, Value::Object),
        );
        detail.insert("record".to_string(), Value::Object(self.record.clone()));
        detail
    }
}

/// Lookup of a record that does not exist in the repository partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn record_not_found(identifier_field: &str, id: &Value) -> Self {
        let id = match id {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            message: format!("Couldn't find record with '{identifier_field}'={id}"),
        }
    }
}
